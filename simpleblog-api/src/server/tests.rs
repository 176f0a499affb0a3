use crate::{
    mail::{
        Mailer,
        testing::{FailingMailer, RecordingMailer},
    },
    server::{ServerState, Settings, app},
};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use serde_json::{Value, json};
use simpleblog_common::{model::user::Email, util::PositiveDuration};
use simpleblog_db::{memory::MemoryStore, store::UserStore};
use std::sync::Arc;
use time::Duration;
use tower::ServiceExt;

struct TestApp {
    store: Arc<MemoryStore>,
    mailer: Arc<RecordingMailer>,
    router: Router,
}

fn router_with(store: Arc<MemoryStore>, mailer: Arc<dyn Mailer>) -> Router {
    app(ServerState {
        store,
        mailer,
        settings: Arc::new(Settings {
            public_base_url: "https://blog.example.com".to_owned(),
            auth_token_lifetime: PositiveDuration::new(Duration::hours(1)),
        }),
    })
}

fn test_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let mailer = Arc::new(RecordingMailer::default());
    let router = router_with(store.clone(), mailer.clone());

    TestApp {
        store,
        mailer,
        router,
    }
}

impl TestApp {
    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, json)
    }

    async fn pending_code(&self, email: &str) -> String {
        let user = self
            .store
            .fetch_user_by_email(&Email::new(email).unwrap())
            .await
            .unwrap()
            .unwrap();

        user.verification
            .pending_otp()
            .unwrap()
            .code
            .get()
            .to_owned()
    }

    /// Registers, verifies and logs in, returning the bearer token.
    async fn signed_in(&self, name: &str, email: &str) -> String {
        let (status, _) = self
            .call(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({ "name": name, "email": email, "password": "hunter22" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let code = self.pending_code(email).await;
        let (status, _) = self
            .call(
                Method::POST,
                "/auth/verify-otp",
                None,
                Some(json!({ "email": email, "otpCode": code })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self
            .call(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "email": email, "password": "hunter22" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);

        body["token"].as_str().unwrap().to_owned()
    }

    async fn create_post(&self, token: &str, title: &str) -> Value {
        let (status, body) = self
            .call(
                Method::POST,
                "/posts",
                Some(token),
                Some(json!({
                    "title": title,
                    "content": "Some content worth reading.",
                    "tags": ["rust", "web"],
                    "published": true,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        body
    }
}

#[tokio::test]
async fn unknown_routes_answer_with_an_error_body() {
    let app = test_app();

    let (status, body) = app.call(Method::GET, "/nope", None, None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "status": 404, "error": "Not found" }));
}

#[tokio::test]
async fn registration_sends_a_code_and_gates_login() {
    let app = test_app();

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "name": "Ada", "email": " Ada@Example.com ", "password": "hunter22" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["needsVerification"], json!(true));
    assert_eq!(body["user"]["email"], json!("ada@example.com"));
    assert_eq!(body["user"]["isVerified"], json!(false));
    assert!(body["user"].get("passwordHash").is_none());

    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    let code = app.pending_code("ada@example.com").await;
    assert!(sent[0].text_body.contains(&code));

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "hunter22" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/verify-otp",
            None,
            Some(json!({ "email": "ada@example.com", "otpCode": code })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["isVerified"], json!(true));

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/verify-otp",
            None,
            Some(json!({ "email": "ada@example.com", "otpCode": code })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let app = test_app();
    app.signed_in("Ada", "ada@example.com").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "name": "Eve", "email": "ADA@example.com", "password": "x" })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], json!("User with this email already exists"));
}

#[tokio::test]
async fn failed_delivery_removes_the_new_user() {
    let store = Arc::new(MemoryStore::new());
    let router = router_with(store.clone(), Arc::new(FailingMailer));
    let app = TestApp {
        store: store.clone(),
        mailer: Arc::new(RecordingMailer::default()),
        router,
    };

    let (status, body) = app
        .call(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "name": "Ada", "email": "ada@example.com", "password": "hunter22" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(
        body["error"],
        json!("Failed to send verification email. Please try again.")
    );
    assert_eq!(store.user_count(), 0);
}

#[tokio::test]
async fn wrong_password_and_bad_tokens_are_unauthorized() {
    let app = test_app();
    let token = app.signed_in("Ada", "ada@example.com").await;

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call(Method::GET, "/me/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.call(Method::GET, "/me/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], json!("Ada"));

    let (status, _) = app.call(Method::POST, "/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call(Method::GET, "/me/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn posts_get_unique_slugs_and_paginate() {
    let app = test_app();
    let token = app.signed_in("Ada", "ada@example.com").await;

    let first = app.create_post(&token, "Hello, World!").await;
    let second = app.create_post(&token, "Hello World").await;

    assert_eq!(first["slug"], json!("hello-world"));
    assert_eq!(second["slug"], json!("hello-world-1"));
    assert_eq!(first["author"]["name"], json!("Ada"));
    assert_eq!(first["tags"], json!(["rust", "web"]));

    let (status, body) = app.call(Method::GET, "/posts?page=1&limit=1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["posts"].as_array().unwrap().len(), 1);
    assert_eq!(body["posts"][0]["slug"], json!("hello-world-1"));
    assert_eq!(
        body["pagination"],
        json!({ "page": 1, "limit": 1, "total": 2, "pages": 2 })
    );

    let (status, body) = app
        .call(Method::GET, "/posts/by-slug/hello-world", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], first["id"]);

    let (status, body) = app.call(Method::GET, "/me/posts", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = app.call(Method::GET, "/tags", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], json!("rust"));
    assert_eq!(body[0]["postCount"], json!(2));
}

#[tokio::test]
async fn invalid_post_input_is_rejected() {
    let app = test_app();
    let token = app.signed_in("Ada", "ada@example.com").await;

    let (status, _) = app
        .call(
            Method::POST,
            "/posts",
            Some(&token),
            Some(json!({ "title": "  ", "content": "body" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(
            Method::POST,
            "/posts",
            None,
            Some(json!({ "title": "Title", "content": "body" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call(Method::GET, "/posts/not-a-number", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_the_author_may_edit_or_delete() {
    let app = test_app();
    let ada = app.signed_in("Ada", "ada@example.com").await;
    let eve = app.signed_in("Eve", "eve@example.com").await;
    let post = app.create_post(&ada, "Mine").await;
    let uri = format!("/posts/{}", post["id"]);

    let (status, _) = app
        .call(
            Method::PUT,
            &uri,
            Some(&eve),
            Some(json!({ "title": "Stolen", "content": "..." })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call(Method::DELETE, &uri, Some(&eve), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(
            Method::PUT,
            &uri,
            Some(&ada),
            Some(json!({ "title": "Still mine", "content": "Edited." })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slug"], json!("still-mine"));
    assert_eq!(body["published"], json!(true));

    let (status, _) = app.call(Method::DELETE, &uri, Some(&ada), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comments_likes_and_shares() {
    let app = test_app();
    let token = app.signed_in("Ada", "ada@example.com").await;
    let post = app.create_post(&token, "Talk to me").await;
    let id = &post["id"];

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/posts/{id}/comments"),
            Some(&token),
            Some(json!({ "content": "  First!  " })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["content"], json!("First!"));
    assert_eq!(body["author"]["name"], json!("Ada"));

    let (status, body) = app
        .call(Method::GET, &format!("/posts/{id}/comments"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let like_uri = format!("/posts/{id}/like");
    let (_, body) = app.call(Method::POST, &like_uri, Some(&token), None).await;
    assert_eq!(body, json!({ "liked": true, "likeCount": 1 }));

    let (_, body) = app.call(Method::GET, &like_uri, None, None).await;
    assert_eq!(body, json!({ "liked": false, "likeCount": 1 }));

    let (_, body) = app.call(Method::POST, &like_uri, Some(&token), None).await;
    assert_eq!(body, json!({ "liked": false, "likeCount": 0 }));

    let (status, body) = app.call(Method::GET, &format!("/posts/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["comments"].as_array().unwrap().len(), 1);
    assert_eq!(body["likeCount"], json!(0));

    let (status, body) = app
        .call(
            Method::POST,
            &format!("/posts/{id}/share"),
            None,
            Some(json!({ "type": "twitter" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    let share_url = body["shareUrl"].as_str().unwrap();
    assert!(share_url.starts_with("https://twitter.com/intent/tweet?url="));
    assert!(share_url.contains(&format!("https%3A%2F%2Fblog.example.com%2Fposts%2F{id}")));

    let (status, _) = app
        .call(
            Method::POST,
            "/posts/999999/share",
            None,
            Some(json!({ "type": "link" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sharing_without_a_body_shares_the_plain_link() {
    let app = test_app();
    let token = app.signed_in("Ada", "ada@example.com").await;
    let post = app.create_post(&token, "Plain").await;

    let (status, body) = app
        .call(Method::POST, &format!("/posts/{}/share", post["id"]), None, None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "shareUrl": format!("https://blog.example.com/posts/{}", post["id"]),
            "success": true,
        })
    );
}

#[tokio::test]
async fn responses_use_camel_case_fields() {
    let app = test_app();
    let token = app.signed_in("Ada", "ada@example.com").await;
    let post = app.create_post(&token, "Cased").await;

    assert!(post.get("createdAt").is_some());
    assert!(post.get("created_at").is_none());

    let (_, body) = app.call(Method::GET, "/posts", None, None).await;
    let listing = &body["posts"][0];
    assert_eq!(listing["commentCount"], json!(0));
    assert_eq!(listing["likeCount"], json!(0));

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/verify-otp",
            None,
            Some(json!({ "email": "ada@example.com", "otp_code": "123456" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn profile_can_be_renamed() {
    let app = test_app();
    let token = app.signed_in("Ada", "ada@example.com").await;

    let (status, body) = app
        .call(
            Method::PUT,
            "/me/profile",
            Some(&token),
            Some(json!({ "name": "  Ada Lovelace " })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], json!("Ada Lovelace"));

    let (status, _) = app
        .call(
            Method::PUT,
            "/me/profile",
            Some(&token),
            Some(json!({ "name": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
