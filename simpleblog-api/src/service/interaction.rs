//! Comments, likes, share links and tags.

use crate::service::{Missing, Result, ServiceError};
use simpleblog_common::model::{
    Id,
    comment::{Comment, CommentBody, CreateComment},
    like::LikeStatus,
    post::PostMarker,
    share::SharePlatform,
    tag::TagWithPostCount,
    user::UserMarker,
};
use simpleblog_db::store::{Store, UniqueKey};
use time::UtcDateTime;
use tracing::debug;

async fn ensure_post_exists(store: &dyn Store, post_id: Id<PostMarker>) -> Result<()> {
    match store.fetch_post(post_id).await? {
        Some(_) => Ok(()),
        None => Err(ServiceError::NotFound(Missing::Post(post_id))),
    }
}

pub async fn list_comments(store: &dyn Store, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
    ensure_post_exists(store, post_id).await?;
    Ok(store.list_comments(post_id).await?)
}

pub async fn add_comment(
    store: &dyn Store,
    author: Id<UserMarker>,
    post_id: Id<PostMarker>,
    content: &str,
    now: UtcDateTime,
) -> Result<Comment> {
    let content = CommentBody::new(content)?;
    ensure_post_exists(store, post_id).await?;

    let comment = store
        .create_comment(&CreateComment {
            post_id,
            author,
            content,
            created_at: now,
        })
        .await?;

    debug!(comment_id = %comment.id, %post_id, "Added comment");
    Ok(comment)
}

/// Likes the post, or takes the like back if there already is one.
pub async fn toggle_like(
    store: &dyn Store,
    user_id: Id<UserMarker>,
    post_id: Id<PostMarker>,
) -> Result<LikeStatus> {
    ensure_post_exists(store, post_id).await?;

    let liked = if store.remove_like(post_id, user_id).await? {
        false
    } else {
        match store.add_like(post_id, user_id).await {
            Ok(()) => true,
            Err(err) if err.unique_violation() == Some(UniqueKey::Like) => true,
            Err(err) => return Err(err.into()),
        }
    };

    Ok(LikeStatus {
        liked,
        like_count: store.count_likes(post_id).await?,
    })
}

/// Anonymous callers never have liked the post.
pub async fn like_status(
    store: &dyn Store,
    user_id: Option<Id<UserMarker>>,
    post_id: Id<PostMarker>,
) -> Result<LikeStatus> {
    ensure_post_exists(store, post_id).await?;

    let liked = match user_id {
        Some(user_id) => store.has_liked(post_id, user_id).await?,
        None => false,
    };

    Ok(LikeStatus {
        liked,
        like_count: store.count_likes(post_id).await?,
    })
}

pub async fn share_url(
    store: &dyn Store,
    public_base_url: &str,
    post_id: Id<PostMarker>,
    platform: SharePlatform,
) -> Result<String> {
    ensure_post_exists(store, post_id).await?;

    let post_url = format!("{}/posts/{post_id}", public_base_url.trim_end_matches('/'));
    Ok(platform.share_url(&post_url))
}

pub async fn list_tags(store: &dyn Store) -> Result<Vec<TagWithPostCount>> {
    Ok(store.list_tags().await?)
}

#[cfg(test)]
mod tests {
    use crate::service::{
        ServiceError,
        interaction::{add_comment, like_status, list_comments, share_url, toggle_like},
    };
    use simpleblog_common::model::{
        Id,
        auth::PasswordHash,
        otp::VerificationStatus,
        post::{CreatePost, PostMarker},
        share::SharePlatform,
        slug::Slug,
        user::{CreateUser, Email, User, UserName},
    };
    use simpleblog_db::{
        memory::MemoryStore,
        store::{PostStore, UserStore},
    };
    use time::{Duration, UtcDateTime, macros::utc_datetime};

    const NOW: UtcDateTime = utc_datetime!(2025-06-01 12:00);

    async fn setup() -> (MemoryStore, User, Id<PostMarker>) {
        let store = MemoryStore::new();
        let user = store
            .create_user(&CreateUser {
                name: UserName::new("Ada").unwrap(),
                email: Email::new("ada@example.com").unwrap(),
                password_hash: PasswordHash::from_phc(String::new()),
                verification: VerificationStatus::Verified { verified_at: NOW },
                created_at: NOW,
            })
            .await
            .unwrap();
        let post_id = store
            .create_post(&CreatePost {
                author: user.id,
                title: "Post".to_owned(),
                slug: Slug::new("post".to_owned()).unwrap(),
                content: "content".to_owned(),
                excerpt: "content...".to_owned(),
                published: true,
                tags: Vec::new(),
                created_at: NOW,
            })
            .await
            .unwrap();

        (store, user, post_id)
    }

    #[tokio::test]
    async fn likes_toggle() {
        let (store, user, post_id) = setup().await;

        let liked = toggle_like(&store, user.id, post_id).await.unwrap();
        assert!(liked.liked);
        assert_eq!(liked.like_count, 1);

        let status = like_status(&store, Some(user.id), post_id).await.unwrap();
        assert!(status.liked);
        let anonymous = like_status(&store, None, post_id).await.unwrap();
        assert!(!anonymous.liked);
        assert_eq!(anonymous.like_count, 1);

        let unliked = toggle_like(&store, user.id, post_id).await.unwrap();
        assert!(!unliked.liked);
        assert_eq!(unliked.like_count, 0);
    }

    #[tokio::test]
    async fn liking_a_missing_post_is_not_found() {
        let (store, user, _) = setup().await;

        assert!(matches!(
            toggle_like(&store, user.id, Id::from(9999_u64)).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn comments_are_trimmed_and_newest_first() {
        let (store, user, post_id) = setup().await;

        add_comment(&store, user.id, post_id, " first ", NOW)
            .await
            .unwrap();
        add_comment(&store, user.id, post_id, "second", NOW + Duration::minutes(1))
            .await
            .unwrap();

        let comments = list_comments(&store, post_id).await.unwrap();
        let contents: Vec<_> = comments
            .iter()
            .map(|comment| comment.content.get())
            .collect();
        assert_eq!(contents, ["second", "first"]);

        assert!(matches!(
            add_comment(&store, user.id, post_id, "   ", NOW).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn share_urls_point_at_the_post() {
        let (store, _, post_id) = setup().await;

        let link = share_url(&store, "https://blog.example.com/", post_id, SharePlatform::Link)
            .await
            .unwrap();
        assert_eq!(link, format!("https://blog.example.com/posts/{post_id}"));

        assert!(matches!(
            share_url(&store, "https://blog.example.com", Id::from(1_u64), SharePlatform::Link)
                .await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
