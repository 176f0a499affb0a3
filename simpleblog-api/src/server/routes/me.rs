use crate::{
    server::{Result, ServerError, ServerRouter, auth::AuthenticatedUser, extract::Json},
    service::{account, post},
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use simpleblog_common::model::{post::PostListing, user::User};
use simpleblog_db::store::Store;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(own_posts)
        .typed_get(own_profile)
        .typed_put(update_profile)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/me/posts", rejection(ServerError))]
struct OwnPostsPath();

async fn own_posts(
    OwnPostsPath(): OwnPostsPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<PostListing>>> {
    let posts = post::author_posts(&*store, user.user_id()).await?;

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/me/profile", rejection(ServerError))]
struct ProfilePath();

#[derive(Clone, Debug, Deserialize)]
struct ProfileRequest {
    #[serde(default)]
    name: String,
}

async fn own_profile(
    ProfilePath(): ProfilePath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<User>> {
    let profile = account::profile(&*store, user.user_id()).await?;

    Ok(Json(profile))
}

async fn update_profile(
    ProfilePath(): ProfilePath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(request): Json<ProfileRequest>,
) -> Result<Json<User>> {
    let profile = account::rename(&*store, user.user_id(), &request.name).await?;

    Ok(Json(profile))
}
