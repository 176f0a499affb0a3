use crate::{
    server::{
        Result, ServerError, ServerRouter, Settings,
        auth::AuthenticatedUser,
        extract::{Created, Json},
    },
    service::interaction,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use simpleblog_common::model::{
    Id,
    comment::Comment,
    like::LikeStatus,
    post::PostMarker,
    share::SharePlatform,
    tag::TagWithPostCount,
};
use simpleblog_db::store::Store;
use std::sync::Arc;
use time::UtcDateTime;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_comments)
        .typed_post(add_comment)
        .typed_get(like_status)
        .typed_post(toggle_like)
        .typed_post(share_post)
        .typed_get(list_tags)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct CommentsPath {
    id: Id<PostMarker>,
}

#[derive(Clone, Debug, Deserialize)]
struct CommentRequest {
    #[serde(default)]
    content: String,
}

async fn list_comments(
    CommentsPath { id }: CommentsPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<Vec<Comment>>> {
    let comments = interaction::list_comments(&*store, id).await?;

    Ok(Json(comments))
}

async fn add_comment(
    CommentsPath { id }: CommentsPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(request): Json<CommentRequest>,
) -> Result<Created<Comment>> {
    let comment =
        interaction::add_comment(&*store, user.user_id(), id, &request.content, UtcDateTime::now())
            .await?;

    Ok(Created(comment))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/like", rejection(ServerError))]
struct LikePath {
    id: Id<PostMarker>,
}

async fn like_status(
    LikePath { id }: LikePath,
    State(store): State<Arc<dyn Store>>,
    user: Option<AuthenticatedUser>,
) -> Result<Json<LikeStatus>> {
    let user_id = user.as_ref().map(AuthenticatedUser::user_id);
    let status = interaction::like_status(&*store, user_id, id).await?;

    Ok(Json(status))
}

async fn toggle_like(
    LikePath { id }: LikePath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<LikeStatus>> {
    let status = interaction::toggle_like(&*store, user.user_id(), id).await?;

    Ok(Json(status))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/share", rejection(ServerError))]
struct SharePath {
    id: Id<PostMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct ShareRequest {
    #[serde(rename = "type", default)]
    platform: SharePlatform,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShareResponse {
    share_url: String,
    success: bool,
}

async fn share_post(
    SharePath { id }: SharePath,
    State(store): State<Arc<dyn Store>>,
    State(settings): State<Arc<Settings>>,
    request: Option<Json<ShareRequest>>,
) -> Result<Json<ShareResponse>> {
    let platform = request.map(|Json(request)| request.platform).unwrap_or_default();
    let share_url =
        interaction::share_url(&*store, &settings.public_base_url, id, platform).await?;

    Ok(Json(ShareResponse {
        share_url,
        success: true,
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/tags", rejection(ServerError))]
struct TagsPath();

async fn list_tags(
    TagsPath(): TagsPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<Vec<TagWithPostCount>>> {
    let tags = interaction::list_tags(&*store).await?;

    Ok(Json(tags))
}
