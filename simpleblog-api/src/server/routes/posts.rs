use crate::{
    server::{
        Result, ServerError, ServerRouter,
        auth::AuthenticatedUser,
        extract::{Created, Json, Query},
    },
    service::post::{self, PostInput, PostPage},
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use simpleblog_common::model::{
    Id,
    post::{Post, PostDetail, PostMarker},
    slug::Slug,
};
use simpleblog_db::store::Store;
use std::sync::Arc;
use time::UtcDateTime;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_posts)
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_put(update_post)
        .typed_delete(delete_post)
        .typed_get(get_post_by_slug)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Deserialize)]
struct PageQuery {
    page: Option<u64>,
    limit: Option<u64>,
}

async fn list_posts(
    PostsPath(): PostsPath,
    State(store): State<Arc<dyn Store>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PostPage>> {
    let page = post::list_published(&*store, query.page, query.limit).await?;

    Ok(Json(page))
}

async fn create_post(
    PostsPath(): PostsPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(input): Json<PostInput>,
) -> Result<Created<Post>> {
    let post = post::create_post(&*store, user.user_id(), &input, UtcDateTime::now()).await?;

    Ok(Created(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<PostDetail>> {
    let post = post::get_post(&*store, id).await?;

    Ok(Json(post))
}

async fn update_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(input): Json<PostInput>,
) -> Result<Json<Post>> {
    let post = post::update_post(&*store, user.user_id(), id, &input, UtcDateTime::now()).await?;

    Ok(Json(post))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<StatusCode> {
    post::delete_post(&*store, user.user_id(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/by-slug/{slug}", rejection(ServerError))]
struct PostBySlugPath {
    slug: Slug,
}

async fn get_post_by_slug(
    PostBySlugPath { slug }: PostBySlugPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<PostDetail>> {
    let post = post::get_post_by_slug(&*store, &slug).await?;

    Ok(Json(post))
}
