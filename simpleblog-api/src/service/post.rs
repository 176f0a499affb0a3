//! Post authoring and reading.
//!
//! Slugs are resolved against the store: each candidate is probed first, and
//! the write itself settles races, since the store rejects a slug that was
//! taken in between with a unique violation.

use crate::service::{Forbidden, Missing, Result, ServiceError};
use serde::{Deserialize, Serialize};
use simpleblog_common::model::{
    Id,
    post::{CreatePost, Post, PostDetail, PostDraft, PostListing, PostMarker, UpdatePost},
    slug::Slug,
    user::UserMarker,
};
use simpleblog_db::store::{Store, StoreError, UniqueKey};
use time::UtcDateTime;
use tracing::{debug, info};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Author input for creating and updating posts.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct PostInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub excerpt: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub published: Option<bool>,
}

impl PostInput {
    fn to_draft(&self) -> Result<PostDraft> {
        Ok(PostDraft::new(
            &self.title,
            &self.content,
            self.excerpt.as_deref(),
            &self.tags,
            self.published,
        )?)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub pages: u64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct PostPage {
    pub posts: Vec<PostListing>,
    pub pagination: Pagination,
}

/// Runs `write` with the first free slug derived from `base`.
///
/// A probe hit on `own_post` counts as free, so a post keeps its slug when
/// its title did not change.
async fn write_with_free_slug<T, F, Fut>(
    store: &dyn Store,
    base: &Slug,
    own_post: Option<Id<PostMarker>>,
    mut write: F,
) -> Result<(Slug, T)>
where
    F: FnMut(Slug) -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    for candidate in base.candidates() {
        if let Some(existing) = store.fetch_post_by_slug(&candidate).await?
            && Some(existing.post.id) != own_post
        {
            continue;
        }

        match write(candidate.clone()).await {
            Ok(written) => return Ok((candidate, written)),
            Err(StoreError::UniqueViolation(UniqueKey::PostSlug)) => {
                debug!(slug = %candidate, "Slug was taken concurrently, trying the next one");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(ServiceError::SlugsExhausted(base.clone()))
}

async fn fetch_listing(store: &dyn Store, post_id: Id<PostMarker>) -> Result<PostListing> {
    store
        .fetch_post(post_id)
        .await?
        .ok_or(ServiceError::NotFound(Missing::Post(post_id)))
}

async fn fetch_own_post(
    store: &dyn Store,
    editor: Id<UserMarker>,
    post_id: Id<PostMarker>,
) -> Result<Post> {
    let listing = fetch_listing(store, post_id).await?;
    if listing.post.author.id != editor {
        return Err(ServiceError::Forbidden(Forbidden::NotAuthor));
    }

    Ok(listing.post)
}

async fn detail(store: &dyn Store, listing: PostListing) -> Result<PostDetail> {
    let comments = store.list_comments(listing.post.id).await?;

    Ok(PostDetail {
        post: listing.post,
        comments,
        like_count: listing.like_count,
    })
}

/// Published posts, newest first. `page` starts at 1 and `limit` is clamped
/// to `1..=MAX_PAGE_SIZE`.
pub async fn list_published(
    store: &dyn Store,
    page: Option<u64>,
    limit: Option<u64>,
) -> Result<PostPage> {
    let page = page.unwrap_or(DEFAULT_PAGE).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1).saturating_mul(limit);

    let posts = store.list_published_posts(offset, limit).await?;
    let total = store.count_published_posts().await?;

    Ok(PostPage {
        posts,
        pagination: Pagination {
            page,
            limit,
            total,
            pages: total.div_ceil(limit),
        },
    })
}

pub async fn author_posts(store: &dyn Store, author: Id<UserMarker>) -> Result<Vec<PostListing>> {
    Ok(store.list_author_posts(author).await?)
}

pub async fn get_post(store: &dyn Store, post_id: Id<PostMarker>) -> Result<PostDetail> {
    let listing = fetch_listing(store, post_id).await?;
    detail(store, listing).await
}

pub async fn get_post_by_slug(store: &dyn Store, slug: &Slug) -> Result<PostDetail> {
    let listing = store
        .fetch_post_by_slug(slug)
        .await?
        .ok_or_else(|| ServiceError::NotFound(Missing::PostBySlug(slug.clone())))?;
    detail(store, listing).await
}

pub async fn create_post(
    store: &dyn Store,
    author: Id<UserMarker>,
    input: &PostInput,
    now: UtcDateTime,
) -> Result<Post> {
    let draft = input.to_draft()?;

    let (slug, post_id) = write_with_free_slug(store, &draft.base_slug(), None, |slug| {
        let post = CreatePost {
            author,
            title: draft.title.clone(),
            slug,
            content: draft.content.clone(),
            excerpt: draft.excerpt.clone(),
            published: draft.published.unwrap_or(false),
            tags: draft.tags.clone(),
            created_at: now,
        };
        async move { store.create_post(&post).await }
    })
    .await?;

    info!(%post_id, %slug, "Created post");
    Ok(fetch_listing(store, post_id).await?.post)
}

/// Overwrites a post of `editor`. `published` keeps its stored value when
/// the input leaves it out.
pub async fn update_post(
    store: &dyn Store,
    editor: Id<UserMarker>,
    post_id: Id<PostMarker>,
    input: &PostInput,
    now: UtcDateTime,
) -> Result<Post> {
    let existing = fetch_own_post(store, editor, post_id).await?;
    let draft = input.to_draft()?;
    let published = draft.published.unwrap_or(existing.published);

    let (slug, found) = write_with_free_slug(store, &draft.base_slug(), Some(post_id), |slug| {
        let post = UpdatePost {
            title: draft.title.clone(),
            slug,
            content: draft.content.clone(),
            excerpt: draft.excerpt.clone(),
            published,
            tags: draft.tags.clone(),
            updated_at: now,
        };
        async move { store.update_post(post_id, &post).await }
    })
    .await?;

    if !found {
        return Err(ServiceError::NotFound(Missing::Post(post_id)));
    }

    info!(%post_id, %slug, "Updated post");
    Ok(fetch_listing(store, post_id).await?.post)
}

pub async fn delete_post(
    store: &dyn Store,
    editor: Id<UserMarker>,
    post_id: Id<PostMarker>,
) -> Result<()> {
    fetch_own_post(store, editor, post_id).await?;

    if !store.delete_post(post_id).await? {
        return Err(ServiceError::NotFound(Missing::Post(post_id)));
    }

    info!(%post_id, "Deleted post");
    Ok(())
}
