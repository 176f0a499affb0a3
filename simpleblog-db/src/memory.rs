//! An in-process store with the same uniqueness rules as the database.
//!
//! Meant for tests of everything above the persistence layer.

use crate::store::{
    AuthStore, CommentStore, LikeStore, PostStore, Result, StoreError, TagStore, UniqueKey,
    UserStore,
};
use async_trait::async_trait;
use simpleblog_common::model::{
    Id,
    auth::{AuthTokenHash, Authentication},
    comment::{Comment, CommentBody, CommentMarker, CreateComment},
    otp::VerificationStatus,
    post::{CreatePost, Post, PostListing, PostMarker, UpdatePost},
    slug::Slug,
    tag::{Tag, TagMarker, TagName, TagWithPostCount},
    user::{CreateUser, Email, User, UserMarker, UserName, UserSummary},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Mutex, MutexGuard, PoisonError},
};
use time::UtcDateTime;

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    last_id: u64,
    users: BTreeMap<Id<UserMarker>, User>,
    posts: BTreeMap<Id<PostMarker>, StoredPost>,
    tags: BTreeMap<TagName, Id<TagMarker>>,
    comments: Vec<StoredComment>,
    likes: BTreeSet<(Id<PostMarker>, Id<UserMarker>)>,
    authentications: Vec<Authentication>,
    failing_post_write: Option<UniqueKey>,
    failing_user_delete: bool,
}

struct StoredPost {
    author: Id<UserMarker>,
    title: String,
    slug: Slug,
    content: String,
    excerpt: String,
    published: bool,
    tags: Vec<TagName>,
    created_at: UtcDateTime,
    updated_at: UtcDateTime,
}

struct StoredComment {
    id: Id<CommentMarker>,
    post_id: Id<PostMarker>,
    author: Id<UserMarker>,
    content: CommentBody,
    created_at: UtcDateTime,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next post insert or update fail with a unique violation on
    /// `key`, as if a concurrent writer got there first.
    pub fn fail_next_post_write(&self, key: UniqueKey) {
        self.lock().failing_post_write = Some(key);
    }

    /// Makes the next user deletion fail as if the database were gone.
    pub fn fail_next_user_delete(&self) {
        self.lock().failing_user_delete = true;
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MemoryState {
    fn next_id<Marker>(&mut self) -> Id<Marker> {
        self.last_id += 1;
        Id::from(self.last_id)
    }

    fn summary(&self, user_id: Id<UserMarker>) -> Option<UserSummary> {
        self.users.get(&user_id).map(User::summary)
    }

    fn listing(&self, post_id: Id<PostMarker>, stored: &StoredPost) -> Option<PostListing> {
        let mut tags = stored.tags.clone();
        tags.sort();

        let post = Post {
            id: post_id,
            author: self.summary(stored.author)?,
            title: stored.title.clone(),
            slug: stored.slug.clone(),
            content: stored.content.clone(),
            excerpt: stored.excerpt.clone(),
            published: stored.published,
            tags,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        };

        Some(PostListing {
            post,
            comment_count: self
                .comments
                .iter()
                .filter(|comment| comment.post_id == post_id)
                .count() as u64,
            like_count: self.like_count(post_id),
        })
    }

    fn like_count(&self, post_id: Id<PostMarker>) -> u64 {
        self.likes
            .iter()
            .filter(|(liked_post, _)| *liked_post == post_id)
            .count() as u64
    }

    /// Newest first, like the database ordering.
    fn listings<F>(&self, filter: F) -> Vec<PostListing>
    where
        F: Fn(&StoredPost) -> bool,
    {
        let mut listings: Vec<_> = self
            .posts
            .iter()
            .filter(|(_, stored)| filter(stored))
            .filter_map(|(post_id, stored)| self.listing(*post_id, stored))
            .collect();

        listings.sort_by(|a, b| {
            (b.post.created_at, b.post.id).cmp(&(a.post.created_at, a.post.id))
        });
        listings
    }

    fn check_post_write(
        &mut self,
        post_id: Option<Id<PostMarker>>,
        slug: &Slug,
    ) -> Result<()> {
        if let Some(key) = self.failing_post_write.take() {
            return Err(StoreError::UniqueViolation(key));
        }

        let taken = self
            .posts
            .iter()
            .any(|(id, stored)| Some(*id) != post_id && stored.slug == *slug);
        if taken {
            return Err(StoreError::UniqueViolation(UniqueKey::PostSlug));
        }

        Ok(())
    }

    fn upsert_tags(&mut self, tags: &[TagName]) {
        for tag in tags {
            if !self.tags.contains_key(tag) {
                let tag_id = self.next_id();
                self.tags.insert(tag.clone(), tag_id);
            }
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.lock().users.get(&user_id).cloned())
    }

    async fn fetch_user_by_email(&self, email: &Email) -> Result<Option<User>> {
        let state = self.lock();
        let user = state.users.values().find(|user| user.email == *email);
        Ok(user.cloned())
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let mut state = self.lock();
        if state.users.values().any(|existing| existing.email == user.email) {
            return Err(StoreError::UniqueViolation(UniqueKey::UserEmail));
        }

        let created = User {
            id: state.next_id(),
            name: user.name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            verification: user.verification.clone(),
            created_at: user.created_at,
        };
        state.users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn delete_user(&self, user_id: Id<UserMarker>) -> Result<bool> {
        let mut state = self.lock();
        if std::mem::take(&mut state.failing_user_delete) {
            return Err(StoreError::Sqlx(sqlx::Error::PoolClosed));
        }
        if state.users.remove(&user_id).is_none() {
            return Ok(false);
        }

        let owned_posts: BTreeSet<_> = state
            .posts
            .iter()
            .filter(|(_, stored)| stored.author == user_id)
            .map(|(post_id, _)| *post_id)
            .collect();
        state.posts.retain(|post_id, _| !owned_posts.contains(post_id));
        state.comments.retain(|comment| {
            comment.author != user_id && !owned_posts.contains(&comment.post_id)
        });
        state.likes.retain(|(post_id, liker)| {
            *liker != user_id && !owned_posts.contains(post_id)
        });
        state
            .authentications
            .retain(|authentication| authentication.user != user_id);

        Ok(true)
    }

    async fn set_verification(
        &self,
        user_id: Id<UserMarker>,
        verification: &VerificationStatus,
    ) -> Result<bool> {
        let mut state = self.lock();
        let Some(user) = state.users.get_mut(&user_id) else {
            return Ok(false);
        };

        user.verification = verification.clone();
        Ok(true)
    }

    async fn set_user_name(&self, user_id: Id<UserMarker>, name: &UserName) -> Result<bool> {
        let mut state = self.lock();
        let Some(user) = state.users.get_mut(&user_id) else {
            return Ok(false);
        };

        user.name = name.clone();
        Ok(true)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<PostListing>> {
        let state = self.lock();
        let listing = state
            .posts
            .get(&post_id)
            .and_then(|stored| state.listing(post_id, stored));
        Ok(listing)
    }

    async fn fetch_post_by_slug(&self, slug: &Slug) -> Result<Option<PostListing>> {
        let state = self.lock();
        let listing = state
            .posts
            .iter()
            .find(|(_, stored)| stored.slug == *slug)
            .and_then(|(post_id, stored)| state.listing(*post_id, stored));
        Ok(listing)
    }

    async fn list_published_posts(&self, offset: u64, limit: u64) -> Result<Vec<PostListing>> {
        let listings = self.lock().listings(|stored| stored.published);

        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(listings.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_published_posts(&self) -> Result<u64> {
        let state = self.lock();
        Ok(state.posts.values().filter(|stored| stored.published).count() as u64)
    }

    async fn list_author_posts(&self, author: Id<UserMarker>) -> Result<Vec<PostListing>> {
        Ok(self.lock().listings(|stored| stored.author == author))
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Id<PostMarker>> {
        let mut state = self.lock();
        state.check_post_write(None, &post.slug)?;
        state.upsert_tags(&post.tags);

        let post_id = state.next_id();
        state.posts.insert(
            post_id,
            StoredPost {
                author: post.author,
                title: post.title.clone(),
                slug: post.slug.clone(),
                content: post.content.clone(),
                excerpt: post.excerpt.clone(),
                published: post.published,
                tags: post.tags.clone(),
                created_at: post.created_at,
                updated_at: post.created_at,
            },
        );

        Ok(post_id)
    }

    async fn update_post(&self, post_id: Id<PostMarker>, post: &UpdatePost) -> Result<bool> {
        let mut state = self.lock();
        if !state.posts.contains_key(&post_id) {
            return Ok(false);
        }
        state.check_post_write(Some(post_id), &post.slug)?;
        state.upsert_tags(&post.tags);

        if let Some(stored) = state.posts.get_mut(&post_id) {
            stored.title.clone_from(&post.title);
            stored.slug = post.slug.clone();
            stored.content.clone_from(&post.content);
            stored.excerpt.clone_from(&post.excerpt);
            stored.published = post.published;
            stored.tags.clone_from(&post.tags);
            stored.updated_at = post.updated_at;
        }

        Ok(true)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let mut state = self.lock();
        if state.posts.remove(&post_id).is_none() {
            return Ok(false);
        }

        state.comments.retain(|comment| comment.post_id != post_id);
        state.likes.retain(|(liked_post, _)| *liked_post != post_id);
        Ok(true)
    }
}

#[async_trait]
impl CommentStore for MemoryStore {
    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let state = self.lock();
        let mut comments: Vec<_> = state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .filter_map(|comment| {
                Some(Comment {
                    id: comment.id,
                    post_id: comment.post_id,
                    author: state.summary(comment.author)?,
                    content: comment.content.clone(),
                    created_at: comment.created_at,
                })
            })
            .collect();

        comments.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(comments)
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let mut state = self.lock();
        let author = state
            .summary(comment.author)
            .ok_or(StoreError::Sqlx(sqlx::Error::RowNotFound))?;

        let stored = StoredComment {
            id: state.next_id(),
            post_id: comment.post_id,
            author: comment.author,
            content: comment.content.clone(),
            created_at: comment.created_at,
        };
        let created = Comment {
            id: stored.id,
            post_id: stored.post_id,
            author,
            content: stored.content.clone(),
            created_at: stored.created_at,
        };
        state.comments.push(stored);

        Ok(created)
    }
}

#[async_trait]
impl LikeStore for MemoryStore {
    async fn has_liked(&self, post_id: Id<PostMarker>, user_id: Id<UserMarker>) -> Result<bool> {
        Ok(self.lock().likes.contains(&(post_id, user_id)))
    }

    async fn add_like(&self, post_id: Id<PostMarker>, user_id: Id<UserMarker>) -> Result<()> {
        if self.lock().likes.insert((post_id, user_id)) {
            Ok(())
        } else {
            Err(StoreError::UniqueViolation(UniqueKey::Like))
        }
    }

    async fn remove_like(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<bool> {
        Ok(self.lock().likes.remove(&(post_id, user_id)))
    }

    async fn count_likes(&self, post_id: Id<PostMarker>) -> Result<u64> {
        Ok(self.lock().like_count(post_id))
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn list_tags(&self) -> Result<Vec<TagWithPostCount>> {
        let state = self.lock();
        let tags = state
            .tags
            .iter()
            .map(|(name, tag_id)| TagWithPostCount {
                tag: Tag {
                    id: *tag_id,
                    name: name.clone(),
                },
                post_count: state
                    .posts
                    .values()
                    .filter(|stored| stored.tags.contains(name))
                    .count() as u64,
            })
            .collect();

        Ok(tags)
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn create_authentication(&self, authentication: &Authentication) -> Result<()> {
        self.lock().authentications.push(authentication.clone());
        Ok(())
    }

    async fn fetch_authentication(
        &self,
        token_hash: &AuthTokenHash,
    ) -> Result<Option<Authentication>> {
        let state = self.lock();
        let authentication = state
            .authentications
            .iter()
            .find(|authentication| authentication.token_hash == *token_hash);
        Ok(authentication.cloned())
    }

    async fn delete_authentication(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let mut state = self.lock();
        let before = state.authentications.len();
        state
            .authentications
            .retain(|authentication| authentication.token_hash != *token_hash);
        Ok(state.authentications.len() < before)
    }
}
