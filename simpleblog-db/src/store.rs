//! The persistence seam.
//!
//! Request handling only talks to these traits, so it runs unchanged against
//! [`DbClient`](crate::client::DbClient) and, in tests, against the in-memory
//! store.

use async_trait::async_trait;
use simpleblog_common::{
    model::{
        Id, ModelValidationError,
        auth::{AuthTokenHash, Authentication},
        comment::{Comment, CreateComment},
        otp::VerificationStatus,
        post::{CreatePost, PostListing, PostMarker, UpdatePost},
        slug::Slug,
        tag::TagWithPostCount,
        user::{CreateUser, Email, User, UserMarker, UserName},
    },
    snowflake::SnowflakeTimeError,
};
use thiserror::Error;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Which uniqueness rule a write ran into.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum UniqueKey {
    UserEmail,
    PostSlug,
    Like,
    TagName,
    Other,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unique constraint violated: {0:?}")]
    UniqueViolation(UniqueKey),
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Could not generate an id: {0}")]
    IdGeneration(#[from] SnowflakeTimeError),
    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl StoreError {
    #[must_use]
    pub fn unique_violation(&self) -> Option<UniqueKey> {
        match self {
            Self::UniqueViolation(key) => Some(*key),
            _ => None,
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn fetch_user_by_email(&self, email: &Email) -> Result<Option<User>>;

    /// Fails with [`UniqueKey::UserEmail`] if the email is taken.
    async fn create_user(&self, user: &CreateUser) -> Result<User>;

    /// Returns whether a user was deleted.
    async fn delete_user(&self, user_id: Id<UserMarker>) -> Result<bool>;

    async fn set_verification(
        &self,
        user_id: Id<UserMarker>,
        verification: &VerificationStatus,
    ) -> Result<bool>;

    async fn set_user_name(&self, user_id: Id<UserMarker>, name: &UserName) -> Result<bool>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<PostListing>>;

    async fn fetch_post_by_slug(&self, slug: &Slug) -> Result<Option<PostListing>>;

    /// Published posts, newest first.
    async fn list_published_posts(&self, offset: u64, limit: u64) -> Result<Vec<PostListing>>;

    async fn count_published_posts(&self) -> Result<u64>;

    /// All posts of one author including drafts, newest first.
    async fn list_author_posts(&self, author: Id<UserMarker>) -> Result<Vec<PostListing>>;

    /// Inserts the post and attaches its tags, creating missing ones.
    ///
    /// Fails with [`UniqueKey::PostSlug`] if the slug is taken.
    async fn create_post(&self, post: &CreatePost) -> Result<Id<PostMarker>>;

    /// Overwrites the post and replaces its tags. Returns whether the post
    /// existed.
    async fn update_post(&self, post_id: Id<PostMarker>, post: &UpdatePost) -> Result<bool>;

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Newest first.
    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>>;

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment>;
}

#[async_trait]
pub trait LikeStore: Send + Sync {
    async fn has_liked(&self, post_id: Id<PostMarker>, user_id: Id<UserMarker>) -> Result<bool>;

    /// Fails with [`UniqueKey::Like`] if the user already likes the post.
    async fn add_like(&self, post_id: Id<PostMarker>, user_id: Id<UserMarker>) -> Result<()>;

    async fn remove_like(&self, post_id: Id<PostMarker>, user_id: Id<UserMarker>)
    -> Result<bool>;

    async fn count_likes(&self, post_id: Id<PostMarker>) -> Result<u64>;
}

#[async_trait]
pub trait TagStore: Send + Sync {
    /// Ordered by name.
    async fn list_tags(&self) -> Result<Vec<TagWithPostCount>>;
}

#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn create_authentication(&self, authentication: &Authentication) -> Result<()>;

    async fn fetch_authentication(
        &self,
        token_hash: &AuthTokenHash,
    ) -> Result<Option<Authentication>>;

    async fn delete_authentication(&self, token_hash: &AuthTokenHash) -> Result<bool>;
}

pub trait Store: UserStore + PostStore + CommentStore + LikeStore + TagStore + AuthStore {}

impl<T> Store for T where T: UserStore + PostStore + CommentStore + LikeStore + TagStore + AuthStore
{}
