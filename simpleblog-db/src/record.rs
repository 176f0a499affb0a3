use simpleblog_common::{
    model::{
        Id, ModelValidationError, count_from_db,
        auth::{AuthTokenHash, Authentication, PasswordHash},
        comment::{Comment, CommentBody},
        otp::VerificationStatus,
        post::{Post, PostListing},
        slug::Slug,
        tag::{Tag, TagName, TagWithPostCount},
        user::{Email, User, UserName, UserSummary},
    },
    util::PositiveDuration,
};
use sqlx::FromRow;
use time::{Duration, OffsetDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub struct UserRecord {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<OffsetDateTime>,
    pub verified_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub struct PostRecord {
    pub post_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub published: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub tag_names: Vec<String>,
    pub comment_count: i64,
    pub like_count: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub struct CommentRecord {
    pub comment_id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub content: String,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub struct TagRecord {
    pub tag_id: i64,
    pub name: String,
    pub post_count: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub struct AuthenticationRecord {
    pub token_hash: Vec<u8>,
    pub user_id: i64,
    pub created_at: OffsetDateTime,
    pub expires_after_seconds: Option<i64>,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let verification = VerificationStatus::from_columns(
            value.otp_code,
            value.otp_expires_at.map(OffsetDateTime::to_utc),
            value.verified_at.map(OffsetDateTime::to_utc),
        )?;

        Ok(Self {
            id: Id::from_db(value.user_id),
            name: UserName::new(&value.name)?,
            email: Email::new(&value.email)?,
            password_hash: PasswordHash::from_phc(value.password_hash),
            verification,
            created_at: value.created_at.to_utc(),
        })
    }
}

impl TryFrom<PostRecord> for PostListing {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        let tags: Vec<TagName> = value
            .tag_names
            .iter()
            .map(|name| TagName::new(name))
            .collect::<Result<_, _>>()?;

        let post = Post {
            id: Id::from_db(value.post_id),
            author: UserSummary {
                id: Id::from_db(value.author_id),
                name: UserName::new(&value.author_name)?,
            },
            title: value.title,
            slug: Slug::new(value.slug)?,
            content: value.content,
            excerpt: value.excerpt,
            published: value.published,
            tags,
            created_at: value.created_at.to_utc(),
            updated_at: value.updated_at.to_utc(),
        };

        Ok(Self {
            post,
            comment_count: count_from_db(value.comment_count)?,
            like_count: count_from_db(value.like_count)?,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.comment_id),
            post_id: Id::from_db(value.post_id),
            author: UserSummary {
                id: Id::from_db(value.author_id),
                name: UserName::new(&value.author_name)?,
            },
            content: CommentBody::new(&value.content)?,
            created_at: value.created_at.to_utc(),
        })
    }
}

impl TryFrom<TagRecord> for TagWithPostCount {
    type Error = ModelValidationError;

    fn try_from(value: TagRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            tag: Tag {
                id: Id::from_db(value.tag_id),
                name: TagName::new(&value.name)?,
            },
            post_count: count_from_db(value.post_count)?,
        })
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        let expires_after = value
            .expires_after_seconds
            .map(|seconds| PositiveDuration::try_from(Duration::seconds(seconds)))
            .transpose()?;

        Ok(Self {
            user: Id::from_db(value.user_id),
            token_hash: AuthTokenHash::try_from(value.token_hash.into_boxed_slice())?,
            created_at: value.created_at.to_utc(),
            expires_after,
        })
    }
}
