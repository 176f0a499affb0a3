use crate::{
    record::{AuthenticationRecord, CommentRecord, PostRecord, TagRecord, UserRecord},
    store::{
        AuthStore, CommentStore, LikeStore, PostStore, Result, StoreError, TagStore, UniqueKey,
        UserStore,
    },
};
use async_trait::async_trait;
use simpleblog_common::{
    model::{
        Id, SimpleblogSnowflakeGenerator, count_from_db,
        auth::{AuthTokenHash, Authentication},
        comment::{Comment, CommentMarker, CreateComment},
        otp::VerificationStatus,
        post::{CreatePost, PostListing, PostMarker, UpdatePost},
        slug::Slug,
        tag::{TagMarker, TagName, TagWithPostCount},
        user::{CreateUser, Email, User, UserMarker, UserName},
    },
    snowflake::{ProcessId, WorkerId},
    util::to_offset_date_time,
};
use sqlx::{PgPool, Postgres, Transaction, migrate::Migrator, query, query_as, query_scalar};
use std::sync::{Mutex, PoisonError};
use time::UtcDateTime;
use tracing::debug;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const USER_EMAIL_CONSTRAINT: &str = "users_email_key";
const POST_SLUG_CONSTRAINT: &str = "posts_slug_key";
const LIKE_CONSTRAINT: &str = "likes_pkey";
const TAG_NAME_CONSTRAINT: &str = "tags_name_key";

const USER_SELECT: &str = "
    SELECT
        users.user_id,
        users.name,
        users.email,
        users.password_hash,
        users.otp_code,
        users.otp_expires_at,
        users.verified_at,
        users.created_at
    FROM
        users
";

const POST_SELECT: &str = "
    SELECT
        posts.post_id,
        posts.author_id,
        users.name AS author_name,
        posts.title,
        posts.slug,
        posts.content,
        posts.excerpt,
        posts.published,
        posts.created_at,
        posts.updated_at,
        ARRAY(
            SELECT tags.name
            FROM post_tags JOIN tags ON tags.tag_id = post_tags.tag_id
            WHERE post_tags.post_id = posts.post_id
            ORDER BY tags.name
        ) AS tag_names,
        (SELECT COUNT(*) FROM comments WHERE comments.post_id = posts.post_id) AS comment_count,
        (SELECT COUNT(*) FROM likes WHERE likes.post_id = posts.post_id) AS like_count
    FROM
        posts JOIN users ON users.user_id = posts.author_id
";

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_error) = &value
            && db_error.is_unique_violation()
        {
            let key = match db_error.constraint() {
                Some(USER_EMAIL_CONSTRAINT) => UniqueKey::UserEmail,
                Some(POST_SLUG_CONSTRAINT) => UniqueKey::PostSlug,
                Some(LIKE_CONSTRAINT) => UniqueKey::Like,
                Some(TAG_NAME_CONSTRAINT) => UniqueKey::TagName,
                _ => UniqueKey::Other,
            };
            return Self::UniqueViolation(key);
        }

        Self::Sqlx(value)
    }
}

fn to_db_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub struct DbClient {
    pool: PgPool,
    snowflake_generator: Mutex<SimpleblogSnowflakeGenerator>,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, worker_id: WorkerId, process_id: ProcessId) -> Self {
        let snowflake_generator =
            Mutex::new(SimpleblogSnowflakeGenerator::new(worker_id, process_id));

        Self {
            pool,
            snowflake_generator,
        }
    }

    fn next_id<Marker>(&self) -> Result<Id<Marker>> {
        let snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;

        Ok(Id::new(snowflake))
    }

    async fn attach_tags(
        &self,
        transaction: &mut Transaction<'_, Postgres>,
        post_id: Id<PostMarker>,
        tags: &[TagName],
    ) -> Result<()> {
        let mut tag_ids = Vec::with_capacity(tags.len());

        for tag in tags {
            let tag_id = self.next_id::<TagMarker>()?;
            let returned_id: i64 = query_scalar(
                "
                INSERT INTO tags (tag_id, name)
                VALUES ($1, $2)
                ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                RETURNING tag_id
                ",
            )
            .bind(tag_id.to_db())
            .bind(tag.get())
            .fetch_one(&mut **transaction)
            .await?;

            tag_ids.push(returned_id);
        }

        query(
            "
            INSERT INTO post_tags (post_id, tag_id)
            SELECT $1, UNNEST($2::BIGINT[])
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(post_id.to_db())
        .bind(tag_ids)
        .execute(&mut **transaction)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for DbClient {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(&format!("{USER_SELECT} WHERE users.user_id = $1"))
            .bind(user_id.to_db())
            .fetch_optional(&self.pool)
            .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn fetch_user_by_email(&self, email: &Email) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(&format!("{USER_SELECT} WHERE users.email = $1"))
            .bind(email.get())
            .fetch_optional(&self.pool)
            .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let user_id = self.next_id::<UserMarker>()?;
        let (otp_code, otp_expires_at, verified_at) = user.verification.to_columns();

        query(
            "
            INSERT INTO users (
                user_id, name, email, password_hash,
                otp_code, otp_expires_at, verified_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(user_id.to_db())
        .bind(user.name.get())
        .bind(user.email.get())
        .bind(user.password_hash.as_phc())
        .bind(otp_code)
        .bind(otp_expires_at.map(to_offset_date_time))
        .bind(verified_at.map(to_offset_date_time))
        .bind(to_offset_date_time(user.created_at))
        .execute(&self.pool)
        .await?;

        debug!(%user_id, "Created user");

        Ok(User {
            id: user_id,
            name: user.name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            verification: user.verification.clone(),
            created_at: user.created_at,
        })
    }

    async fn delete_user(&self, user_id: Id<UserMarker>) -> Result<bool> {
        let result = query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id.to_db())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_verification(
        &self,
        user_id: Id<UserMarker>,
        verification: &VerificationStatus,
    ) -> Result<bool> {
        let (otp_code, otp_expires_at, verified_at) = verification.to_columns();

        let result = query(
            "
            UPDATE users
            SET otp_code = $2, otp_expires_at = $3, verified_at = $4
            WHERE user_id = $1
            ",
        )
        .bind(user_id.to_db())
        .bind(otp_code)
        .bind(otp_expires_at.map(to_offset_date_time))
        .bind(verified_at.map(to_offset_date_time))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_user_name(&self, user_id: Id<UserMarker>, name: &UserName) -> Result<bool> {
        let result = query("UPDATE users SET name = $2 WHERE user_id = $1")
            .bind(user_id.to_db())
            .bind(name.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PostStore for DbClient {
    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<PostListing>> {
        let record = query_as::<_, PostRecord>(&format!("{POST_SELECT} WHERE posts.post_id = $1"))
            .bind(post_id.to_db())
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(PostListing::try_from).transpose()?;
        Ok(post)
    }

    async fn fetch_post_by_slug(&self, slug: &Slug) -> Result<Option<PostListing>> {
        let record = query_as::<_, PostRecord>(&format!("{POST_SELECT} WHERE posts.slug = $1"))
            .bind(slug.get())
            .fetch_optional(&self.pool)
            .await?;

        let post = record.map(PostListing::try_from).transpose()?;
        Ok(post)
    }

    async fn list_published_posts(&self, offset: u64, limit: u64) -> Result<Vec<PostListing>> {
        let records = query_as::<_, PostRecord>(&format!(
            "{POST_SELECT}
            WHERE posts.published
            ORDER BY posts.created_at DESC, posts.post_id DESC
            LIMIT $1 OFFSET $2"
        ))
        .bind(to_db_count(limit))
        .bind(to_db_count(offset))
        .fetch_all(&self.pool)
        .await?;

        let posts = records
            .into_iter()
            .map(PostListing::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    async fn count_published_posts(&self) -> Result<u64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM posts WHERE published")
            .fetch_one(&self.pool)
            .await?;

        Ok(count_from_db(count)?)
    }

    async fn list_author_posts(&self, author: Id<UserMarker>) -> Result<Vec<PostListing>> {
        let records = query_as::<_, PostRecord>(&format!(
            "{POST_SELECT}
            WHERE posts.author_id = $1
            ORDER BY posts.created_at DESC, posts.post_id DESC"
        ))
        .bind(author.to_db())
        .fetch_all(&self.pool)
        .await?;

        let posts = records
            .into_iter()
            .map(PostListing::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    async fn create_post(&self, post: &CreatePost) -> Result<Id<PostMarker>> {
        let post_id = self.next_id::<PostMarker>()?;
        let created_at = to_offset_date_time(post.created_at);

        let mut transaction = self.pool.begin().await?;

        query(
            "
            INSERT INTO posts (
                post_id, author_id, title, slug, content, excerpt,
                published, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            ",
        )
        .bind(post_id.to_db())
        .bind(post.author.to_db())
        .bind(&post.title)
        .bind(post.slug.get())
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(post.published)
        .bind(created_at)
        .execute(&mut *transaction)
        .await?;

        self.attach_tags(&mut transaction, post_id, &post.tags).await?;
        transaction.commit().await?;

        debug!(%post_id, slug = %post.slug, "Created post");
        Ok(post_id)
    }

    async fn update_post(&self, post_id: Id<PostMarker>, post: &UpdatePost) -> Result<bool> {
        let mut transaction = self.pool.begin().await?;

        let result = query(
            "
            UPDATE posts
            SET title = $2, slug = $3, content = $4, excerpt = $5,
                published = $6, updated_at = $7
            WHERE post_id = $1
            ",
        )
        .bind(post_id.to_db())
        .bind(&post.title)
        .bind(post.slug.get())
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(post.published)
        .bind(to_offset_date_time(post.updated_at))
        .execute(&mut *transaction)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        query("DELETE FROM post_tags WHERE post_id = $1")
            .bind(post_id.to_db())
            .execute(&mut *transaction)
            .await?;
        self.attach_tags(&mut transaction, post_id, &post.tags).await?;
        transaction.commit().await?;

        Ok(true)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM posts WHERE post_id = $1")
            .bind(post_id.to_db())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CommentStore for DbClient {
    async fn list_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        let records = query_as::<_, CommentRecord>(
            "
            SELECT
                comments.comment_id,
                comments.post_id,
                comments.author_id,
                users.name AS author_name,
                comments.content,
                comments.created_at
            FROM
                comments JOIN users ON users.user_id = comments.author_id
            WHERE
                comments.post_id = $1
            ORDER BY comments.created_at DESC, comments.comment_id DESC
            ",
        )
        .bind(post_id.to_db())
        .fetch_all(&self.pool)
        .await?;

        let comments = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    async fn create_comment(&self, comment: &CreateComment) -> Result<Comment> {
        let comment_id = self.next_id::<CommentMarker>()?;

        let record = query_as::<_, CommentRecord>(
            "
            WITH inserted AS (
                INSERT INTO comments (comment_id, post_id, author_id, content, created_at)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            )
            SELECT
                inserted.comment_id,
                inserted.post_id,
                inserted.author_id,
                users.name AS author_name,
                inserted.content,
                inserted.created_at
            FROM
                inserted JOIN users ON users.user_id = inserted.author_id
            ",
        )
        .bind(comment_id.to_db())
        .bind(comment.post_id.to_db())
        .bind(comment.author.to_db())
        .bind(comment.content.get())
        .bind(to_offset_date_time(comment.created_at))
        .fetch_one(&self.pool)
        .await?;

        Ok(Comment::try_from(record)?)
    }
}

#[async_trait]
impl LikeStore for DbClient {
    async fn has_liked(&self, post_id: Id<PostMarker>, user_id: Id<UserMarker>) -> Result<bool> {
        let liked: bool = query_scalar(
            "SELECT EXISTS (SELECT 1 FROM likes WHERE post_id = $1 AND user_id = $2)",
        )
        .bind(post_id.to_db())
        .bind(user_id.to_db())
        .fetch_one(&self.pool)
        .await?;

        Ok(liked)
    }

    async fn add_like(&self, post_id: Id<PostMarker>, user_id: Id<UserMarker>) -> Result<()> {
        query("INSERT INTO likes (post_id, user_id, created_at) VALUES ($1, $2, $3)")
            .bind(post_id.to_db())
            .bind(user_id.to_db())
            .bind(to_offset_date_time(UtcDateTime::now()))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn remove_like(
        &self,
        post_id: Id<PostMarker>,
        user_id: Id<UserMarker>,
    ) -> Result<bool> {
        let result = query("DELETE FROM likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id.to_db())
            .bind(user_id.to_db())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_likes(&self, post_id: Id<PostMarker>) -> Result<u64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id.to_db())
            .fetch_one(&self.pool)
            .await?;

        Ok(count_from_db(count)?)
    }
}

#[async_trait]
impl TagStore for DbClient {
    async fn list_tags(&self) -> Result<Vec<TagWithPostCount>> {
        let records = query_as::<_, TagRecord>(
            "
            SELECT
                tags.tag_id,
                tags.name,
                COUNT(post_tags.post_id) AS post_count
            FROM
                tags LEFT JOIN post_tags ON post_tags.tag_id = tags.tag_id
            GROUP BY tags.tag_id, tags.name
            ORDER BY tags.name
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let tags = records
            .into_iter()
            .map(TagWithPostCount::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }
}

#[async_trait]
impl AuthStore for DbClient {
    async fn create_authentication(&self, authentication: &Authentication) -> Result<()> {
        query(
            "
            INSERT INTO authentications (token_hash, user_id, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(authentication.token_hash.0.as_slice())
        .bind(authentication.user.to_db())
        .bind(to_offset_date_time(authentication.created_at))
        .bind(
            authentication
                .expires_after
                .map(|expires_after| expires_after.get().whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_authentication(
        &self,
        token_hash: &AuthTokenHash,
    ) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                authentications.token_hash,
                authentications.user_id,
                authentications.created_at,
                authentications.expires_after_seconds
            FROM
                authentications
            WHERE
                authentications.token_hash = $1
            ",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    async fn delete_authentication(&self, token_hash: &AuthTokenHash) -> Result<bool> {
        let result = query("DELETE FROM authentications WHERE token_hash = $1")
            .bind(token_hash.0.as_slice())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
