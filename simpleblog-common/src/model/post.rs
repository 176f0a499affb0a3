use crate::{
    model::{
        Id, non_blank,
        comment::Comment,
        slug::Slug,
        tag::{InvalidTagNameError, TagName},
        user::{UserMarker, UserSummary},
    },
    util::serialize_timestamp,
};
use serde::Serialize;
use thiserror::Error;
use time::UtcDateTime;

pub const POST_TITLE_MAX_LEN: usize = 200;
pub const EXCERPT_LEN: usize = 150;
pub const EXCERPT_ELLIPSIS: &str = "...";

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author: UserSummary,
    pub title: String,
    pub slug: Slug,
    pub content: String,
    pub excerpt: String,
    pub published: bool,
    pub tags: Vec<TagName>,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: UtcDateTime,
    #[serde(serialize_with = "serialize_timestamp")]
    pub updated_at: UtcDateTime,
}

/// A post as shown in listings, with its engagement counts.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListing {
    #[serde(flatten)]
    pub post: Post,
    pub comment_count: u64,
    pub like_count: u64,
}

/// A single post together with its comments, newest first.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub comments: Vec<Comment>,
    pub like_count: u64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum InvalidPostError {
    #[error("Title and content are required")]
    MissingTitleOrContent,
    #[error("The title is longer than {POST_TITLE_MAX_LEN} characters")]
    TitleTooLong,
    #[error(transparent)]
    Tag(#[from] InvalidTagNameError),
}

/// Validated author input for creating or updating a post.
///
/// `published` is optional so an update can keep the stored value.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub tags: Vec<TagName>,
    pub published: Option<bool>,
}

impl PostDraft {
    pub fn new(
        title: &str,
        content: &str,
        excerpt: Option<&str>,
        tags: &[String],
        published: Option<bool>,
    ) -> Result<Self, InvalidPostError> {
        let (Some(title), Some(_)) = (non_blank(title), non_blank(content)) else {
            return Err(InvalidPostError::MissingTitleOrContent);
        };
        if title.chars().count() > POST_TITLE_MAX_LEN {
            return Err(InvalidPostError::TitleTooLong);
        }

        let excerpt = match excerpt.and_then(non_blank) {
            Some(excerpt) => excerpt.to_owned(),
            None => default_excerpt(content),
        };

        let mut tag_names = Vec::with_capacity(tags.len());
        for tag in tags {
            let name = TagName::new(tag)?;
            if !tag_names.contains(&name) {
                tag_names.push(name);
            }
        }

        Ok(Self {
            title: title.to_owned(),
            content: content.to_owned(),
            excerpt,
            tags: tag_names,
            published,
        })
    }

    #[must_use]
    pub fn base_slug(&self) -> Slug {
        Slug::base_for_title(&self.title)
    }
}

/// The first [`EXCERPT_LEN`] characters of `content` followed by an ellipsis.
#[must_use]
pub fn default_excerpt(content: &str) -> String {
    let mut excerpt: String = content.chars().take(EXCERPT_LEN).collect();
    excerpt.push_str(EXCERPT_ELLIPSIS);
    excerpt
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub author: Id<UserMarker>,
    pub title: String,
    pub slug: Slug,
    pub content: String,
    pub excerpt: String,
    pub published: bool,
    pub tags: Vec<TagName>,
    pub created_at: UtcDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct UpdatePost {
    pub title: String,
    pub slug: Slug,
    pub content: String,
    pub excerpt: String,
    pub published: bool,
    pub tags: Vec<TagName>,
    pub updated_at: UtcDateTime,
}
