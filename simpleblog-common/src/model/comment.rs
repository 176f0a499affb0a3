use crate::{
    model::{
        Id, non_blank,
        post::PostMarker,
        user::{UserMarker, UserSummary},
    },
    util::serialize_timestamp,
};
use serde::Serialize;
use thiserror::Error;
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post_id: Id<PostMarker>,
    pub author: UserSummary,
    pub content: CommentBody,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: UtcDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateComment {
    pub post_id: Id<PostMarker>,
    pub author: Id<UserMarker>,
    pub content: CommentBody,
    pub created_at: UtcDateTime,
}

/// Trimmed, non-empty comment text.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct CommentBody(String);

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("Comment content is required")]
pub struct InvalidCommentError;

impl CommentBody {
    pub fn new(content: &str) -> Result<Self, InvalidCommentError> {
        non_blank(content)
            .map(|trimmed| Self(trimmed.to_owned()))
            .ok_or(InvalidCommentError)
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use crate::model::comment::{CommentBody, InvalidCommentError};

    #[test]
    fn comment_bodies_are_trimmed() {
        assert_eq!(CommentBody::new("  nice post \n").unwrap().get(), "nice post");
        assert_eq!(CommentBody::new(" \t\n"), Err(InvalidCommentError));
    }
}
