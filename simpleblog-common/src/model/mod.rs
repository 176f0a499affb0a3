pub mod auth;
pub mod comment;
pub mod like;
pub mod otp;
pub mod post;
pub mod share;
pub mod slug;
pub mod tag;
pub mod user;

use crate::{
    model::{
        auth::{InvalidAuthTokenHashError, MissingPasswordError},
        comment::InvalidCommentError,
        otp::{InvalidOtpCodeError, InvalidVerificationStateError},
        post::InvalidPostError,
        slug::InvalidSlugError,
        tag::InvalidTagNameError,
        user::{InvalidEmailError, InvalidUserNameError},
    },
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
    util::NonPositiveDurationError,
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    UserName(#[from] InvalidUserNameError),
    #[error(transparent)]
    Email(#[from] InvalidEmailError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
    #[error(transparent)]
    Password(#[from] MissingPasswordError),
    #[error(transparent)]
    OtpCode(#[from] InvalidOtpCodeError),
    #[error(transparent)]
    VerificationState(#[from] InvalidVerificationStateError),
    #[error(transparent)]
    Slug(#[from] InvalidSlugError),
    #[error(transparent)]
    TagName(#[from] InvalidTagNameError),
    #[error(transparent)]
    Post(#[from] InvalidPostError),
    #[error(transparent)]
    Comment(#[from] InvalidCommentError),
    #[error("A count was negative: {0}")]
    NegativeCount(i64),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct SimpleblogEpoch;
impl Epoch for SimpleblogEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type SimpleblogSnowflake = Snowflake<SimpleblogEpoch>;
pub type SimpleblogSnowflakeGenerator = SnowflakeGenerator<SimpleblogEpoch>;

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(SimpleblogSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: SimpleblogSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> SimpleblogSnowflake {
        self.0
    }

    /// The id as stored in a signed 64 bit database column.
    #[must_use]
    pub fn to_db(self) -> i64 {
        self.0.get().cast_signed()
    }

    #[must_use]
    pub fn from_db(value: i64) -> Self {
        value.cast_unsigned().into()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<SimpleblogSnowflake> for Id<Marker> {
    fn from(value: SimpleblogSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for SimpleblogSnowflake {
    fn from(value: Id<Marker>) -> Self {
        value.0
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(SimpleblogSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}

/// Converts a database count into an unsigned count.
pub fn count_from_db(value: i64) -> Result<u64, ModelValidationError> {
    u64::try_from(value).map_err(|_| ModelValidationError::NegativeCount(value))
}

/// Trims `value`, returning `None` when nothing is left.
#[must_use]
pub fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
