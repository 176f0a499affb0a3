//! Request logic behind the HTTP handlers.
//!
//! Everything here takes its collaborators and the current time as
//! arguments.

use crate::mail::MailError;
use simpleblog_common::model::{
    Id, ModelValidationError,
    auth::{AuthTokenHashError, MissingPasswordError, PasswordHashError},
    comment::InvalidCommentError,
    otp::{InvalidOtpCodeError, OtpError},
    post::{InvalidPostError, PostMarker},
    slug::Slug,
    user::{InvalidEmailError, InvalidUserNameError},
};
use simpleblog_db::store::StoreError;
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub mod account;
pub mod interaction;
pub mod post;

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ModelValidationError),
    #[error("{0} not found")]
    NotFound(Missing),
    #[error("{0}")]
    Conflict(Conflict),
    #[error("No verification code was issued, please request a new one")]
    InvalidState,
    #[error("Verification code has expired, please request a new one")]
    Expired,
    #[error("Invalid verification code")]
    InvalidCredential,
    #[error("{0}")]
    Forbidden(Forbidden),
    #[error("Invalid email or password")]
    Unauthorized,
    #[error("Failed to send verification email: {0}")]
    DeliveryFailed(MailError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),
    #[error(transparent)]
    TokenHash(#[from] AuthTokenHashError),
    #[error("No free slug is left for base {0}")]
    SlugsExhausted(Slug),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Missing {
    User,
    Post(Id<PostMarker>),
    PostBySlug(Slug),
}

impl Display for Missing {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Missing::User => f.write_str("User"),
            Missing::Post(id) => write!(f, "Post {id}"),
            Missing::PostBySlug(slug) => write!(f, "Post with slug {slug}"),
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum Conflict {
    #[error("Email is already verified")]
    AlreadyVerified,
    #[error("User with this email already exists")]
    EmailTaken,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum Forbidden {
    #[error("Only the author may change this post")]
    NotAuthor,
    #[error("Please verify your email before logging in")]
    Unverified,
}

impl ServiceError {
    /// The message shown to clients. Internal failures are not described.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::DeliveryFailed(_) => {
                "Failed to send verification email. Please try again.".to_owned()
            }
            ServiceError::Store(_)
            | ServiceError::PasswordHash(_)
            | ServiceError::TokenHash(_)
            | ServiceError::SlugsExhausted(_) => "Internal server error".to_owned(),
            _ => self.to_string(),
        }
    }
}

impl From<OtpError> for ServiceError {
    fn from(value: OtpError) -> Self {
        match value {
            OtpError::AlreadyVerified => ServiceError::Conflict(Conflict::AlreadyVerified),
            OtpError::NoCodeIssued => ServiceError::InvalidState,
            OtpError::Expired => ServiceError::Expired,
            OtpError::Mismatch => ServiceError::InvalidCredential,
        }
    }
}

macro_rules! validation_error {
    ($($error:ty),* $(,)?) => {
        $(
            impl From<$error> for ServiceError {
                fn from(value: $error) -> Self {
                    ServiceError::Validation(value.into())
                }
            }
        )*
    };
}

validation_error!(
    InvalidEmailError,
    InvalidUserNameError,
    InvalidOtpCodeError,
    InvalidPostError,
    InvalidCommentError,
    MissingPasswordError,
);
