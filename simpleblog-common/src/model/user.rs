use crate::{
    model::{Id, auth::PasswordHash, non_blank, otp::VerificationStatus},
    util::serialize_timestamp,
};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::UtcDateTime;

pub const USER_NAME_MAX_LEN: usize = 100;
pub const EMAIL_MAX_LEN: usize = 254;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id<UserMarker>,
    pub name: UserName,
    pub email: Email,
    #[serde(skip)]
    pub password_hash: PasswordHash,
    #[serde(flatten)]
    pub verification: VerificationStatus,
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: UtcDateTime,
}

/// The public face of a user, as shown next to posts and comments.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct UserSummary {
    pub id: Id<UserMarker>,
    pub name: UserName,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateUser {
    pub name: UserName,
    pub email: Email,
    pub password_hash: PasswordHash,
    pub verification: VerificationStatus,
    pub created_at: UtcDateTime,
}

impl User {
    #[must_use]
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct UserName(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The user name is invalid: {0:?}")]
pub struct InvalidUserNameError(String);

impl UserName {
    /// Trims the name; it must be non-empty and at most
    /// [`USER_NAME_MAX_LEN`] characters.
    pub fn new(name: &str) -> Result<Self, InvalidUserNameError> {
        match non_blank(name) {
            Some(trimmed) if trimmed.chars().count() <= USER_NAME_MAX_LEN => {
                Ok(UserName(trimmed.to_owned()))
            }
            _ => Err(InvalidUserNameError(name.to_owned())),
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for UserName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        UserName::new(&inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"UserName"))
    }
}

/// An email address, trimmed and lowercased.
///
/// Only the shape `local@domain` is checked; deliverability is the mail
/// transport's problem.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The email address is invalid: {0:?}")]
pub struct InvalidEmailError(String);

impl Email {
    pub fn new(email: &str) -> Result<Self, InvalidEmailError> {
        let normalized = email.trim().to_lowercase();

        let well_formed = normalized.len() <= EMAIL_MAX_LEN
            && !normalized.chars().any(char::is_whitespace)
            && normalized
                .split_once('@')
                .is_some_and(|(local, domain)| {
                    !local.is_empty() && !domain.is_empty() && !domain.contains('@')
                });

        if well_formed {
            Ok(Email(normalized))
        } else {
            Err(InvalidEmailError(email.to_owned()))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Email::new(&inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Email"))
    }
}
