//! Share links for the supported platforms.

use serde::{Deserialize, Serialize};
use urlencoding::encode;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SharePlatform {
    #[default]
    Link,
    Twitter,
    Facebook,
    Linkedin,
    Email,
}

impl SharePlatform {
    /// Unknown platform names fall back to [`SharePlatform::Link`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "twitter" => Self::Twitter,
            "facebook" => Self::Facebook,
            "linkedin" => Self::Linkedin,
            "email" => Self::Email,
            _ => Self::Link,
        }
    }

    /// Builds the platform's share link for `post_url`.
    #[must_use]
    pub fn share_url(self, post_url: &str) -> String {
        match self {
            Self::Link => post_url.to_owned(),
            Self::Twitter => format!(
                "https://twitter.com/intent/tweet?url={}&text={}",
                encode(post_url),
                encode("Check out this amazing blog post!"),
            ),
            Self::Facebook => format!(
                "https://www.facebook.com/sharer/sharer.php?u={}",
                encode(post_url)
            ),
            Self::Linkedin => format!(
                "https://www.linkedin.com/sharing/share-offsite/?url={}",
                encode(post_url)
            ),
            Self::Email => format!(
                "mailto:?subject={}&body={}",
                encode("Check out this blog post"),
                encode(&format!("I thought you might enjoy this: {post_url}")),
            ),
        }
    }
}

impl<'de> Deserialize<'de> for SharePlatform {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}
