//! URL slugs derived from post titles.

use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Base used when a title has no characters that survive normalization.
pub const FALLBACK_SLUG_BASE: &str = "post";

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Slug(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The slug is invalid: {0:?}")]
pub struct InvalidSlugError(String);

impl Slug {
    /// Accepts a non-empty string of lowercase ASCII letters, digits and
    /// inner hyphens.
    pub fn new(slug: String) -> Result<Self, InvalidSlugError> {
        let valid = !slug.is_empty()
            && !slug.starts_with('-')
            && !slug.ends_with('-')
            && slug
                .bytes()
                .all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-');

        if valid {
            Ok(Self(slug))
        } else {
            Err(InvalidSlugError(slug))
        }
    }

    /// Normalizes a title into the base slug: lowercase, drop everything but
    /// `[a-z0-9]`, whitespace and `-`, turn each whitespace run into one `-`,
    /// then trim hyphens from both ends.
    #[must_use]
    pub fn base_for_title(title: &str) -> Self {
        let mut slug = String::with_capacity(title.len());
        let mut in_whitespace = false;

        for ch in title.chars().flat_map(char::to_lowercase) {
            if ch.is_whitespace() {
                if !in_whitespace {
                    slug.push('-');
                }
                in_whitespace = true;
            } else if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
                slug.push(ch);
                in_whitespace = false;
            }
        }

        let trimmed = slug.trim_matches('-');
        if trimmed.is_empty() {
            Self(FALLBACK_SLUG_BASE.to_owned())
        } else {
            Self(trimmed.to_owned())
        }
    }

    /// `self`, then `self-1`, `self-2`, and so on.
    #[must_use]
    pub fn candidates(&self) -> SlugCandidates {
        SlugCandidates {
            base: self.clone(),
            next_suffix: 0,
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

impl Display for Slug {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Slug {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Slug::new(inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Slug"))
    }
}

/// Never yields the same candidate twice.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct SlugCandidates {
    base: Slug,
    next_suffix: u64,
}

impl Iterator for SlugCandidates {
    type Item = Slug;

    fn next(&mut self) -> Option<Self::Item> {
        let suffix = self.next_suffix;
        self.next_suffix = suffix.checked_add(1)?;

        if suffix == 0 {
            Some(self.base.clone())
        } else {
            Some(Slug(format!("{}-{suffix}", self.base.0)))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::slug::{FALLBACK_SLUG_BASE, Slug};
    use rstest::rstest;

    #[rstest]
    #[case("Hello, World!", "hello-world")]
    #[case("  Leading and trailing  ", "leading-and-trailing")]
    #[case("Tabs\tand\nnewlines", "tabs-and-newlines")]
    #[case("Rust 2024: what's new?", "rust-2024-whats-new")]
    #[case("already-a-slug", "already-a-slug")]
    #[case("--dashes--", "dashes")]
    #[case("a - b", "a---b")]
    #[case("a ! b", "a-b")]
    #[case("snake_case_title", "snakecasetitle")]
    #[case("Crème brûlée", "crme-brle")]
    #[case("ÄBC", "bc")]
    fn base_slug_normalization(#[case] title: &str, #[case] expected: &str) {
        assert_eq!(Slug::base_for_title(title).get(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("!!!")]
    #[case("日本語")]
    #[case(" - ")]
    fn degenerate_titles_fall_back(#[case] title: &str) {
        assert_eq!(Slug::base_for_title(title).get(), FALLBACK_SLUG_BASE);
    }

    #[test]
    fn base_slugs_are_valid_slugs() {
        for title in ["Hello, World!", "", "a - b", "Ünïcödé"] {
            let base = Slug::base_for_title(title);
            assert_eq!(Slug::new(base.get().to_owned()), Ok(base));
        }
    }

    #[test]
    fn candidates_count_up_from_the_base() {
        let candidates: Vec<_> = Slug::base_for_title("Hello, World!")
            .candidates()
            .take(4)
            .map(Slug::into_inner)
            .collect();

        assert_eq!(
            candidates,
            ["hello-world", "hello-world-1", "hello-world-2", "hello-world-3"]
        );
    }

    #[rstest]
    #[case("")]
    #[case("Hello")]
    #[case("-leading")]
    #[case("trailing-")]
    #[case("under_score")]
    #[case("sp ace")]
    fn invalid_slugs(#[case] slug: &str) {
        assert!(Slug::new(slug.to_owned()).is_err());
    }

    #[test]
    fn deserialization_validates() {
        assert!(serde_json::from_str::<Slug>(r#""hello-world-1""#).is_ok());
        assert!(serde_json::from_str::<Slug>(r#""Hello World""#).is_err());
    }
}
