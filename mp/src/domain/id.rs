//! Run identifiers
//!
//! Format: `{6-hex}-run-{slug}`, where the hex comes from a v7 UUID's random bits and the
//! slug from the query. Short enough for log lines and file names.

use serde::{Deserialize, Serialize};

/// Longest slug kept from the query, in characters
const MAX_SLUG_CHARS: usize = 40;

/// Identifier of one plan run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// New id for a run over `query`
    pub fn new(query: &str) -> Self {
        let uuid = uuid::Uuid::now_v7().simple().to_string();
        // The leading v7 bits are a millisecond timestamp; take the random tail
        let hex_prefix = &uuid[uuid.len() - 6..];
        let slug = slugify(query);
        if slug.is_empty() {
            Self(format!("{}-run", hex_prefix))
        } else {
            Self(format!("{}-run-{}", hex_prefix, slug))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 6-character hex prefix
    pub fn hex_prefix(&self) -> &str {
        self.0.get(..6).unwrap_or(&self.0)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lowercase, collapse non-alphanumerics to single hyphens, cap the length
fn slugify(text: &str) -> String {
    let slug = text
        .to_lowercase()
        .chars()
        // Apostrophes vanish, other separators become hyphens
        .filter_map(|c| match c {
            c if c.is_alphanumeric() => Some(c),
            '\'' | '\u{2018}' | '\u{2019}' => None,
            _ => Some('-'),
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    slug.chars()
        .take(MAX_SLUG_CHARS)
        .collect::<String>()
        .trim_end_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_shape() {
        let id = RunId::new("Compare Rust web frameworks");
        assert_eq!(id.hex_prefix().len(), 6);
        assert!(id.as_str().contains("-run-compare-rust-web-frameworks"));
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunId::new("same"), RunId::new("same"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("what's new?"), "whats-new");
        assert_eq!(slugify("  --  "), "");
    }

    #[test]
    fn test_slugify_keeps_non_ascii_letters() {
        assert_eq!(slugify("カレーライス 作り方"), "カレーライス-作り方");
    }

    #[test]
    fn test_slugify_caps_length() {
        let slug = slugify(&"word ".repeat(30));
        assert!(slug.chars().count() <= MAX_SLUG_CHARS);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_empty_query_still_yields_id() {
        let id = RunId::new("???");
        assert!(id.as_str().ends_with("-run"));
    }
}
