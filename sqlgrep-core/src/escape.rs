//! Escaping of search text for `LIKE` predicates.

use regex::Regex;
use std::sync::OnceLock;

/// Escape character declared in every generated `LIKE ... ESCAPE` clause.
pub const LIKE_ESCAPE_CHAR: char = '\\';

fn metacharacters() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"([\\%_\[])").expect("Invalid LIKE metacharacter pattern")
    })
}

/// Prefixes every `LIKE` metacharacter (`\`, `%`, `_`, `[`) with a backslash.
///
/// Other characters, `]` included, pass through unchanged. Already escaped
/// text is escaped again.
///
/// ```rust
/// use sqlgrep_core::escape::escape_like;
///
/// assert_eq!(escape_like("100%"), r"100\%");
/// ```
pub fn escape_like(text: &str) -> String {
    metacharacters().replace_all(text, r"\$1").into_owned()
}

/// A `%text%` pattern whose metacharacters have been escaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikePattern(String);

impl LikePattern {
    /// Builds the substring pattern for `text`.
    pub fn contains(text: &str) -> Self {
        Self(format!("%{}%", escape_like(text)))
    }

    /// The pattern as bound to the query.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LikePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_escapes_every_metacharacter() {
        let escaped = escape_like("50%_off[sale]\\");
        assert_eq!(escaped, r"50\%\_off\[sale]\\");
    }

    #[test]
    fn test_plain_text_is_unchanged() {
        assert_eq!(escape_like("Alice Smith"), "Alice Smith");
        assert_eq!(escape_like(""), "");
        assert_eq!(escape_like("a]b^c-d"), "a]b^c-d");
    }

    #[test]
    fn test_no_idempotence() {
        assert_eq!(escape_like(r"\%"), r"\\\%");
    }

    #[test]
    fn test_contains_pattern() {
        assert_eq!(LikePattern::contains("_id").as_str(), r"%\_id%");
        assert_eq!(LikePattern::contains("x").to_string(), "%x%");
    }

    proptest! {
        #[test]
        fn prop_unescaping_restores_input(text in ".{0,64}") {
            let escaped = escape_like(&text);
            let mut restored = String::new();
            let mut chars = escaped.chars();
            while let Some(ch) = chars.next() {
                if ch == LIKE_ESCAPE_CHAR {
                    let next = chars.next();
                    prop_assert!(matches!(next, Some('\\' | '%' | '_' | '[')));
                    restored.extend(next);
                } else {
                    prop_assert!(!matches!(ch, '%' | '_' | '['));
                    restored.push(ch);
                }
            }
            prop_assert_eq!(restored, text);
        }
    }
}
