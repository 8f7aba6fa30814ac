//! SQL `LIKE`-style name patterns used by schema discovery.

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A `LIKE` pattern: `%` matches any run of characters, `_` exactly one.
///
/// Matching is case-insensitive, as with the default collation of most
/// information-schema tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LikePattern {
    source: String,
    regex: Regex,
}

impl LikePattern {
    /// Compile a pattern
    pub fn new(source: &str) -> Result<Self> {
        let mut expr = String::with_capacity(source.len() + 8);
        expr.push_str("(?i)^");
        for ch in source.chars() {
            match ch {
                '%' => expr.push_str(".*"),
                '_' => expr.push('.'),
                other => expr.push_str(&regex::escape(&other.to_string())),
            }
        }
        expr.push('$');
        let regex = Regex::new(&expr)
            .map_err(|e| Error::Config(format!("bad name pattern {source:?}: {e}")))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// Test a name against the pattern
    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl TryFrom<String> for LikePattern {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(&s)
    }
}

impl From<LikePattern> for String {
    fn from(p: LikePattern) -> Self {
        p.source
    }
}

impl PartialEq for LikePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl std::fmt::Display for LikePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// True if any pattern matches `name`
pub fn any_match(patterns: &[LikePattern], name: &str) -> bool {
    patterns.iter().any(|p| p.matches(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_wildcard() {
        let p = LikePattern::new("%contact_id%").unwrap();
        assert!(p.matches("contact_id"));
        assert!(p.matches("source_contact_id"));
        assert!(p.matches("contact_id_298"));
        assert!(!p.matches("contact"));
    }

    #[test]
    fn test_underscore_matches_single_char() {
        let p = LikePattern::new("temp_%").unwrap();
        assert!(p.matches("temp_x"));
        assert!(p.matches("tempAx"));
        assert!(!p.matches("temp"));
    }

    #[test]
    fn test_case_insensitive_and_anchored() {
        let p = LikePattern::new("%_cache").unwrap();
        assert!(p.matches("civicrm_ACL_Cache"));
        assert!(!p.matches("civicrm_cache_x"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let p = LikePattern::new("a.b").unwrap();
        assert!(p.matches("a.b"));
        assert!(!p.matches("axb"));
    }

    #[test]
    fn test_exact_pattern() {
        let p = LikePattern::new("employer_id").unwrap();
        assert!(p.matches("employer_id"));
        assert!(!p.matches("old_employer_id"));
        assert_eq!(p.to_string(), "employer_id");
    }
}
