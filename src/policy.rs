//! Column behavior policy
//!
//! Maps `(table, column)` to the comparison strategy used when two records
//! of an examined table are about to be merged, and implements each
//! strategy's blocking rule. Any column not listed falls back to
//! [`ColumnBehavior::BlockOnDifferentValue`]; a table with no entry at all
//! is reported as unclassified.

use crate::error::{Error, Result};
use crate::types::Value;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^[0-9a-z_.-]+@",
        r"(([0-9]{1,3}\.){3}[0-9]{1,3}|([0-9a-z][0-9a-z-]*[0-9a-z]\.)+[a-z]{2,3})$",
    ))
    .expect("email pattern is valid")
});

/// Comparison strategy for one column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnBehavior {
    /// Block when the losing value is non-blank and differs
    BlockOnDifferentValue,
    /// Block when the losing value is numerically greater (consent flags)
    BlockIfGreater,
    /// Block unless the losing value is a prefix of the kept value
    IgnoreTruncation,
    /// Like `BlockOnDifferentValue`, but a single initial matching the kept
    /// value's first letter is accepted
    AllowSingleCharBlankOrMatch,
    /// Like `BlockOnDifferentValue`, but email addresses and truncations of
    /// the kept value are accepted
    IgnoreEmailOrTruncation,
    /// Never block
    Ignore,
}

impl ColumnBehavior {
    /// Whether merging away `lost` in favor of `kept` would lose information.
    ///
    /// NULL and the empty string are equivalent for text comparisons; NULL is
    /// 0 for numeric ones. Not symmetric: `kept` and `lost` play different
    /// roles for most behaviors.
    pub fn blocks(self, kept: &Value, lost: &Value) -> bool {
        let a = kept.as_text();
        let b = lost.as_text();
        match self {
            Self::BlockOnDifferentValue => !lost.is_blank() && b != a,
            Self::BlockIfGreater => lost.as_number() > kept.as_number(),
            Self::IgnoreTruncation => !a.starts_with(&*b),
            Self::AllowSingleCharBlankOrMatch => {
                let initial: String = a.chars().take(1).flat_map(char::to_uppercase).collect();
                !lost.is_blank() && b != a && initial != b.to_uppercase()
            }
            Self::IgnoreEmailOrTruncation => {
                !lost.is_blank() && b != a && !EMAIL.is_match(&b) && !a.starts_with(&*b)
            }
            Self::Ignore => false,
        }
    }
}

impl std::fmt::Display for ColumnBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::BlockOnDifferentValue => "BlockOnDifferentValue",
            Self::BlockIfGreater => "BlockIfGreater",
            Self::IgnoreTruncation => "IgnoreTruncation",
            Self::AllowSingleCharBlankOrMatch => "AllowSingleCharBlankOrMatch",
            Self::IgnoreEmailOrTruncation => "IgnoreEmailOrTruncation",
            Self::Ignore => "Ignore",
        };
        f.pad(name)
    }
}

/// Lookup table from `(table, column)` to [`ColumnBehavior`]
///
/// Serialized as `{ table = { column = "Behavior" } }`. An empty inner map
/// marks a table as classified with every column on the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BehaviorTable(BTreeMap<String, BTreeMap<String, ColumnBehavior>>);

impl BehaviorTable {
    /// Empty table (every table unclassified)
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a table as classified without listing any columns
    #[must_use]
    pub fn classify_table(mut self, table: &str) -> Self {
        self.0.entry(table.to_string()).or_default();
        self
    }

    /// Set the behavior of one column
    #[must_use]
    pub fn with(mut self, table: &str, column: &str, behavior: ColumnBehavior) -> Self {
        self.0
            .entry(table.to_string())
            .or_default()
            .insert(column.to_string(), behavior);
        self
    }

    /// Whether the table has an entry
    pub fn is_classified(&self, table: &str) -> bool {
        self.0.contains_key(table)
    }

    /// Behavior for a column, defaulting to `BlockOnDifferentValue`
    pub fn behavior_of(&self, table: &str, column: &str) -> Result<ColumnBehavior> {
        let columns = self
            .0
            .get(table)
            .ok_or_else(|| Error::UnclassifiedTable(table.to_string()))?;
        Ok(columns
            .get(column)
            .copied()
            .unwrap_or(ColumnBehavior::BlockOnDifferentValue))
    }

    /// Iterate over `(table, column, behavior)` entries
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, ColumnBehavior)> {
        self.0.iter().flat_map(|(table, cols)| {
            cols.iter()
                .map(move |(col, b)| (table.as_str(), col.as_str(), *b))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ColumnBehavior::*;

    fn t(s: &str) -> Value {
        Value::from(s)
    }

    #[test]
    fn test_block_on_different_value_blank_never_blocks() {
        for kept in [Value::Null, t(""), t("x"), Value::Integer(4)] {
            assert!(!BlockOnDifferentValue.blocks(&kept, &Value::Null));
            assert!(!BlockOnDifferentValue.blocks(&kept, &t("")));
        }
    }

    #[test]
    fn test_block_on_different_value() {
        assert!(BlockOnDifferentValue.blocks(&t("a"), &t("b")));
        assert!(BlockOnDifferentValue.blocks(&Value::Null, &t("b")));
        assert!(!BlockOnDifferentValue.blocks(&t("b"), &t("b")));
        assert!(!BlockOnDifferentValue.blocks(&Value::Integer(3), &t("3")));
    }

    #[test]
    fn test_block_if_greater() {
        assert!(BlockIfGreater.blocks(&Value::Integer(0), &Value::Integer(1)));
        assert!(BlockIfGreater.blocks(&Value::Null, &Value::Integer(1)));
        assert!(!BlockIfGreater.blocks(&Value::Integer(1), &Value::Integer(0)));
        assert!(!BlockIfGreater.blocks(&Value::Integer(1), &Value::Integer(1)));
        assert!(!BlockIfGreater.blocks(&Value::Integer(1), &Value::Null));
    }

    #[test]
    fn test_ignore_truncation_is_asymmetric() {
        assert!(IgnoreTruncation.blocks(&t("Jo"), &t("John")));
        assert!(!IgnoreTruncation.blocks(&t("John"), &t("Jo")));
        assert!(!IgnoreTruncation.blocks(&t("John"), &Value::Null));
        assert!(IgnoreTruncation.blocks(&t("john"), &t("Jo")));
        assert!(IgnoreTruncation.blocks(&Value::Null, &t("J")));
    }

    #[test]
    fn test_allow_single_char() {
        assert!(!AllowSingleCharBlankOrMatch.blocks(&t("John"), &t("J")));
        assert!(!AllowSingleCharBlankOrMatch.blocks(&t("John"), &t("j")));
        assert!(!AllowSingleCharBlankOrMatch.blocks(&t("John"), &t("John")));
        assert!(!AllowSingleCharBlankOrMatch.blocks(&t("John"), &Value::Null));
        assert!(AllowSingleCharBlankOrMatch.blocks(&t("John"), &t("Jo")));
        assert!(AllowSingleCharBlankOrMatch.blocks(&t("John"), &t("M")));
        assert!(AllowSingleCharBlankOrMatch.blocks(&Value::Null, &t("J")));
    }

    #[test]
    fn test_ignore_email_or_truncation() {
        let b = IgnoreEmailOrTruncation;
        assert!(!b.blocks(&t("Jane Smith"), &t("jane@example.org")));
        assert!(!b.blocks(&t("Jane Smith"), &t("Jane.Smith@Example.COM")));
        assert!(!b.blocks(&t("Jane Smith"), &t("Jane")));
        assert!(!b.blocks(&t("Jane Smith"), &Value::Null));
        assert!(b.blocks(&t("Jane Smith"), &t("J. Smith")));
        assert!(b.blocks(&t("Jane Smith"), &t("not an@email")));
    }

    #[test]
    fn test_email_top_level_domain_is_two_or_three_letters() {
        let b = IgnoreEmailOrTruncation;
        assert!(!b.blocks(&t("Jane Smith"), &t("jane@example.co")));
        assert!(!b.blocks(&t("Jane Smith"), &t("jane@192.168.0.1")));
        assert!(b.blocks(&t("Jane Smith"), &t("jane@example.info")));
        assert!(b.blocks(&t("Jane Smith"), &t("jane@example.museum")));
    }

    #[test]
    fn test_ignore_never_blocks() {
        assert!(!Ignore.blocks(&t("a"), &t("b")));
        assert!(!Ignore.blocks(&Value::Integer(0), &Value::Integer(99)));
    }

    #[test]
    fn test_behavior_table_default_deny() {
        let table = BehaviorTable::new()
            .with("people", "flag", BlockIfGreater)
            .classify_table("orders");

        assert_eq!(table.behavior_of("people", "flag").unwrap(), BlockIfGreater);
        assert_eq!(
            table.behavior_of("people", "unlisted").unwrap(),
            BlockOnDifferentValue
        );
        assert_eq!(
            table.behavior_of("orders", "anything").unwrap(),
            BlockOnDifferentValue
        );
        match table.behavior_of("widgets", "id") {
            Err(Error::UnclassifiedTable(name)) => assert_eq!(name, "widgets"),
            other => panic!("Expected UnclassifiedTable, got: {other:?}"),
        }
    }

    #[test]
    fn test_behavior_table_from_toml() {
        let table: BehaviorTable = toml::from_str(
            r#"
            [people]
            do_not_email = "BlockIfGreater"
            first_name = "AllowSingleCharBlankOrMatch"
            "#,
        )
        .unwrap();
        assert_eq!(
            table.behavior_of("people", "first_name").unwrap(),
            AllowSingleCharBlankOrMatch
        );
        assert_eq!(table.entries().count(), 2);
    }
}
