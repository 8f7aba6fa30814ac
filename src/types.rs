//! Core types for auto-dedupe

use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Check that a table or column name is a plain SQL identifier.
///
/// Identifiers end up embedded in generated statements (they cannot be bound
/// parameters), so anything outside `[A-Za-z_][A-Za-z0-9_]*` is rejected.
pub fn validate_identifier(name: &str) -> Result<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

/// Identifier of a mergeable entity (e.g. a contact)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Create an id, rejecting zero and negative values
    pub fn new(raw: i64) -> Result<Self> {
        u64::try_from(raw)
            .ok()
            .filter(|v| *v > 0)
            .map(Self)
            .ok_or(Error::InvalidEntityId(raw))
    }

    /// Raw integer value
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Value form used in filters and assignments
    #[allow(clippy::cast_possible_wrap)]
    pub const fn value(self) -> Value {
        Value::Integer(self.0 as i64)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EntityId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw: i64 = s
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("not an entity id: {s:?}")))?;
        Self::new(raw)
    }
}

/// The table holding the entities being merged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityTable {
    /// Table name (e.g. `civicrm_contact`)
    pub table: String,
    /// Primary key column
    #[serde(default = "default_key")]
    pub key: String,
    /// Flag column set to 1 when an entity has been merged away
    #[serde(default = "default_superseded")]
    pub superseded_column: String,
    /// Tag a compound-key discriminator column must hold for a reference to
    /// point at this entity type. Defaults to the table name.
    #[serde(default)]
    pub type_tag: Option<String>,
}

fn default_key() -> String {
    "id".to_string()
}

fn default_superseded() -> String {
    "is_deleted".to_string()
}

impl EntityTable {
    /// Create an entity table description with default key/flag columns
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: default_key(),
            superseded_column: default_superseded(),
            type_tag: None,
        }
    }

    /// Discriminator tag for compound references
    pub fn tag(&self) -> &str {
        self.type_tag.as_deref().unwrap_or(&self.table)
    }

    /// The root reference column (`table.key`)
    pub fn root_column(&self) -> ColumnKey {
        ColumnKey::new(&self.table, &self.key)
    }

    /// Filter selecting active (not superseded) entities among `ids`
    pub fn active_filter(&self, ids: &[EntityId]) -> Filter {
        Filter::new()
            .one_of(&self.key, ids.iter().map(|id| id.value()).collect())
            .eq(&self.superseded_column, Value::Integer(0))
    }
}

/// A `table.column` pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColumnKey {
    /// Table name
    pub table: String,
    /// Column name
    pub column: String,
}

impl ColumnKey {
    /// Create a key without validation (callers own the names)
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Parse `table.column`, validating both identifiers
    pub fn parse(s: &str) -> Result<Self> {
        let (table, column) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| Error::Config(format!("expected table.column, got {s:?}")))?;
        validate_identifier(table)?;
        validate_identifier(column)?;
        Ok(Self::new(table, column))
    }
}

impl TryFrom<String> for ColumnKey {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ColumnKey> for String {
    fn from(key: ColumnKey) -> Self {
        key.to_string()
    }
}

impl std::fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// Sibling column that qualifies a polymorphic reference
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Discriminator {
    /// Sibling column name (e.g. `entity_table`)
    pub column: String,
    /// Value the sibling must hold for the reference to be ours
    pub tag: String,
}

/// A schema location that can hold an [`EntityId`]
///
/// Produced once by schema discovery. A location returned by
/// [`locate`](crate::merge::locate) is a `ReferenceColumn` known to
/// currently hold a given id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReferenceColumn {
    /// Table name
    pub table: String,
    /// Column holding the entity id
    pub column: String,
    /// Compound-key discriminator, if the column is polymorphic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,
}

impl ReferenceColumn {
    /// A plain foreign-key column
    pub fn simple(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            discriminator: None,
        }
    }

    /// A polymorphic column qualified by a sibling discriminator
    pub fn compound(
        table: impl Into<String>,
        column: impl Into<String>,
        discriminator: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            discriminator: Some(Discriminator {
                column: discriminator.into(),
                tag: tag.into(),
            }),
        }
    }

    /// The `table.column` key used by classification lists
    pub fn key(&self) -> ColumnKey {
        ColumnKey::new(&self.table, &self.column)
    }

    /// Filter selecting rows of this column that refer to `id`
    pub fn filter(&self, id: EntityId) -> Filter {
        let filter = Filter::new().eq(&self.column, id.value());
        match &self.discriminator {
            Some(d) => filter.eq(&d.column, Value::Text(d.tag.clone())),
            None => filter,
        }
    }
}

impl std::fmt::Display for ReferenceColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)?;
        if let Some(d) = &self.discriminator {
            write!(f, " [{} = '{}']", d.column, d.tag)?;
        }
        Ok(())
    }
}

/// A raw column value as read from the store
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL
    #[default]
    Null,
    /// Integer
    Integer(i64),
    /// Floating point
    Real(f64),
    /// Text
    Text(String),
}

impl Value {
    /// NULL or the empty string
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.is_empty(),
            Self::Integer(_) | Self::Real(_) => false,
        }
    }

    /// Text form, with NULL read as the empty string
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Null => Cow::Borrowed(""),
            Self::Integer(v) => Cow::Owned(v.to_string()),
            Self::Real(v) => Cow::Owned(v.to_string()),
            Self::Text(s) => Cow::Borrowed(s),
        }
    }

    /// Numeric form, with NULL and non-numeric text read as 0
    #[allow(clippy::cast_precision_loss)]
    pub fn as_number(&self) -> f64 {
        match self {
            Self::Null => 0.0,
            Self::Integer(v) => *v as f64,
            Self::Real(v) => *v,
            Self::Text(s) => s.trim().parse().unwrap_or(0.0),
        }
    }

    /// SQL-style equality used by filters: NULL matches nothing
    #[allow(clippy::float_cmp)]
    pub fn sql_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, _) | (_, Self::Null) => false,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Text(_), _) | (_, Self::Text(_)) => self.as_text() == other.as_text(),
            _ => self.as_number() == other.as_number(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

/// One record: column name to value. Absent columns read as NULL.
pub type Row = BTreeMap<String, Value>;

/// A single condition of a [`Filter`]
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column = value`
    Equals {
        /// Column name
        column: String,
        /// Bound value
        value: Value,
    },
    /// `column IN (values...)`
    OneOf {
        /// Column name
        column: String,
        /// Bound values
        values: Vec<Value>,
    },
}

impl Condition {
    /// Column this condition constrains
    pub fn column(&self) -> &str {
        match self {
            Self::Equals { column, .. } | Self::OneOf { column, .. } => column,
        }
    }

    /// Evaluate against an in-memory row
    pub fn matches(&self, row: &Row) -> bool {
        let actual = row.get(self.column()).unwrap_or(&Value::Null);
        match self {
            Self::Equals { value, .. } => actual.sql_eq(value),
            Self::OneOf { values, .. } => values.iter().any(|v| actual.sql_eq(v)),
        }
    }
}

/// Conjunction of conditions; values are always bound, never interpolated
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    /// Conditions, all of which must hold
    pub conditions: Vec<Condition>,
}

impl Filter {
    /// Empty filter (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `column = value`
    #[must_use]
    pub fn eq(mut self, column: &str, value: Value) -> Self {
        self.conditions.push(Condition::Equals {
            column: column.to_string(),
            value,
        });
        self
    }

    /// Add `column IN (values...)`
    #[must_use]
    pub fn one_of(mut self, column: &str, values: Vec<Value>) -> Self {
        self.conditions.push(Condition::OneOf {
            column: column.to_string(),
            values,
        });
        self
    }

    /// Evaluate against an in-memory row
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }

    /// Columns referenced by this filter
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.conditions.iter().map(Condition::column)
    }
}
