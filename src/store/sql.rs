//! SQL rendering for filters and merge commands.
//!
//! Identifiers are validated and double-quoted; values are always emitted as
//! `?` placeholders with a separate parameter list.

use crate::error::Result;
use crate::merge::{CommandBatch, MergeCommand};
use crate::types::{Condition, EntityTable, Filter, Value, validate_identifier};

/// A statement with positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with `?` placeholders
    pub sql: String,
    /// Bound values, in placeholder order
    pub params: Vec<Value>,
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{};", self.sql)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(render_literal).collect();
            write!(f, " -- params: {}", params.join(", "))?;
        }
        Ok(())
    }
}

fn render_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(v) => v.to_string(),
        Value::Real(v) => v.to_string(),
        Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

/// Validate and quote an identifier
pub fn quote_ident(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{name}\""))
}

/// Render a filter as a `WHERE` body, appending its values to `params`
pub fn where_clause(filter: &Filter, params: &mut Vec<Value>) -> Result<String> {
    if filter.conditions.is_empty() {
        return Ok("1 = 1".to_string());
    }
    let mut parts = Vec::with_capacity(filter.conditions.len());
    for condition in &filter.conditions {
        match condition {
            Condition::Equals { column, value } => {
                parts.push(format!("{} = ?", quote_ident(column)?));
                params.push(value.clone());
            }
            Condition::OneOf { column, values } if values.is_empty() => {
                quote_ident(column)?;
                parts.push("0 = 1".to_string());
            }
            Condition::OneOf { column, values } => {
                let marks = vec!["?"; values.len()].join(", ");
                parts.push(format!("{} IN ({marks})", quote_ident(column)?));
                params.extend(values.iter().cloned());
            }
        }
    }
    Ok(parts.join(" AND "))
}

/// `SELECT COUNT(*)`
pub fn count(table: &str, filter: &Filter) -> Result<Statement> {
    let mut params = Vec::new();
    let clause = where_clause(filter, &mut params)?;
    Ok(Statement {
        sql: format!("SELECT COUNT(*) FROM {} WHERE {clause}", quote_ident(table)?),
        params,
    })
}

/// `SELECT columns ... LIMIT 1`
pub fn select_first(table: &str, columns: &[String], filter: &Filter) -> Result<Statement> {
    let mut params = Vec::new();
    let clause = where_clause(filter, &mut params)?;
    let cols = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Result<Vec<_>>>()?;
    let projection = if cols.is_empty() {
        "*".to_string()
    } else {
        cols.join(", ")
    };
    Ok(Statement {
        sql: format!(
            "SELECT {projection} FROM {} WHERE {clause} LIMIT 1",
            quote_ident(table)?
        ),
        params,
    })
}

/// Render one merge command
pub fn command(entity: &EntityTable, cmd: &MergeCommand) -> Result<Statement> {
    let mut params = Vec::new();
    let sql = match cmd {
        MergeCommand::UpdateReference {
            location,
            from,
            to,
            assignments,
        } => {
            let mut set = format!("{} = ?", quote_ident(&location.column)?);
            params.push(to.value());
            for assignment in assignments {
                set.push_str(&format!(", {} = ?", quote_ident(&assignment.column)?));
                params.push(assignment.value.clone());
            }
            let clause = where_clause(&location.filter(*from), &mut params)?;
            format!(
                "UPDATE {} SET {set} WHERE {clause}",
                quote_ident(&location.table)?
            )
        }
        MergeCommand::DeleteRecord { location, from } => {
            let clause = where_clause(&location.filter(*from), &mut params)?;
            format!("DELETE FROM {} WHERE {clause}", quote_ident(&location.table)?)
        }
        MergeCommand::MarkSuperseded { entity: id } => {
            params.push(Value::Integer(1));
            params.push(id.value());
            format!(
                "UPDATE {} SET {} = ? WHERE {} = ?",
                quote_ident(&entity.table)?,
                quote_ident(&entity.superseded_column)?,
                quote_ident(&entity.key)?
            )
        }
    };
    Ok(Statement { sql, params })
}

/// Render every command of a batch, in order
pub fn batch(batch: &CommandBatch) -> Result<Vec<Statement>> {
    batch
        .commands
        .iter()
        .map(|cmd| command(&batch.entity, cmd))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::Assignment;
    use crate::types::{EntityId, ReferenceColumn};

    fn id(v: i64) -> EntityId {
        EntityId::new(v).unwrap()
    }

    #[test]
    fn test_count_binds_values() {
        let filter = Filter::new()
            .one_of("id", vec![Value::Integer(1), Value::Integer(2)])
            .eq("is_deleted", Value::Integer(0));
        let stmt = count("people", &filter).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT COUNT(*) FROM \"people\" WHERE \"id\" IN (?, ?) AND \"is_deleted\" = ?"
        );
        assert_eq!(stmt.params.len(), 3);
    }

    #[test]
    fn test_rejects_bad_identifier() {
        let filter = Filter::new().eq("id; DROP TABLE x", Value::Integer(1));
        assert!(count("people", &filter).is_err());
        assert!(count("peo\"ple", &Filter::new()).is_err());
    }

    #[test]
    fn test_update_reference_with_assignments() {
        let cmd = MergeCommand::UpdateReference {
            location: ReferenceColumn::compound("notes", "entity_id", "entity_table", "people"),
            from: id(2),
            to: id(1),
            assignments: vec![Assignment {
                column: "is_primary".to_string(),
                value: Value::Integer(0),
            }],
        };
        let stmt = command(&EntityTable::new("people"), &cmd).unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE \"notes\" SET \"entity_id\" = ?, \"is_primary\" = ? \
             WHERE \"entity_id\" = ? AND \"entity_table\" = ?"
        );
        assert_eq!(
            stmt.params,
            vec![
                Value::Integer(1),
                Value::Integer(0),
                Value::Integer(2),
                Value::from("people")
            ]
        );
    }

    #[test]
    fn test_mark_superseded() {
        let stmt = command(
            &EntityTable::new("people"),
            &MergeCommand::MarkSuperseded { entity: id(9) },
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE \"people\" SET \"is_deleted\" = ? WHERE \"id\" = ?"
        );
        assert_eq!(stmt.to_string(), format!("{}; -- params: 1, 9", stmt.sql));
    }
}
