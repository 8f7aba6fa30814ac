//! SQLite-backed store.

use crate::error::{Error, Result};
use crate::merge::CommandBatch;
use crate::store::sql::{self, Statement};
use crate::store::{ApplyStatus, AuditRecorder, MergeApplier, RowStore, SchemaSource};
use crate::types::{EntityId, Filter, Row, Value};
use async_trait::async_trait;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, ToSql, params_from_iter};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Self::Integer(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            Self::Real(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn read_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Where audit notes go
#[derive(Debug, Clone)]
struct AuditTarget {
    table: String,
    entity_table: String,
}

/// Store backed by a single SQLite connection.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    audit: Option<AuditTarget>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| Error::Store(format!("failed to open {}: {e}", path.display())))?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Store(format!("failed to open in-memory database: {e}")))?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing connection
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            audit: None,
        }
    }

    /// Record audit notes into `table`.
    ///
    /// The table needs `entity_table`, `entity_id`, `subject` and `note`
    /// columns; `entity_table` is filled with `entity_table`.
    #[must_use]
    pub fn with_audit_table(mut self, table: &str, entity_table: &str) -> Self {
        self.audit = Some(AuditTarget {
            table: table.to_string(),
            entity_table: entity_table.to_string(),
        });
        self
    }

    /// Run raw SQL (schema setup, fixtures)
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Store("connection lock poisoned".to_string()))
    }
}

fn query_count(conn: &Connection, stmt: &Statement) -> Result<u64> {
    let n: i64 = conn.query_row(&stmt.sql, params_from_iter(stmt.params.iter()), |row| {
        row.get(0)
    })?;
    u64::try_from(n).map_err(|_| Error::Store(format!("negative count {n}")))
}

#[async_trait]
impl SchemaSource for SqliteStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<String>> {
        let quoted = sql::quote_ident(table)?;
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({quoted})"))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    async fn custom_entity_tables(
        &self,
        registry: &str,
        entity_types: &[String],
    ) -> Result<Vec<String>> {
        let types: Vec<Value> = entity_types.iter().map(|t| Value::from(t.as_str())).collect();
        let mut params = Vec::new();
        let clause = sql::where_clause(&Filter::new().one_of("extends", types), &mut params)?;
        let query = format!(
            "SELECT table_name FROM {} WHERE {clause}",
            sql::quote_ident(registry)?
        );
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&query)?;
        let tables = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                row.get::<_, String>(0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tables)
    }
}

#[async_trait]
impl RowStore for SqliteStore {
    async fn count(&self, table: &str, filter: &Filter) -> Result<u64> {
        let stmt = sql::count(table, filter)?;
        let conn = self.lock()?;
        query_count(&conn, &stmt)
    }

    async fn fetch_first(
        &self,
        table: &str,
        columns: &[String],
        filter: &Filter,
    ) -> Result<Option<Row>> {
        let stmt = sql::select_first(table, columns, filter)?;
        let conn = self.lock()?;
        let mut prepared = conn.prepare(&stmt.sql)?;
        let names: Vec<String> = prepared
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let mut rows = prepared.query(params_from_iter(stmt.params.iter()))?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let mut out = Row::new();
        for (i, name) in names.iter().enumerate() {
            out.insert(name.clone(), read_value(row.get_ref(i)?));
        }
        Ok(Some(out))
    }
}

#[async_trait]
impl MergeApplier for SqliteStore {
    async fn apply(&self, batch: &CommandBatch) -> Result<ApplyStatus> {
        let statements = sql::batch(batch)?;
        let recheck = sql::count(
            &batch.entity.table,
            &batch.entity.active_filter(&[batch.keep, batch.lose]),
        )?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        if query_count(&tx, &recheck)? != 2 {
            return Ok(ApplyStatus::RolledBack {
                reason: format!(
                    "entities {} and {} are no longer both active",
                    batch.keep, batch.lose
                ),
            });
        }

        let mut rows_affected = 0u64;
        for stmt in &statements {
            match tx.execute(&stmt.sql, params_from_iter(stmt.params.iter())) {
                Ok(n) => rows_affected += n as u64,
                Err(e) => {
                    warn!(sql = %stmt.sql, error = %e, "merge statement failed, rolling back");
                    return Ok(ApplyStatus::RolledBack {
                        reason: format!("{}: {e}", stmt.sql),
                    });
                }
            }
        }

        tx.commit()?;
        debug!(rows_affected, keep = %batch.keep, lose = %batch.lose, "merge committed");
        Ok(ApplyStatus::Committed { rows_affected })
    }
}

#[async_trait]
impl AuditRecorder for SqliteStore {
    async fn record(&self, entity: EntityId, subject: &str, message: &str) -> Result<()> {
        let Some(target) = &self.audit else {
            debug!(%entity, subject, "no audit table configured");
            return Ok(());
        };
        let query = format!(
            "INSERT INTO {} (entity_table, entity_id, subject, note) VALUES (?1, ?2, ?3, ?4)",
            sql::quote_ident(&target.table)?
        );
        let conn = self.lock()?;
        conn.execute(
            &query,
            rusqlite::params![target.entity_table, entity.value(), subject, message],
        )?;
        Ok(())
    }
}
