//! Mock store for testing
//!
//! Wraps a [`MemoryStore`] so results stay realistic, while recording calls
//! and allowing faults to be injected at each seam.

#![allow(dead_code)]

use async_trait::async_trait;
use auto_dedupe::error::{Error, Result};
use auto_dedupe::merge::CommandBatch;
use auto_dedupe::store::{
    ApplyStatus, AuditRecorder, MemoryStore, MergeApplier, RowStore, SchemaSource,
};
use auto_dedupe::types::{EntityId, Filter, Row};
use std::sync::Mutex;
use std::time::Duration;

/// Call-recording, fault-injecting store
///
/// This manually implements the store traits rather than using a mocking
/// crate, so every seam can be exercised against real data.
///
/// Features:
/// - Call tracking for verification
/// - Error injection per seam
/// - Rejected (rolled back) applies
/// - Delayed applies for concurrency tests
pub struct MockStore {
    inner: MemoryStore,
    // Call tracking
    count_calls: Mutex<Vec<String>>,
    fetch_calls: Mutex<Vec<String>>,
    apply_calls: Mutex<Vec<CommandBatch>>,
    record_calls: Mutex<Vec<EntityId>>,
    // Error injection
    error_on_count: Mutex<Option<String>>,
    error_on_apply: Mutex<Option<String>>,
    reject_on_apply: Mutex<Option<String>>,
    error_on_record: Mutex<Option<String>>,
    apply_delay: Mutex<Option<Duration>>,
}

impl MockStore {
    /// Wrap a populated memory store
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            count_calls: Mutex::new(Vec::new()),
            fetch_calls: Mutex::new(Vec::new()),
            apply_calls: Mutex::new(Vec::new()),
            record_calls: Mutex::new(Vec::new()),
            error_on_count: Mutex::new(None),
            error_on_apply: Mutex::new(None),
            reject_on_apply: Mutex::new(None),
            error_on_record: Mutex::new(None),
            apply_delay: Mutex::new(None),
        }
    }

    /// The wrapped store
    pub const fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    // === Error injection methods ===

    /// Make `count` return an error
    pub fn fail_count(&self, msg: &str) {
        *self.error_on_count.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `apply` return an error
    pub fn fail_apply(&self, msg: &str) {
        *self.error_on_apply.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `apply` roll back with a reason
    pub fn reject_apply(&self, reason: &str) {
        *self.reject_on_apply.lock().unwrap() = Some(reason.to_string());
    }

    /// Make `record` return an error
    pub fn fail_record(&self, msg: &str) {
        *self.error_on_record.lock().unwrap() = Some(msg.to_string());
    }

    /// Sleep inside `apply` before writing
    pub fn delay_apply(&self, delay: Duration) {
        *self.apply_delay.lock().unwrap() = Some(delay);
    }

    // === Call tracking accessors ===

    /// Tables passed to `count`, in call order
    pub fn count_calls(&self) -> Vec<String> {
        self.count_calls.lock().unwrap().clone()
    }

    /// Tables passed to `fetch_first`, in call order
    pub fn fetch_calls(&self) -> Vec<String> {
        self.fetch_calls.lock().unwrap().clone()
    }

    /// Batches passed to `apply`
    pub fn apply_calls(&self) -> Vec<CommandBatch> {
        self.apply_calls.lock().unwrap().clone()
    }

    /// Entities passed to `record`
    pub fn record_calls(&self) -> Vec<EntityId> {
        self.record_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SchemaSource for MockStore {
    async fn list_tables(&self) -> Result<Vec<String>> {
        self.inner.list_tables().await
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<String>> {
        self.inner.describe_table(table).await
    }

    async fn custom_entity_tables(
        &self,
        registry: &str,
        entity_types: &[String],
    ) -> Result<Vec<String>> {
        self.inner.custom_entity_tables(registry, entity_types).await
    }
}

#[async_trait]
impl RowStore for MockStore {
    async fn count(&self, table: &str, filter: &Filter) -> Result<u64> {
        self.count_calls.lock().unwrap().push(table.to_string());
        if let Some(msg) = self.error_on_count.lock().unwrap().clone() {
            return Err(Error::Store(msg));
        }
        self.inner.count(table, filter).await
    }

    async fn fetch_first(
        &self,
        table: &str,
        columns: &[String],
        filter: &Filter,
    ) -> Result<Option<Row>> {
        self.fetch_calls.lock().unwrap().push(table.to_string());
        self.inner.fetch_first(table, columns, filter).await
    }
}

#[async_trait]
impl MergeApplier for MockStore {
    async fn apply(&self, batch: &CommandBatch) -> Result<ApplyStatus> {
        self.apply_calls.lock().unwrap().push(batch.clone());
        let delay = *self.apply_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(msg) = self.error_on_apply.lock().unwrap().clone() {
            return Err(Error::Store(msg));
        }
        if let Some(reason) = self.reject_on_apply.lock().unwrap().clone() {
            return Ok(ApplyStatus::RolledBack { reason });
        }
        self.inner.apply(batch).await
    }
}

#[async_trait]
impl AuditRecorder for MockStore {
    async fn record(&self, entity: EntityId, subject: &str, message: &str) -> Result<()> {
        self.record_calls.lock().unwrap().push(entity);
        if let Some(msg) = self.error_on_record.lock().unwrap().clone() {
            return Err(Error::Store(msg));
        }
        self.inner.record(entity, subject, message).await
    }
}
