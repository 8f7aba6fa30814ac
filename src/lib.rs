//! auto-dedupe - safe automatic merging of duplicate entity records
//!
//! Given two suspected duplicates, the engine finds every column in the
//! schema that can reference the entity, classifies the references held by
//! the losing record, compares examined record pairs column by column, and
//! either reports why the merge is unsafe or emits an ordered command batch
//! for atomic application.
//!
//! ```text
//! SchemaSource ──discover_catalog──▶ SchemaCatalog
//!                                        │
//! MergeConfig ──▶ MergeEngine::plan_merge(keep, lose) ──▶ MergeOutcome
//!                                        │ Ready
//!                                        ▼
//!                          execute_merge(batch, applier)
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod merge;
pub mod policy;
pub mod store;
pub mod types;

pub use error::{Error, Result};
