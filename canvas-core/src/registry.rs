//! Generic keyed record store consumed by the orchestrator.
//!
//! # Record model
//!
//! A record is a JSON object. The registry owns the `id` key: `create` stores
//! the record under the supplied id and every record handed back by `get` or
//! `read` carries that id in its `"id"` field, whatever the stored body said.
//!
//! `update` is a shallow merge: top-level keys present in the patch replace
//! the stored values, all other keys are kept.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ServiceError;

/// One stored record.
pub type Record = Map<String, Value>;

/// Field-equality predicate for [`Registry::read`]. An empty filter matches
/// every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    fields: Vec<(String, Value)>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the predicate `record[field] == value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.fields
            .iter()
            .all(|(field, expected)| record.get(field) == Some(expected))
    }
}

/// Keyed record store. Per-key operations are assumed atomic; nothing spans
/// more than one key.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Stores `record` under `id`, replacing any previous record.
    async fn create(&self, id: &str, record: Record) -> Result<(), ServiceError>;

    async fn get(&self, id: &str) -> Result<Option<Record>, ServiceError>;

    /// All records matching `filter`, in a stable order.
    async fn read(&self, filter: &RecordFilter) -> Result<Vec<Record>, ServiceError>;

    /// Merges `patch` into the record. Returns `false` if `id` is absent.
    async fn update(&self, id: &str, patch: Record) -> Result<bool, ServiceError>;

    /// Returns `false` if `id` is absent.
    async fn delete(&self, id: &str) -> Result<bool, ServiceError>;
}

/// Shallow merge used by registry implementations.
pub fn merge_patch(record: &mut Record, patch: Record) {
    for (key, value) in patch {
        record.insert(key, value);
    }
}
