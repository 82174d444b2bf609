// src/store/mod.rs

//! Collection-oriented record store.
//!
//! Records are plain JSON objects. Normalization into typed models happens
//! in `crate::models`, never here.

pub mod json_file;
pub mod remote;

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::fields::Key;

pub use json_file::JsonFileStore;
pub use remote::RemoteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Subjects,
    Questions,
    Quizzes,
    QuizResults,
    Students,
    BatchSchedules,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Subjects => "subjects",
            Collection::Questions => "questions",
            Collection::Quizzes => "quizzes",
            Collection::QuizResults => "quizResults",
            Collection::Students => "students",
            Collection::BatchSchedules => "batchSchedules",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection}/{id} not found")]
    NotFound { collection: Collection, id: Key },

    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid record: {0}")]
    InvalidInput(String),
}

impl StoreError {
    pub fn not_found(collection: Collection, id: &Key) -> Self {
        StoreError::NotFound {
            collection,
            id: id.clone(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Conjunction of field-equality clauses.
///
/// Values compare loosely: `1`, `1.0` and `"1"` are all equal, as in the
/// flat JSON REST server the records come from.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::default().and(field, value)
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.clauses.iter().all(|(field, expected)| {
            record
                .get(field)
                .is_some_and(|actual| loosely_equal(actual, expected))
        })
    }
}

pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (loose_i64(a), loose_i64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => scalar_text(a).is_some() && scalar_text(a) == scalar_text(b),
    }
}

/// Integer value of a number or numeric string.
fn loose_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Textual form of a scalar, as used in query strings.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn record_id(record: &Value) -> Option<Key> {
    record.get("id").and_then(Key::from_value)
}

/// Identifier for a new record: one past the largest numeric id.
pub fn next_id(records: &[Value]) -> i64 {
    records
        .iter()
        .filter_map(|r| r.get("id").and_then(loose_i64))
        .max()
        .unwrap_or(0)
        + 1
}

/// Minimum operations the quiz core needs from its persistence collaborator.
///
/// Last write wins; there are no transactions.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list(
        &self,
        collection: Collection,
        filter: Option<&Filter>,
    ) -> Result<Vec<Value>, StoreError>;

    async fn get(&self, collection: Collection, id: &Key) -> Result<Value, StoreError>;

    /// Stores a new record, assigning an `id` when the record has none.
    async fn create(&self, collection: Collection, record: Value) -> Result<Value, StoreError>;

    /// Replaces the record with `id`.
    async fn update(
        &self,
        collection: Collection,
        id: &Key,
        record: Value,
    ) -> Result<Value, StoreError>;

    async fn delete(&self, collection: Collection, id: &Key) -> Result<(), StoreError>;
}

pub type SharedStore = Arc<dyn RecordStore>;

/// Lists a collection, treating a missing collection as empty.
pub async fn list_or_empty(
    store: &dyn RecordStore,
    collection: Collection,
    filter: Option<&Filter>,
) -> Result<Vec<Value>, StoreError> {
    match store.list(collection, filter).await {
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        other => other,
    }
}

/// Store that refuses every call, for exercising fallback paths.
#[cfg(test)]
pub(crate) struct OfflineStore;

#[cfg(test)]
#[async_trait]
impl RecordStore for OfflineStore {
    async fn list(&self, _: Collection, _: Option<&Filter>) -> Result<Vec<Value>, StoreError> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn get(&self, _: Collection, _: &Key) -> Result<Value, StoreError> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn create(&self, _: Collection, _: Value) -> Result<Value, StoreError> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn update(&self, _: Collection, _: &Key, _: Value) -> Result<Value, StoreError> {
        Err(StoreError::Unavailable("offline".into()))
    }

    async fn delete(&self, _: Collection, _: &Key) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("offline".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_matches_loosely() {
        let record = json!({ "subjectId": "3", "userId": "sv1" });
        assert!(Filter::eq("subjectId", 3).matches(&record));
        assert!(Filter::eq("subjectId", 3).and("userId", "sv1").matches(&record));
        assert!(!Filter::eq("subjectId", 4).matches(&record));
        assert!(!Filter::eq("missing", 1).matches(&record));
    }

    #[test]
    fn loose_equality_rules() {
        assert!(loosely_equal(&json!(1), &json!(1.0)));
        assert!(loosely_equal(&json!("a"), &json!("a")));
        assert!(!loosely_equal(&json!(null), &json!("null")));
        assert!(!loosely_equal(&json!([1]), &json!("[1]")));
    }

    #[test]
    fn next_id_skips_non_numeric() {
        let records = vec![json!({ "id": 4 }), json!({ "id": "x" }), json!({ "id": "9" })];
        assert_eq!(next_id(&records), 10);
        assert_eq!(next_id(&[]), 1);
    }
}
