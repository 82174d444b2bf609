// src/store/json_file.rs

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::{
    models::fields::Key,
    store::{Collection, Filter, RecordStore, StoreError, next_id, record_id},
};

/// Record store backed by one flat JSON document whose top-level keys are
/// collections (arrays of records).
///
/// Every mutation rewrites the whole file. The in-memory copy only changes
/// once the write succeeded, so a failed write leaves both sides untouched.
pub struct JsonFileStore {
    path: Option<PathBuf>,
    db: RwLock<Map<String, Value>>,
}

impl JsonFileStore {
    /// Loads the database file. A missing or unreadable file is an outage.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let raw = tokio::fs::read(&path).await.map_err(|e| {
            StoreError::Unavailable(format!("cannot read {}: {}", path.display(), e))
        })?;

        let db = match serde_json::from_slice(&raw) {
            Ok(Value::Object(db)) => db,
            Ok(_) => {
                return Err(StoreError::InvalidInput(format!(
                    "{} must contain a JSON object",
                    path.display()
                )));
            }
            Err(e) => return Err(StoreError::InvalidInput(e.to_string())),
        };

        tracing::info!(
            "Loaded {} with collections: {:?}",
            path.display(),
            db.keys().collect::<Vec<_>>()
        );

        Ok(Self {
            path: Some(path),
            db: RwLock::new(db),
        })
    }

    /// A store that lives only in memory. Non-object input yields an empty store.
    pub fn in_memory(db: Value) -> Self {
        let db = match db {
            Value::Object(db) => db,
            _ => Map::new(),
        };
        Self {
            path: None,
            db: RwLock::new(db),
        }
    }

    /// Applies `change` to a copy of the database, persists it, then commits.
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Map<String, Value>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut db = self.db.write().await;
        let mut next = db.clone();
        let outcome = change(&mut next)?;
        self.persist(&next).await?;
        *db = next;
        Ok(outcome)
    }

    async fn persist(&self, db: &Map<String, Value>) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let body = serde_json::to_vec_pretty(db)
            .map_err(|e| StoreError::InvalidInput(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");

        tracing::debug!("Writing {}...", path.display());
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| StoreError::Unavailable(format!("cannot write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StoreError::Unavailable(format!("cannot replace {}: {}", path.display(), e)))?;
        Ok(())
    }
}

fn records(db: &Map<String, Value>, collection: Collection) -> &[Value] {
    db.get(collection.as_str())
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn records_mut(
    db: &mut Map<String, Value>,
    collection: Collection,
) -> Result<&mut Vec<Value>, StoreError> {
    db.entry(collection.as_str())
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| StoreError::InvalidInput(format!("{} is not a collection", collection)))
}

fn position(records: &[Value], id: &Key) -> Option<usize> {
    records
        .iter()
        .position(|r| record_id(r).as_ref() == Some(id))
}

fn ensure_object(record: &Value) -> Result<(), StoreError> {
    if record.is_object() {
        Ok(())
    } else {
        Err(StoreError::InvalidInput("records must be JSON objects".to_string()))
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn list(
        &self,
        collection: Collection,
        filter: Option<&Filter>,
    ) -> Result<Vec<Value>, StoreError> {
        let db = self.db.read().await;
        Ok(records(&db, collection)
            .iter()
            .filter(|r| filter.is_none_or(|f| f.matches(r)))
            .cloned()
            .collect())
    }

    async fn get(&self, collection: Collection, id: &Key) -> Result<Value, StoreError> {
        let db = self.db.read().await;
        let records = records(&db, collection);
        position(records, id)
            .map(|i| records[i].clone())
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn create(&self, collection: Collection, mut record: Value) -> Result<Value, StoreError> {
        ensure_object(&record)?;
        self.mutate(move |db| {
            let records = records_mut(db, collection)?;
            if record_id(&record).is_none() {
                record["id"] = Value::from(next_id(records));
            }
            records.push(record.clone());
            Ok(record)
        })
        .await
    }

    async fn update(
        &self,
        collection: Collection,
        id: &Key,
        mut record: Value,
    ) -> Result<Value, StoreError> {
        ensure_object(&record)?;
        record["id"] = id.to_value();
        self.mutate(move |db| {
            let records = records_mut(db, collection)?;
            let index = position(records, id).ok_or_else(|| StoreError::not_found(collection, id))?;
            records[index] = record.clone();
            Ok(record)
        })
        .await
    }

    async fn delete(&self, collection: Collection, id: &Key) -> Result<(), StoreError> {
        self.mutate(move |db| {
            let records = records_mut(db, collection)?;
            let index = position(records, id).ok_or_else(|| StoreError::not_found(collection, id))?;
            records.remove(index);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_db_path() -> PathBuf {
        std::env::temp_dir().join(format!("quiz-portal-{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn crud_roundtrip_in_memory() {
        let store = JsonFileStore::in_memory(json!({ "students": [{ "id": 1, "fullName": "A" }] }));

        let created = store
            .create(Collection::Students, json!({ "fullName": "B" }))
            .await
            .unwrap();
        assert_eq!(created["id"], 2);

        let updated = store
            .update(Collection::Students, &Key::from(2), json!({ "fullName": "C" }))
            .await
            .unwrap();
        assert_eq!(updated, json!({ "id": 2, "fullName": "C" }));

        store.delete(Collection::Students, &Key::from(1)).await.unwrap();
        let remaining = store.list(Collection::Students, None).await.unwrap();
        assert_eq!(remaining, vec![json!({ "id": 2, "fullName": "C" })]);
    }

    #[tokio::test]
    async fn missing_records_and_collections() {
        let store = JsonFileStore::in_memory(json!({}));

        assert!(store.list(Collection::QuizResults, None).await.unwrap().is_empty());
        let err = store.get(Collection::Subjects, &Key::from(1)).await.unwrap_err();
        assert!(err.is_not_found());
        let err = store.delete(Collection::Subjects, &Key::from(1)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn list_applies_filter() {
        let store = JsonFileStore::in_memory(json!({
            "quizResults": [
                { "id": 1, "userId": "a", "subjectId": 1 },
                { "id": 2, "userId": "b", "subjectId": 1 },
                { "id": 3, "userId": "a", "subjectId": "2" }
            ]
        }));

        let filter = Filter::eq("userId", "a").and("subjectId", 2);
        let found = store.list(Collection::QuizResults, Some(&filter)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["id"], 3);
    }

    #[tokio::test]
    async fn writes_survive_reopen() {
        let path = temp_db_path();
        tokio::fs::write(&path, br#"{ "batchSchedules": [] }"#).await.unwrap();

        let store = JsonFileStore::open(&path).await.unwrap();
        store
            .create(Collection::BatchSchedules, json!({ "department": "CNTT" }))
            .await
            .unwrap();

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let schedules = reopened.list(Collection::BatchSchedules, None).await.unwrap();
        assert_eq!(schedules, vec![json!({ "department": "CNTT", "id": 1 })]);

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn open_missing_file_is_unavailable() {
        let err = JsonFileStore::open(temp_db_path()).await.err().unwrap();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
