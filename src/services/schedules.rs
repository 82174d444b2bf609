// src/services/schedules.rs

use serde_json::{Value, json};

use crate::{
    cache::{CacheKey, SharedCache},
    models::{
        fields::{Key, decode},
        schedule::{BatchSchedule, RawBatchSchedule, ScheduleWindow},
        subject::RawSubject,
    },
    services::Fetched,
    store::{Collection, SharedStore, StoreError, list_or_empty},
};

/// Batch and per-subject schedule windows, read through the store with the
/// local cache as second tier.
#[derive(Clone)]
pub struct ScheduleBook {
    store: SharedStore,
    cache: SharedCache,
}

/// The windows relevant to one subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectWindows {
    pub batch: Vec<ScheduleWindow>,
    pub subject: Vec<ScheduleWindow>,
}

impl ScheduleBook {
    pub fn new(store: SharedStore, cache: SharedCache) -> Self {
        Self { store, cache }
    }

    /// Loads both window kinds for a subject. A subject missing from the
    /// store simply has no windows of its own.
    ///
    /// On an outage the cached copies are used; `None` when the cache holds
    /// neither kind.
    pub async fn windows_for(&self, subject_id: i64) -> Option<Fetched<SubjectWindows>> {
        let key = Key::from(subject_id);
        let (batch, subject) = tokio::join!(
            list_or_empty(self.store.as_ref(), Collection::BatchSchedules, None),
            self.store.get(Collection::Subjects, &key),
        );

        let subject = match subject {
            Ok(record) => Ok(decode::<RawSubject>(&record)
                .map(|raw| raw.windows())
                .unwrap_or_default()),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        };

        match (batch, subject) {
            (Ok(batch), Ok(subject)) => {
                let batch = parse_batch(&batch);
                self.cache_batch(&batch);
                self.cache.set(&CacheKey::SubjectSchedules(subject_id), json!(subject));

                Some(Fetched::store(SubjectWindows {
                    batch: batch.into_iter().map(|b| b.window).collect(),
                    subject,
                }))
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Checking schedules from local cache: {}", e);
                self.cached_windows(subject_id).map(Fetched::fallback)
            }
        }
    }

    fn cached_windows(&self, subject_id: i64) -> Option<SubjectWindows> {
        let batch = self.cached_batch();
        let subject = self
            .cache
            .get(&CacheKey::SubjectSchedules(subject_id))
            .and_then(|v| serde_json::from_value::<Vec<ScheduleWindow>>(v).ok());

        if batch.is_none() && subject.is_none() {
            return None;
        }
        Some(SubjectWindows {
            batch: batch
                .unwrap_or_default()
                .into_iter()
                .map(|b| b.window)
                .collect(),
            subject: subject.unwrap_or_default(),
        })
    }

    fn cached_batch(&self) -> Option<Vec<BatchSchedule>> {
        self.cache
            .get(&CacheKey::BatchSchedules)
            .and_then(|v| serde_json::from_value(v).ok())
    }

    fn cache_batch(&self, batch: &[BatchSchedule]) {
        self.cache.set(&CacheKey::BatchSchedules, json!(batch));
    }

    /// Every batch schedule, or the cached list when the store is down.
    pub async fn list_batch(&self) -> Fetched<Vec<BatchSchedule>> {
        match list_or_empty(self.store.as_ref(), Collection::BatchSchedules, None).await {
            Ok(records) => {
                let batch = parse_batch(&records);
                self.cache_batch(&batch);
                Fetched::store(batch)
            }
            Err(e) => {
                tracing::warn!("Serving cached batch schedules: {}", e);
                Fetched::fallback(self.cached_batch().unwrap_or_default())
            }
        }
    }

    pub async fn create_batch(
        &self,
        window: ScheduleWindow,
        notes: Option<String>,
    ) -> Result<BatchSchedule, StoreError> {
        let mut record = json!(window);
        if let Some(notes) = notes.filter(|n| !n.trim().is_empty()) {
            record["notes"] = Value::String(notes);
        }

        let created = self
            .store
            .create(Collection::BatchSchedules, record)
            .await
            .inspect_err(|e| tracing::error!("Failed to save batch schedule: {}", e))?;
        let schedule = decode::<RawBatchSchedule>(&created)
            .and_then(RawBatchSchedule::into_schedule)
            .ok_or_else(|| {
                StoreError::InvalidInput(format!("store returned an unusable schedule: {}", created))
            })?;

        let mut cached = self.cached_batch().unwrap_or_default();
        cached.push(schedule.clone());
        self.cache_batch(&cached);

        tracing::info!(
            "Batch schedule {} created for {}",
            schedule.id,
            schedule.window.department
        );
        Ok(schedule)
    }

    pub async fn delete_batch(&self, id: &Key) -> Result<(), StoreError> {
        self.store
            .delete(Collection::BatchSchedules, id)
            .await
            .inspect_err(|e| tracing::error!("Failed to delete batch schedule {}: {}", id, e))?;

        if let Some(mut cached) = self.cached_batch() {
            cached.retain(|s| &s.id != id);
            self.cache_batch(&cached);
        }
        Ok(())
    }

    /// Replaces the windows embedded in a subject record.
    ///
    /// The windows are cached before the write so eligibility reflects them
    /// even if the store rejects the update; the failure is still returned.
    pub async fn replace_subject_windows(
        &self,
        subject_id: i64,
        windows: Vec<ScheduleWindow>,
    ) -> Result<Vec<ScheduleWindow>, StoreError> {
        let key = Key::from(subject_id);
        self.cache
            .set(&CacheKey::SubjectSchedules(subject_id), json!(windows));

        let mut record = self.store.get(Collection::Subjects, &key).await?;
        record["schedules"] = json!(windows);
        self.store
            .update(Collection::Subjects, &key, record)
            .await
            .inspect_err(|e| {
                tracing::error!("Failed to update schedules of subject {}: {}", subject_id, e)
            })?;

        Ok(windows)
    }
}

fn parse_batch(records: &[Value]) -> Vec<BatchSchedule> {
    records
        .iter()
        .filter_map(decode::<RawBatchSchedule>)
        .filter_map(RawBatchSchedule::into_schedule)
        .collect()
}
