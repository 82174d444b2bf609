// src/services/progress.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::{
    cache::{CacheKey, SharedCache, object_entry},
    config::{RetakePolicy, RetakeRules},
    models::{
        attempt::{AttemptRecord, RawAttempt, ResultEntry},
        fields::decode,
        progress::{ProgressSummary, SubjectOverview, SubjectStatus},
        subject::Subject,
    },
    services::{Fetched, scoring::Evaluation},
    store::{Collection, Filter, SharedStore, StoreError, list_or_empty},
};

/// Per-subject summaries for one student.
pub type ProgressMap = HashMap<i64, ProgressSummary>;

/// An attempt about to be recorded.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub user_id: String,
    pub subject_id: i64,
    pub evaluation: Evaluation,
    pub time_taken: Option<u32>,
}

/// Appends attempts and folds them into progress summaries, keeping a local
/// copy per student for reads during store outages.
#[derive(Clone)]
pub struct ProgressTracker {
    store: SharedStore,
    cache: SharedCache,
}

impl ProgressTracker {
    pub fn new(store: SharedStore, cache: SharedCache) -> Self {
        Self { store, cache }
    }

    /// Writes one attempt record.
    ///
    /// The outcome reaches the local cache first, so progress and retake
    /// locking reflect it even when the store write fails. A record the store
    /// refused is kept in the student's unsynced list and counted by every
    /// later progress read. The failure is returned to the caller; nothing is
    /// retried.
    pub async fn record_attempt(
        &self,
        attempt: NewAttempt,
        now: DateTime<Utc>,
    ) -> Result<AttemptRecord, StoreError> {
        let mut record = AttemptRecord {
            id: None,
            user_id: attempt.user_id,
            subject_id: attempt.subject_id,
            score: attempt.evaluation.score,
            passed: attempt.evaluation.passed,
            correct_answers: attempt.evaluation.correct_answers,
            total_questions: attempt.evaluation.total_questions,
            time_taken: attempt.time_taken,
            created_at: now,
        };

        let key = CacheKey::Progress(record.user_id.clone());
        let mut summary = cached_progress(&object_entry(self.cache.as_ref(), &key))
            .remove(&record.subject_id)
            .unwrap_or_default();
        summary.record(&record);
        let subject_key = record.subject_id.to_string();
        self.cache.merge(&key, json!({ subject_key: summary }));

        let body = serde_json::to_value(&record)
            .map_err(|e| StoreError::InvalidInput(e.to_string()))?;
        let created = match self.store.create(Collection::QuizResults, body).await {
            Ok(created) => created,
            Err(e) => {
                tracing::error!(
                    "Attempt of {} on subject {} was not saved: {}",
                    record.user_id,
                    record.subject_id,
                    e
                );
                let entry = Uuid::new_v4().to_string();
                self.cache
                    .merge(&CacheKey::Unsynced(record.user_id.clone()), json!({ entry: record }));
                return Err(e);
            }
        };

        record.id = decode::<RawAttempt>(&created).and_then(|raw| raw.id);
        tracing::info!(
            "Recorded attempt {} for {} on subject {}: {}%",
            record.id.as_ref().map(ToString::to_string).unwrap_or_default(),
            record.user_id,
            record.subject_id,
            record.score
        );
        Ok(record)
    }

    /// Stored attempts plus the ones that never reached the store, oldest
    /// first.
    async fn attempts_of(&self, student_id: &str) -> Result<Vec<AttemptRecord>, StoreError> {
        let filter = Filter::eq("userId", student_id);
        let records = list_or_empty(self.store.as_ref(), Collection::QuizResults, Some(&filter)).await?;

        let mut attempts: Vec<AttemptRecord> = records
            .iter()
            .filter_map(decode::<RawAttempt>)
            .filter_map(RawAttempt::into_attempt)
            .collect();
        attempts.extend(self.unsynced(student_id));
        attempts.sort_by_key(|a| a.created_at);
        Ok(attempts)
    }

    fn unsynced(&self, student_id: &str) -> Vec<AttemptRecord> {
        object_entry(self.cache.as_ref(), &CacheKey::Unsynced(student_id.to_string()))
            .into_iter()
            .filter_map(|(_, record)| serde_json::from_value(record).ok())
            .collect()
    }

    /// Store-derived summaries with the cached ones merged on top. When the
    /// store is unreachable the cached summaries alone are returned.
    pub async fn get_progress(&self, student_id: &str) -> Fetched<ProgressMap> {
        let key = CacheKey::Progress(student_id.to_string());
        let local = cached_progress(&object_entry(self.cache.as_ref(), &key));

        let attempts = match self.attempts_of(student_id).await {
            Ok(attempts) => attempts,
            Err(e) => {
                tracing::warn!("Serving cached progress for {}: {}", student_id, e);
                return Fetched::fallback(local);
            }
        };

        let mut progress = fold_attempts(&attempts);
        for (subject_id, cached) in &local {
            let merged = progress.remove(subject_id).unwrap_or_default().merge_local(cached);
            progress.insert(*subject_id, merged);
        }

        self.cache.set(&key, progress_to_cache(&progress));
        Fetched::store(progress)
    }

    /// The student's attempts newest first, numbered per subject.
    pub async fn history(&self, student_id: &str, subjects: &[Subject]) -> Fetched<Vec<ResultEntry>> {
        let attempts = match self.attempts_of(student_id).await {
            Ok(attempts) => attempts,
            Err(e) => {
                tracing::warn!("Result history unavailable for {}: {}", student_id, e);
                return Fetched::fallback(Vec::new());
            }
        };

        let names: HashMap<i64, &str> = subjects.iter().map(|s| (s.id, s.name.as_str())).collect();
        let mut counts: HashMap<i64, u32> = HashMap::new();

        let mut entries: Vec<ResultEntry> = attempts
            .into_iter()
            .map(|attempt| {
                let number = counts.entry(attempt.subject_id).or_default();
                *number += 1;
                ResultEntry {
                    id: attempt.id,
                    subject_id: attempt.subject_id,
                    subject_name: names.get(&attempt.subject_id).map(|n| n.to_string()),
                    score: attempt.score,
                    passed: attempt.passed,
                    correct_answers: attempt.correct_answers,
                    total_questions: attempt.total_questions,
                    attempt_number: *number,
                    created_at: attempt.created_at,
                }
            })
            .collect();
        entries.reverse();

        Fetched::store(entries)
    }
}

/// Folds attempts in chronological order into per-subject summaries.
pub fn fold_attempts(attempts: &[AttemptRecord]) -> ProgressMap {
    let mut progress = ProgressMap::new();
    for attempt in attempts {
        progress.entry(attempt.subject_id).or_default().record(attempt);
    }
    progress
}

/// Whether a new attempt on a subject is refused under `rules`.
pub fn is_locked(progress: Option<&ProgressSummary>, rules: &RetakeRules) -> bool {
    let Some(progress) = progress else {
        return false;
    };
    if progress.passed {
        return rules.policy == RetakePolicy::Locked;
    }
    rules.max_attempts.is_some_and(|max| progress.attempts >= max)
}

/// Joins the subject list with the student's progress for display.
pub fn overview(subjects: &[Subject], progress: &ProgressMap, rules: &RetakeRules) -> Vec<SubjectOverview> {
    subjects
        .iter()
        .map(|subject| {
            let summary = progress.get(&subject.id);
            SubjectOverview {
                subject: subject.clone(),
                status: SubjectStatus::classify(summary),
                locked: is_locked(summary, rules),
                progress: summary.cloned(),
            }
        })
        .collect()
}

fn cached_progress(entry: &Map<String, Value>) -> ProgressMap {
    entry
        .iter()
        .filter_map(|(subject, summary)| {
            let subject = subject.parse().ok()?;
            let summary = serde_json::from_value(summary.clone()).ok()?;
            Some((subject, summary))
        })
        .collect()
}

fn progress_to_cache(progress: &ProgressMap) -> Value {
    Value::Object(
        progress
            .iter()
            .map(|(subject, summary)| (subject.to_string(), json!(summary)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::{LocalCache, MemoryCache},
        models::fields::Key,
        store::{JsonFileStore, OfflineStore, RecordStore},
    };
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn evaluation(score: u32, pass_score: u32) -> Evaluation {
        Evaluation {
            score,
            passed: score >= pass_score,
            correct_answers: 0,
            total_questions: 10,
            pass_score,
        }
    }

    fn attempt(subject_id: i64, score: u32) -> NewAttempt {
        NewAttempt {
            user_id: "sv1".into(),
            subject_id,
            evaluation: evaluation(score, 80),
            time_taken: Some(120),
        }
    }

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[tokio::test]
    async fn test_progress_aggregation() {
        let tracker = ProgressTracker::new(
            Arc::new(JsonFileStore::in_memory(json!({}))),
            Arc::new(MemoryCache::new()),
        );
        for (i, score) in [60, 85, 70].into_iter().enumerate() {
            tracker.record_attempt(attempt(1, score), t(i as i64)).await.unwrap();
        }

        let progress = tracker.get_progress("sv1").await;
        assert!(!progress.is_fallback());
        let summary = &progress.value[&1];
        assert_eq!(summary.attempts, 3);
        assert_eq!(summary.best_score, 85);
        assert_eq!(summary.last_score, 70);
        assert!(summary.passed);
    }

    #[tokio::test]
    async fn test_failed_write_is_surfaced_but_cached() {
        let cache = Arc::new(MemoryCache::new());
        let tracker = ProgressTracker::new(Arc::new(OfflineStore), cache.clone());

        let err = tracker.record_attempt(attempt(2, 90), t(0)).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        let progress = tracker.get_progress("sv1").await;
        assert!(progress.is_fallback());
        assert_eq!(progress.value[&2].attempts, 1);
        assert!(progress.value[&2].passed);
    }

    #[tokio::test]
    async fn test_offline_attempt_survives_store_read() {
        let store = Arc::new(JsonFileStore::in_memory(json!({
            "quizResults": [
                { "id": 1, "userId": "sv1", "subjectId": 1, "score": 40, "passed": false, "createdAt": "2025-01-01T07:00:00Z" },
                { "id": 2, "userId": "sv2", "subjectId": 1, "score": 100, "passed": true, "createdAt": "2025-01-01T07:00:00Z" }
            ]
        })));
        let cache = Arc::new(MemoryCache::new());
        let offline = ProgressSummary {
            attempts: 2,
            best_score: 90,
            last_score: 90,
            passed: true,
            last_attempt: Some(t(30)),
        };
        cache.set(&CacheKey::Progress("sv1".into()), json!({ "1": offline }));

        let tracker = ProgressTracker::new(store, cache);
        let summary = &tracker.get_progress("sv1").await.value[&1];

        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.best_score, 90);
        assert_eq!(summary.last_score, 90);
        assert!(summary.passed);
    }

    /// Store that serves reads but refuses every write.
    struct ReadOnlyStore(JsonFileStore);

    #[async_trait]
    impl RecordStore for ReadOnlyStore {
        async fn list(&self, c: Collection, f: Option<&Filter>) -> Result<Vec<Value>, StoreError> {
            self.0.list(c, f).await
        }

        async fn get(&self, c: Collection, id: &Key) -> Result<Value, StoreError> {
            self.0.get(c, id).await
        }

        async fn create(&self, _: Collection, _: Value) -> Result<Value, StoreError> {
            Err(StoreError::Unavailable("read only".into()))
        }

        async fn update(&self, _: Collection, _: &Key, _: Value) -> Result<Value, StoreError> {
            Err(StoreError::Unavailable("read only".into()))
        }

        async fn delete(&self, _: Collection, _: &Key) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("read only".into()))
        }
    }

    #[tokio::test]
    async fn test_unsaved_attempt_adds_to_stored_ones() {
        let store = ReadOnlyStore(JsonFileStore::in_memory(json!({
            "quizResults": [
                { "id": 1, "userId": "sv9", "subjectId": 1, "score": 40, "passed": false, "createdAt": "2025-01-01T07:00:00Z" },
                { "id": 2, "userId": "sv9", "subject_id": "1", "score": "50", "passed": "false", "created_at": "2025-01-01T07:30:00Z" }
            ]
        })));
        // Nothing cached for sv9 before the write.
        let tracker = ProgressTracker::new(Arc::new(store), Arc::new(MemoryCache::new()));

        let mut offline = attempt(1, 30);
        offline.user_id = "sv9".into();
        assert!(tracker.record_attempt(offline, t(60)).await.is_err());

        let progress = tracker.get_progress("sv9").await;
        assert!(!progress.is_fallback());
        let summary = &progress.value[&1];
        assert_eq!(summary.attempts, 3);
        assert_eq!(summary.best_score, 50);
        assert_eq!(summary.last_score, 30);
        let three_tries = RetakeRules {
            max_attempts: Some(3),
            ..RetakeRules::default()
        };
        assert!(is_locked(Some(summary), &three_tries));

        // Re-reading never counts the unsaved attempt twice.
        assert_eq!(tracker.get_progress("sv9").await.value[&1].attempts, 3);

        let history = tracker.history("sv9", &[]).await.value;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].id, None);
        assert_eq!(history[0].attempt_number, 3);
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let tracker = ProgressTracker::new(
            Arc::new(JsonFileStore::in_memory(json!({}))),
            Arc::new(MemoryCache::new()),
        );
        tracker.record_attempt(attempt(1, 50), t(0)).await.unwrap();
        tracker.record_attempt(attempt(1, 90), t(5)).await.unwrap();

        let subjects = vec![Subject::placeholder(1)];
        let history = tracker.history("sv1", &subjects).await.value;

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].score, 90);
        assert_eq!(history[0].attempt_number, 2);
        assert_eq!(history[1].attempt_number, 1);
        assert_eq!(history[0].subject_name.as_deref(), Some("Chuyên đề 1"));
    }

    #[test]
    fn test_retake_rules() {
        let mut summary = ProgressSummary::default();
        let locked = RetakeRules::default();
        let always = RetakeRules {
            policy: RetakePolicy::Always,
            max_attempts: Some(3),
        };

        assert!(!is_locked(None, &locked));
        summary.attempts = 3;
        assert!(!is_locked(Some(&summary), &locked));
        assert!(is_locked(Some(&summary), &always));

        summary.passed = true;
        assert!(is_locked(Some(&summary), &locked));
        assert!(!is_locked(Some(&summary), &always));
    }
}
