// src/services/dashboard.rs

use std::collections::HashSet;

use crate::{
    models::{
        attempt::{AttemptRecord, RawAttempt},
        dashboard::{Dashboard, DashboardStats, RecentActivity, TopicProgress},
        fields::decode,
        subject::Subject,
    },
    services::{Fetched, catalog::SubjectCatalog},
    store::{Collection, SharedStore, list_or_empty},
};

const RECENT_ACTIVITY_LIMIT: usize = 10;

/// Aggregates the admin dashboard. A store outage yields an all-zero
/// dashboard marked as fallback.
pub async fn build(store: &SharedStore, catalog: &SubjectCatalog) -> Fetched<Dashboard> {
    let (students, results, subjects) = tokio::join!(
        list_or_empty(store.as_ref(), Collection::Students, None),
        list_or_empty(store.as_ref(), Collection::QuizResults, None),
        catalog.list_subjects(),
    );

    let (students, results) = match (students, results) {
        (Ok(students), Ok(results)) => (students, results),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!("Dashboard unavailable: {}", e);
            return Fetched::fallback(Dashboard::default());
        }
    };

    let attempts: Vec<AttemptRecord> = results
        .iter()
        .filter_map(decode::<RawAttempt>)
        .filter_map(RawAttempt::into_attempt)
        .collect();
    let dashboard = summarize(students.len(), &subjects.value, attempts);

    if subjects.is_fallback() {
        Fetched::fallback(dashboard)
    } else {
        Fetched::store(dashboard)
    }
}

pub fn summarize(total_students: usize, subjects: &[Subject], mut attempts: Vec<AttemptRecord>) -> Dashboard {
    let passers: HashSet<&str> = attempts
        .iter()
        .filter(|a| a.passed)
        .map(|a| a.user_id.as_str())
        .collect();
    let attempting: HashSet<&str> = attempts.iter().map(|a| a.user_id.as_str()).collect();

    let stats = DashboardStats {
        total_students,
        completed_students: passers.len(),
        in_progress_students: attempting.len() - passers.len(),
        not_started_students: total_students.saturating_sub(attempting.len()),
    };

    let topic_progress = subjects
        .iter()
        .map(|subject| {
            let passed: HashSet<&str> = attempts
                .iter()
                .filter(|a| a.subject_id == subject.id && a.passed)
                .map(|a| a.user_id.as_str())
                .collect();
            TopicProgress {
                id: subject.id,
                name: subject.name.clone(),
                completed: rounded_percent(passed.len(), total_students),
            }
        })
        .collect();

    attempts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let recent_activities = attempts
        .into_iter()
        .take(RECENT_ACTIVITY_LIMIT)
        .map(|a| RecentActivity {
            subject_name: subjects
                .iter()
                .find(|s| s.id == a.subject_id)
                .map(|s| s.name.clone()),
            id: a.id,
            student: a.user_id,
            subject_id: a.subject_id,
            score: a.score,
            passed: a.passed,
            created_at: a.created_at,
        })
        .collect();

    Dashboard {
        stats,
        topic_progress,
        recent_activities,
    }
}

fn rounded_percent(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((part * 200 + total) / (total * 2)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::fields::Key, store::{JsonFileStore, OfflineStore}};
    use serde_json::json;
    use std::sync::Arc;

    fn db() -> serde_json::Value {
        json!({
            "students": [{ "id": "sv1" }, { "id": "sv2" }, { "id": "sv3" }],
            "subjects": [{ "id": 1, "name": "A" }, { "id": 2, "name": "B" }],
            "quizResults": [
                { "id": 1, "userId": "sv1", "subjectId": 1, "score": 90, "passed": true, "createdAt": "2025-01-01T08:00:00Z" },
                { "id": 2, "userId": "sv2", "subjectId": 1, "score": 40, "passed": false, "createdAt": "2025-01-02T08:00:00Z" },
                { "id": 3, "userId": "sv1", "subjectId": 2, "score": 30, "passed": false, "createdAt": "2025-01-03T08:00:00Z" }
            ]
        })
    }

    #[tokio::test]
    async fn aggregates_students_and_topics() {
        let store: SharedStore = Arc::new(JsonFileStore::in_memory(db()));
        let dashboard = build(&store, &SubjectCatalog::new(store.clone())).await;
        assert!(!dashboard.is_fallback());

        let dashboard = dashboard.value;
        assert_eq!(
            dashboard.stats,
            DashboardStats {
                total_students: 3,
                completed_students: 1,
                in_progress_students: 1,
                not_started_students: 1,
            }
        );
        assert_eq!(dashboard.topic_progress[0].completed, 33);
        assert_eq!(dashboard.topic_progress[1].completed, 0);
        assert_eq!(dashboard.recent_activities[0].id, Some(Key::from(3)));
        assert_eq!(dashboard.recent_activities[0].subject_name.as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn outage_yields_zeroed_dashboard() {
        let store: SharedStore = Arc::new(OfflineStore);
        let dashboard = build(&store, &SubjectCatalog::new(store.clone())).await;
        assert!(dashboard.is_fallback());
        assert_eq!(dashboard.value.stats, DashboardStats::default());
    }

    #[test]
    fn no_students_means_zero_completion() {
        let dashboard = summarize(0, &[Subject::placeholder(1)], Vec::new());
        assert_eq!(dashboard.topic_progress[0].completed, 0);
    }
}
