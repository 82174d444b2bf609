// src/models/progress.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{attempt::AttemptRecord, subject::Subject};

/// Aggregate of one student's attempts on one subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub attempts: u32,
    pub best_score: u32,
    pub last_score: u32,

    /// True once any attempt has passed.
    pub passed: bool,

    pub last_attempt: Option<DateTime<Utc>>,
}

impl ProgressSummary {
    /// Folds one more attempt into the summary.
    ///
    /// Attempts older than the current last attempt still count towards
    /// `attempts`, `best_score` and `passed`, but do not replace the last score.
    pub fn record(&mut self, attempt: &AttemptRecord) {
        self.attempts += 1;
        self.best_score = self.best_score.max(attempt.score);
        self.passed |= attempt.passed;
        if self.last_attempt.is_none_or(|last| attempt.created_at >= last) {
            self.last_score = attempt.score;
            self.last_attempt = Some(attempt.created_at);
        }
    }

    /// Merges a locally cached summary over a store-derived one.
    ///
    /// The local side wins the "last attempt" fields unless the store has a
    /// strictly newer attempt; counters never go backwards.
    pub fn merge_local(self, local: &ProgressSummary) -> ProgressSummary {
        let local_is_newer = match (local.last_attempt, self.last_attempt) {
            (Some(l), Some(s)) => l >= s,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => true,
        };
        let (last_score, last_attempt) = if local_is_newer {
            (local.last_score, local.last_attempt)
        } else {
            (self.last_score, self.last_attempt)
        };

        ProgressSummary {
            attempts: self.attempts.max(local.attempts),
            best_score: self.best_score.max(local.best_score),
            last_score,
            passed: self.passed || local.passed,
            last_attempt,
        }
    }
}

/// Student-facing state of a subject, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubjectStatus {
    Passed,
    InProgress,
    Available,
}

impl SubjectStatus {
    pub fn classify(progress: Option<&ProgressSummary>) -> Self {
        match progress {
            Some(p) if p.passed => SubjectStatus::Passed,
            Some(p) if p.attempts > 0 => SubjectStatus::InProgress,
            _ => SubjectStatus::Available,
        }
    }
}

/// One entry of the student's subject list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectOverview {
    #[serde(flatten)]
    pub subject: Subject,
    pub status: SubjectStatus,

    /// Whether starting a new attempt is refused by the retake policy.
    pub locked: bool,

    pub progress: Option<ProgressSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn attempt(score: u32, passed: bool, minutes: i64) -> AttemptRecord {
        AttemptRecord {
            id: None,
            user_id: "sv1".into(),
            subject_id: 1,
            score,
            passed,
            correct_answers: 0,
            total_questions: 0,
            time_taken: None,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    #[test]
    fn out_of_order_attempt_keeps_latest_score() {
        let mut summary = ProgressSummary::default();
        summary.record(&attempt(70, false, 10));
        summary.record(&attempt(40, false, 5));

        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.best_score, 70);
        assert_eq!(summary.last_score, 70);
    }

    #[test]
    fn local_summary_wins_when_newer() {
        let mut store = ProgressSummary::default();
        store.record(&attempt(60, false, 0));
        store.record(&attempt(70, false, 1));

        let mut local = ProgressSummary::default();
        local.record(&attempt(90, true, 2));

        let merged = store.merge_local(&local);
        assert_eq!(merged.attempts, 2);
        assert_eq!(merged.best_score, 90);
        assert_eq!(merged.last_score, 90);
        assert!(merged.passed);
    }

    #[test]
    fn stale_local_summary_does_not_hide_store_attempts() {
        let mut local = ProgressSummary::default();
        local.record(&attempt(50, false, 0));

        let mut store = ProgressSummary::default();
        store.record(&attempt(50, false, 0));
        store.record(&attempt(85, true, 3));

        let merged = store.clone().merge_local(&local);
        assert_eq!(merged, store);
    }

    #[test]
    fn status_priority() {
        assert_eq!(SubjectStatus::classify(None), SubjectStatus::Available);

        let mut summary = ProgressSummary::default();
        assert_eq!(SubjectStatus::classify(Some(&summary)), SubjectStatus::Available);

        summary.record(&attempt(10, false, 0));
        assert_eq!(SubjectStatus::classify(Some(&summary)), SubjectStatus::InProgress);

        summary.record(&attempt(95, true, 1));
        assert_eq!(SubjectStatus::classify(Some(&summary)), SubjectStatus::Passed);
    }
}
