// src/services/eligibility.rs

use chrono::{DateTime, Utc};

use crate::{
    models::schedule::ScheduleWindow,
    services::{Fetched, schedules::ScheduleBook},
};

/// Decides whether a department may start a subject's quiz right now.
///
/// Re-evaluated on every start; nothing is memoized here beyond what the
/// schedule book mirrors into the local cache.
#[derive(Clone)]
pub struct EligibilityChecker {
    book: ScheduleBook,
}

impl EligibilityChecker {
    pub fn new(book: ScheduleBook) -> Self {
        Self { book }
    }

    /// Fails closed: no department, or no schedule data from either the store
    /// or the cache, denies access.
    pub async fn can_start(
        &self,
        subject_id: i64,
        department: Option<&str>,
        now: DateTime<Utc>,
    ) -> Fetched<bool> {
        let Some(department) = department.filter(|d| !d.trim().is_empty()) else {
            tracing::debug!("No department on session, subject {} denied", subject_id);
            return Fetched::store(false);
        };

        match self.book.windows_for(subject_id).await {
            Some(windows) => windows.map(|w| window_grants(&w.batch, &w.subject, department, now)),
            None => {
                tracing::warn!(
                    "No schedule data for subject {}, denying {}",
                    subject_id,
                    department
                );
                Fetched::fallback(false)
            }
        }
    }
}

/// Batch windows short-circuit; otherwise the subject needs its own open
/// window, and a subject without windows is closed.
pub fn window_grants(
    batch: &[ScheduleWindow],
    subject: &[ScheduleWindow],
    department: &str,
    now: DateTime<Utc>,
) -> bool {
    if batch.iter().any(|w| w.is_open_for(department, now)) {
        return true;
    }
    subject.iter().any(|w| w.is_open_for(department, now))
}
