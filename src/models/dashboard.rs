// src/models/dashboard.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::fields::Key;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_students: usize,

    /// Students with at least one passing attempt.
    pub completed_students: usize,

    /// Students who attempted something but never passed.
    pub in_progress_students: usize,

    pub not_started_students: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicProgress {
    pub id: i64,
    pub name: String,

    /// Percentage of all students with a passing attempt on this subject.
    pub completed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentActivity {
    pub id: Option<Key>,
    pub student: String,
    pub subject_id: i64,
    pub subject_name: Option<String>,
    pub score: u32,
    pub passed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub topic_progress: Vec<TopicProgress>,
    pub recent_activities: Vec<RecentActivity>,
}
