// src/models/schedule.rs

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::models::fields::{Key, flexible_timestamp, loose_string};

/// Naive layouts produced by the admin date/time pickers. Interpreted as UTC.
const NAIVE_LAYOUTS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("'{0}' is not a valid timestamp")]
    InvalidTimestamp(String),

    #[error("schedule must start before it ends")]
    EmptyWindow,
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ScheduleError> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ScheduleError::InvalidTimestamp(raw.to_string()))
}

/// A department-scoped access interval. Both ends are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub department: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ScheduleWindow {
    pub fn new(
        department: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, ScheduleError> {
        if start >= end {
            return Err(ScheduleError::EmptyWindow);
        }
        Ok(Self {
            department: department.into(),
            start,
            end,
        })
    }

    pub fn is_open_for(&self, department: &str, now: DateTime<Utc>) -> bool {
        self.department == department && self.start <= now && now <= self.end
    }
}

/// A window granting a department access to every subject at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSchedule {
    pub id: Key,
    #[serde(flatten)]
    pub window: ScheduleWindow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A schedule window as stored, in either field spelling.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawWindow {
    #[serde(deserialize_with = "loose_string")]
    pub department: Option<String>,
    #[serde(alias = "startTime", alias = "start_time", deserialize_with = "flexible_timestamp")]
    pub start: Option<DateTime<Utc>>,
    #[serde(alias = "endTime", alias = "end_time", deserialize_with = "flexible_timestamp")]
    pub end: Option<DateTime<Utc>>,
}

impl RawWindow {
    /// Unparsable or empty windows yield `None`.
    pub fn into_window(self) -> Option<ScheduleWindow> {
        let window = match (self.department, self.start, self.end) {
            (Some(department), Some(start), Some(end)) => ScheduleWindow::new(department, start, end).ok(),
            _ => None,
        };
        if window.is_none() {
            tracing::warn!("Ignoring malformed schedule window");
        }
        window
    }
}

/// A `batchSchedules` record as stored.
#[derive(Debug, Deserialize)]
pub struct RawBatchSchedule {
    #[serde(default)]
    pub id: Option<Key>,
    #[serde(flatten)]
    pub window: RawWindow,
    #[serde(default, deserialize_with = "loose_string")]
    pub notes: Option<String>,
}

impl RawBatchSchedule {
    pub fn into_schedule(self) -> Option<BatchSchedule> {
        Some(BatchSchedule {
            id: self.id?,
            window: self.window.into_window()?,
            notes: self.notes.filter(|n| !n.is_empty()),
        })
    }
}

/// DTO for one schedule window as entered by an administrator.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ScheduleWindowInput {
    #[validate(length(min = 1, max = 100, message = "Department is required."))]
    pub department: String,
    #[validate(length(min = 1, max = 40))]
    pub start: String,
    #[validate(length(min = 1, max = 40))]
    pub end: String,
}

impl ScheduleWindowInput {
    pub fn to_window(&self) -> Result<ScheduleWindow, ScheduleError> {
        ScheduleWindow::new(
            self.department.trim(),
            parse_timestamp(&self.start)?,
            parse_timestamp(&self.end)?,
        )
    }
}

/// DTO for creating a batch schedule.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBatchScheduleRequest {
    #[validate(length(min = 1, max = 100, message = "Department is required."))]
    pub department: String,
    #[validate(length(min = 1, max = 40))]
    pub start: String,
    #[validate(length(min = 1, max = 40))]
    pub end: String,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

impl CreateBatchScheduleRequest {
    pub fn to_window(&self) -> Result<ScheduleWindow, ScheduleError> {
        ScheduleWindowInput {
            department: self.department.clone(),
            start: self.start.clone(),
            end: self.end.clone(),
        }
        .to_window()
    }
}

/// DTO replacing every window attached to one subject.
#[derive(Debug, Deserialize, Validate)]
pub struct ReplaceSubjectSchedulesRequest {
    #[validate(nested)]
    pub schedules: Vec<ScheduleWindowInput>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fields::decode;
    use chrono::{Duration, TimeZone};
    use serde_json::{Value, json};

    fn batch(record: Value) -> Option<BatchSchedule> {
        decode::<RawBatchSchedule>(&record)?.into_schedule()
    }

    #[test]
    fn parses_naive_and_rfc3339() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-03-01T08:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-03-01T08:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-03-01T15:00:00+07:00").unwrap(), expected);
        assert!(parse_timestamp("tomorrow").is_err());
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        let end = start + Duration::hours(2);
        let window = ScheduleWindow::new("CNTT", start, end).unwrap();

        assert!(window.is_open_for("CNTT", start));
        assert!(window.is_open_for("CNTT", end));
        assert!(!window.is_open_for("CNTT", end + Duration::seconds(1)));
        assert!(!window.is_open_for("Kế toán", start));
    }

    #[test]
    fn rejects_inverted_window() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
        assert_eq!(
            ScheduleWindow::new("CNTT", start, start),
            Err(ScheduleError::EmptyWindow)
        );
        assert!(
            batch(json!({
                "id": 1,
                "department": "CNTT",
                "start": "2025-03-02T08:00:00",
                "end": "2025-03-01T08:00:00"
            }))
            .is_none()
        );
    }

    #[test]
    fn batch_schedule_accepts_either_spelling() {
        let schedule = batch(json!({
            "id": 1714000000000_i64,
            "department": "Kế toán",
            "startTime": "2025-03-01T08:00:00",
            "end_time": "2025-03-01T17:00:00",
            "notes": ""
        }))
        .unwrap();

        assert_eq!(schedule.id, Key::from(1714000000000));
        assert_eq!(schedule.window.department, "Kế toán");
        assert_eq!(schedule.notes, None);
    }

    #[test]
    fn batch_schedule_requires_id() {
        assert!(
            batch(json!({
                "department": "CNTT",
                "start": "2025-03-01T08:00",
                "end": "2025-03-01T10:00"
            }))
            .is_none()
        );
    }
}
