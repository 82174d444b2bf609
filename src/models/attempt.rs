// src/models/attempt.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::fields::{Key, flexible_timestamp, loose_bool, loose_int, loose_string, loose_u32};

/// One completed quiz submission, stored in `quizResults`.
///
/// Created exactly once per submission and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Key>,
    pub user_id: String,
    pub subject_id: i64,
    pub score: u32,
    pub passed: bool,
    pub correct_answers: u32,
    pub total_questions: u32,

    /// Seconds spent in the session, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_taken: Option<u32>,

    pub created_at: DateTime<Utc>,
}

/// A `quizResults` record as stored, in either field spelling.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawAttempt {
    pub id: Option<Key>,
    #[serde(alias = "userId", deserialize_with = "loose_string")]
    pub user_id: Option<String>,
    #[serde(alias = "subjectId", deserialize_with = "loose_int")]
    pub subject_id: Option<i64>,
    #[serde(deserialize_with = "loose_u32")]
    pub score: Option<u32>,
    #[serde(deserialize_with = "loose_bool")]
    pub passed: Option<bool>,
    #[serde(alias = "correctAnswers", deserialize_with = "loose_u32")]
    pub correct_answers: Option<u32>,
    #[serde(alias = "totalQuestions", deserialize_with = "loose_u32")]
    pub total_questions: Option<u32>,
    #[serde(alias = "timeTaken", deserialize_with = "loose_u32")]
    pub time_taken: Option<u32>,
    #[serde(alias = "createdAt", deserialize_with = "flexible_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl RawAttempt {
    /// Legacy records may lack the answer counts; those default to zero.
    /// Records without a parsable timestamp are dated at the epoch so they
    /// still count but never become the "last" attempt.
    pub fn into_attempt(self) -> Option<AttemptRecord> {
        Some(AttemptRecord {
            id: self.id,
            user_id: self.user_id?,
            subject_id: self.subject_id?,
            score: self.score.unwrap_or(0).min(100),
            passed: self.passed.unwrap_or(false),
            correct_answers: self.correct_answers.unwrap_or(0),
            total_questions: self.total_questions.unwrap_or(0),
            time_taken: self.time_taken,
            created_at: self.created_at.unwrap_or(DateTime::UNIX_EPOCH),
        })
    }
}

/// One row of a student's result history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub id: Option<Key>,
    pub subject_id: i64,
    pub subject_name: Option<String>,
    pub score: u32,
    pub passed: bool,
    pub correct_answers: u32,
    pub total_questions: u32,

    /// Attempts this student has made on the subject so far, this one included.
    pub attempt_number: u32,

    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fields::decode;
    use serde_json::{Value, json};

    fn normalize(record: Value) -> Option<AttemptRecord> {
        decode::<RawAttempt>(&record)?.into_attempt()
    }

    #[test]
    fn normalizes_legacy_record() {
        let record = json!({
            "id": 2,
            "userId": "student123",
            "subjectId": "2",
            "score": 75,
            "passed": false,
            "createdAt": "2025-01-10T09:30:00.000Z"
        });

        let attempt = normalize(record).unwrap();
        assert_eq!(attempt.subject_id, 2);
        assert_eq!(attempt.correct_answers, 0);
        assert_eq!(attempt.time_taken, None);
        assert_eq!(attempt.created_at.to_rfc3339(), "2025-01-10T09:30:00+00:00");
    }

    #[test]
    fn requires_owner_and_subject() {
        assert!(normalize(json!({ "score": 10 })).is_none());
    }

    #[test]
    fn serializes_camel_case() {
        let attempt = normalize(json!({
            "user_id": "sv1",
            "subject_id": 1,
            "score": 100,
            "passed": true,
            "correct_answers": 2,
            "total_questions": 2,
            "created_at": "2025-01-10T09:30:00Z"
        }))
        .unwrap();

        let value = serde_json::to_value(&attempt).unwrap();
        assert_eq!(value["userId"], "sv1");
        assert_eq!(value["correctAnswers"], 2);
        assert!(value.get("id").is_none());
    }
}
