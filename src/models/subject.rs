// src/models/subject.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{
    fields::{decode, loose_int, loose_list, loose_string, loose_u32},
    schedule::{RawWindow, ScheduleWindow},
};

pub const DEFAULT_TIME_LIMIT: u32 = 60;
pub const DEFAULT_PASS_SCORE: u32 = 80;

/// Time limit and pass score used when the subject record cannot be read.
pub const PLACEHOLDER_TIME_LIMIT: u32 = 30;
pub const PLACEHOLDER_PASS_SCORE: u32 = 80;

/// A topic area containing one timed quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub description: String,

    /// Minutes allowed for one attempt.
    pub time_limit: u32,

    /// Minimum percentage (inclusive) for an attempt to pass.
    pub pass_score: u32,

    pub total_questions: usize,
}

/// A `subjects` record as stored, in either field spelling.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawSubject {
    #[serde(deserialize_with = "loose_int")]
    pub id: Option<i64>,
    #[serde(alias = "title", deserialize_with = "loose_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "loose_string")]
    pub description: Option<String>,
    #[serde(alias = "timeLimit", deserialize_with = "loose_u32")]
    pub time_limit: Option<u32>,
    #[serde(alias = "passScore", deserialize_with = "loose_u32")]
    pub pass_score: Option<u32>,
    #[serde(alias = "totalQuestions", deserialize_with = "loose_u32")]
    pub total_questions: Option<u32>,

    /// Embedded question records, normalized later by the quiz assembler.
    #[serde(deserialize_with = "loose_list")]
    pub questions: Option<Vec<Value>>,
    #[serde(deserialize_with = "loose_list")]
    pub schedules: Option<Vec<Value>>,
}

impl RawSubject {
    /// Embedded questions, when the record carries a non-empty list.
    pub fn embedded_questions(&self) -> Option<&[Value]> {
        self.questions.as_deref().filter(|list| !list.is_empty())
    }

    /// Valid windows embedded under `schedules`; malformed entries are dropped.
    pub fn windows(&self) -> Vec<ScheduleWindow> {
        self.schedules
            .iter()
            .flatten()
            .filter_map(decode::<RawWindow>)
            .filter_map(RawWindow::into_window)
            .collect()
    }

    /// The normalized subject. `question_count` overrides whatever count the
    /// record carries; pass it when the question list is known.
    pub fn to_subject(&self, question_count: Option<usize>) -> Option<Subject> {
        let id = self.id?;

        let total_questions = question_count
            .or_else(|| self.questions.as_ref().map(Vec::len))
            .or_else(|| self.total_questions.map(|n| n as usize))
            .unwrap_or(0);

        Some(Subject {
            id,
            name: self.name.clone().unwrap_or_else(|| placeholder_name(id)),
            description: self.description.clone().unwrap_or_default(),
            time_limit: self
                .time_limit
                .filter(|minutes| *minutes > 0)
                .unwrap_or(DEFAULT_TIME_LIMIT),
            pass_score: self.pass_score.unwrap_or(DEFAULT_PASS_SCORE).min(100),
            total_questions,
        })
    }
}

impl Subject {
    /// Stand-in used when the subject cannot be loaded at all.
    pub fn placeholder(id: i64) -> Self {
        Self {
            id,
            name: placeholder_name(id),
            description: String::new(),
            time_limit: PLACEHOLDER_TIME_LIMIT,
            pass_score: PLACEHOLDER_PASS_SCORE,
            total_questions: 0,
        }
    }

    /// Session length in seconds.
    pub fn time_limit_secs(&self) -> u32 {
        self.time_limit.saturating_mul(60)
    }
}

/// A normalized subject together with its raw question records.
#[derive(Debug, Clone)]
pub struct SubjectDetail {
    pub subject: Subject,

    /// Raw question records, normalized later by the quiz assembler.
    pub questions: Vec<Value>,
}

fn placeholder_name(id: i64) -> String {
    format!("Chuyên đề {}", id)
}

/// Subjects served when the store cannot be reached.
pub fn builtin_subjects() -> Vec<Subject> {
    [
        (
            1,
            "Chuyên đề 1: Tư tưởng Hồ Chí Minh",
            "Tìm hiểu về tư tưởng và đạo đức Hồ Chí Minh",
        ),
        (
            2,
            "Chuyên đề 2: Lịch sử Đảng Cộng sản Việt Nam",
            "Lịch sử hình thành và phát triển của Đảng",
        ),
        (
            3,
            "Chuyên đề 3: Pháp luật Việt Nam",
            "Các quy định pháp luật cơ bản",
        ),
        (
            4,
            "Chuyên đề 4: Kinh tế chính trị",
            "Kiến thức về kinh tế chính trị Marxist-Leninist",
        ),
        (
            5,
            "Chuyên đề 5: Chủ nghĩa xã hội khoa học",
            "Lý luận về chủ nghĩa xã hội khoa học",
        ),
    ]
    .into_iter()
    .map(|(id, name, description)| Subject {
        id,
        name: name.to_string(),
        description: description.to_string(),
        time_limit: PLACEHOLDER_TIME_LIMIT,
        pass_score: PLACEHOLDER_PASS_SCORE,
        total_questions: 20,
    })
    .collect()
}
