// src/models/session.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::fields::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

/// Who is calling, resolved once per request by the auth middleware and
/// passed explicitly to every component that needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub student_id: String,
    pub role: Role,

    /// Department used for schedule eligibility. `None` is never eligible.
    pub department: Option<String>,
}

impl SessionContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Answers as posted by the client: question id to chosen option ids.
pub type RawAnswers = HashMap<Key, Vec<Key>>;

/// DTO for a one-shot submission of a whole Answer Set.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswersRequest {
    pub answers: RawAnswers,

    #[serde(default)]
    pub time_taken: Option<u32>,
}

/// DTO for changing the selection of one question inside an active session.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAnswerRequest {
    pub question_id: Key,
    pub option_ids: Vec<Key>,
}
