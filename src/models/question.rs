// src/models/question.rs

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::fields::{Key, loose_bool, loose_string};

/// How many options of a question are correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerType {
    /// Exactly one correct option.
    Single,
    /// One or more correct options.
    Multiple,
}

impl AnswerType {
    fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("multiple") {
            AnswerType::Multiple
        } else {
            AnswerType::Single
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: Key,
    pub text: String,
    #[serde(rename = "isCorrect")]
    pub is_correct: bool,
}

/// Canonical question shape handed to the quiz client.
///
/// Correctness flags are included; the client is trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: Key,

    /// The prompt text.
    pub question: String,

    /// Mapped from the `type` field since `type` is a reserved keyword in Rust.
    #[serde(rename = "type")]
    pub answer_type: AnswerType,

    pub options: Vec<AnswerOption>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnswerKeyError {
    #[error("single-answer question {id} has {found} correct options, expected exactly one")]
    SingleNeedsExactlyOne { id: Key, found: usize },

    #[error("multiple-answer question {id} has no correct option")]
    MultipleNeedsAtLeastOne { id: Key },
}

impl Question {
    /// Ids of the options flagged correct.
    pub fn correct_options(&self) -> BTreeSet<&Key> {
        self.options
            .iter()
            .filter(|option| option.is_correct)
            .map(|option| &option.id)
            .collect()
    }

    pub fn has_option(&self, id: &Key) -> bool {
        self.options.iter().any(|option| &option.id == id)
    }

    /// Checks the answer-key invariant for this question's type.
    pub fn check_answer_key(&self) -> Result<(), AnswerKeyError> {
        let found = self.options.iter().filter(|o| o.is_correct).count();
        match self.answer_type {
            AnswerType::Single if found != 1 => Err(AnswerKeyError::SingleNeedsExactlyOne {
                id: self.id.clone(),
                found,
            }),
            AnswerType::Multiple if found == 0 => Err(AnswerKeyError::MultipleNeedsAtLeastOne {
                id: self.id.clone(),
            }),
            _ => Ok(()),
        }
    }
}

/// A question record as stored, in either field spelling.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawQuestion {
    pub id: Option<Key>,
    #[serde(alias = "question_text", alias = "content", deserialize_with = "loose_string")]
    pub question: Option<String>,
    #[serde(rename = "type", alias = "question_type", deserialize_with = "loose_string")]
    pub answer_type: Option<String>,
    #[serde(alias = "answers")]
    pub options: Option<Vec<RawOption>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawOption {
    pub id: Option<Key>,
    #[serde(alias = "option_text", deserialize_with = "loose_string")]
    pub text: Option<String>,
    #[serde(alias = "isCorrect", deserialize_with = "loose_bool")]
    pub is_correct: Option<bool>,
}

impl RawQuestion {
    /// Records without an id are skipped, as are options without one.
    pub fn into_question(self) -> Option<Question> {
        let options = self
            .options
            .unwrap_or_default()
            .into_iter()
            .filter_map(|option| {
                Some(AnswerOption {
                    id: option.id?,
                    text: option.text.unwrap_or_default(),
                    is_correct: option.is_correct.unwrap_or(false),
                })
            })
            .collect();

        Some(Question {
            id: self.id?,
            question: self.question.unwrap_or_default(),
            answer_type: self
                .answer_type
                .as_deref()
                .map(AnswerType::parse)
                .unwrap_or(AnswerType::Single),
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fields::decode;
    use serde_json::{Value, json};

    fn question(record: Value) -> Option<Question> {
        decode::<RawQuestion>(&record)?.into_question()
    }

    #[test]
    fn normalizes_snake_case_question() {
        let record = json!({
            "id": 4,
            "question_text": "Chọn các đáp án đúng",
            "question_type": "multiple",
            "options": [
                { "id": "a", "option_text": "A", "is_correct": true },
                { "id": "b", "option_text": "B", "is_correct": false },
                { "id": "c", "option_text": "C" }
            ]
        });

        let q = question(record).unwrap();
        assert_eq!(q.id, Key::from(4));
        assert_eq!(q.question, "Chọn các đáp án đúng");
        assert_eq!(q.answer_type, AnswerType::Multiple);
        assert_eq!(q.options.len(), 3);
        assert!(!q.options[2].is_correct);
        assert_eq!(q.correct_options(), BTreeSet::from([&Key::from("a")]));
    }

    #[test]
    fn missing_type_defaults_to_single() {
        let q = question(json!({ "id": 1, "question": "?" })).unwrap();
        assert_eq!(q.answer_type, AnswerType::Single);
        assert!(q.options.is_empty());
    }

    #[test]
    fn answer_key_invariants() {
        let mut q = question(json!({
            "id": 1,
            "type": "single",
            "options": [
                { "id": 1, "text": "x", "isCorrect": true },
                { "id": 2, "text": "y", "isCorrect": true }
            ]
        }))
        .unwrap();
        assert_eq!(
            q.check_answer_key(),
            Err(AnswerKeyError::SingleNeedsExactlyOne { id: Key::from(1), found: 2 })
        );

        q.answer_type = AnswerType::Multiple;
        assert!(q.check_answer_key().is_ok());

        q.options.iter_mut().for_each(|o| o.is_correct = false);
        assert!(q.check_answer_key().is_err());
    }

    #[test]
    fn serializes_canonical_shape() {
        let q = question(json!({
            "id": 1,
            "question": "Q",
            "options": [{ "id": 1, "text": "x", "isCorrect": true }]
        }))
        .unwrap();

        let value = serde_json::to_value(&q).unwrap();
        assert_eq!(value["type"], "single");
        assert_eq!(value["options"][0]["isCorrect"], true);
    }
}
