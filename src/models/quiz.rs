// src/models/quiz.rs

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{
    fields::{Key, loose_int, loose_list},
    question::{AnswerType, Question},
    subject::Subject,
};

/// Immutable snapshot of a subject and its questions for one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quiz {
    pub subject: Subject,
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn new(mut subject: Subject, questions: Vec<Question>) -> Self {
        subject.total_questions = questions.len();
        Self { subject, questions }
    }

    pub fn question(&self, id: &Key) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// A `quizzes` record: the question list assembled for one subject.
///
/// Loose `questions` records are read through the same shape to find the
/// subject they belong to.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawQuiz {
    #[serde(alias = "subjectId", deserialize_with = "loose_int")]
    pub subject_id: Option<i64>,
    #[serde(deserialize_with = "loose_list")]
    pub questions: Option<Vec<Value>>,
}

/// Options a student has selected, per question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AnswerSet(HashMap<Key, BTreeSet<Key>>);

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the selection for one question. Single-answer questions keep
    /// only the last option given; an empty selection clears the question.
    pub fn select(&mut self, question: &Question, options: impl IntoIterator<Item = Key>) {
        let chosen: BTreeSet<Key> = match question.answer_type {
            AnswerType::Single => options.into_iter().last().into_iter().collect(),
            AnswerType::Multiple => options.into_iter().collect(),
        };

        if chosen.is_empty() {
            self.0.remove(&question.id);
        } else {
            self.0.insert(question.id.clone(), chosen);
        }
    }

    pub fn selected(&self, question_id: &Key) -> Option<&BTreeSet<Key>> {
        self.0.get(question_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{fields::decode, question::RawQuestion};
    use serde_json::json;

    fn question(kind: &str) -> Question {
        decode::<RawQuestion>(&json!({
            "id": 1,
            "type": kind,
            "options": [
                { "id": "a", "text": "A", "isCorrect": true },
                { "id": "b", "text": "B" }
            ]
        }))
        .and_then(RawQuestion::into_question)
        .unwrap()
    }

    #[test]
    fn single_answer_keeps_last_choice() {
        let q = question("single");
        let mut answers = AnswerSet::new();
        answers.select(&q, [Key::from("a"), Key::from("b")]);
        assert_eq!(answers.selected(&q.id), Some(&BTreeSet::from([Key::from("b")])));
    }

    #[test]
    fn empty_selection_clears() {
        let q = question("multiple");
        let mut answers = AnswerSet::new();
        answers.select(&q, [Key::from("a"), Key::from("b")]);
        assert_eq!(answers.selected(&q.id).map(BTreeSet::len), Some(2));
        answers.select(&q, []);
        assert_eq!(answers.selected(&q.id), None);
    }

    #[test]
    fn quiz_counts_its_questions() {
        let quiz = Quiz::new(Subject::placeholder(1), vec![question("single")]);
        assert_eq!(quiz.subject.total_questions, 1);
        assert!(quiz.question(&Key::from(1)).is_some());
    }
}
