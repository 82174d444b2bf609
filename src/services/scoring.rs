// src/services/scoring.rs

use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::{
    fields::Key,
    question::Question,
    quiz::{AnswerSet, Quiz},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    /// Rounded percentage, 0 to 100.
    pub score: u32,
    pub correct_answers: u32,
    pub total_questions: u32,
}

/// Outcome of a finished attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub score: u32,
    pub passed: bool,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub pass_score: u32,
}

/// A question counts only when the selection equals the correct set exactly.
/// No partial credit.
pub fn is_correct(question: &Question, selected: Option<&BTreeSet<Key>>) -> bool {
    let correct = question.correct_options();
    let selected: BTreeSet<&Key> = selected.map(|s| s.iter().collect()).unwrap_or_default();
    selected == correct
}

/// Percentage rounded half up. A quiz without questions scores 0.
fn percentage(correct: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (correct, total) = (u64::from(correct), u64::from(total));
    ((correct * 200 + total) / (total * 2)) as u32
}

pub fn score(quiz: &Quiz, answers: &AnswerSet) -> Score {
    let correct_answers = quiz
        .questions
        .iter()
        .filter(|q| is_correct(q, answers.selected(&q.id)))
        .count() as u32;
    let total_questions = quiz.questions.len() as u32;

    Score {
        score: percentage(correct_answers, total_questions),
        correct_answers,
        total_questions,
    }
}

/// Scores the attempt and applies the subject's inclusive pass threshold.
/// A quiz without questions always fails.
pub fn evaluate(quiz: &Quiz, answers: &AnswerSet) -> Evaluation {
    let Score {
        score,
        correct_answers,
        total_questions,
    } = score(quiz, answers);

    Evaluation {
        score,
        passed: total_questions > 0 && score >= quiz.subject.pass_score,
        correct_answers,
        total_questions,
        pass_score: quiz.subject.pass_score,
    }
}
