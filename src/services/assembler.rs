// src/services/assembler.rs

use crate::{
    models::{
        fields::decode,
        question::{Question, RawQuestion},
        quiz::Quiz,
        subject::Subject,
    },
    services::{Fetched, catalog::SubjectCatalog},
    store::StoreError,
};

/// Builds the immutable quiz snapshot for one attempt.
#[derive(Clone)]
pub struct QuizAssembler {
    catalog: SubjectCatalog,
}

impl QuizAssembler {
    pub fn new(catalog: SubjectCatalog) -> Self {
        Self { catalog }
    }

    /// Subject plus its normalized questions, correctness flags included.
    /// A subject without questions yields an empty quiz.
    pub async fn load_quiz(&self, subject_id: i64) -> Result<Quiz, StoreError> {
        let detail = self.catalog.get_subject(subject_id).await?;

        let questions: Vec<Question> = detail
            .questions
            .iter()
            .filter_map(decode::<RawQuestion>)
            .filter_map(RawQuestion::into_question)
            .inspect(|question| {
                if let Err(e) = question.check_answer_key() {
                    tracing::warn!("Subject {}: {}", subject_id, e);
                }
            })
            .collect();

        if questions.is_empty() {
            tracing::info!("No quiz data found for subject {}", subject_id);
        }

        Ok(Quiz::new(detail.subject, questions))
    }

    /// Like [`load_quiz`](Self::load_quiz), but never fails: a missing
    /// subject or an unreachable store yields a placeholder subject with no
    /// questions, marked as a fallback.
    pub async fn build_quiz(&self, subject_id: i64) -> Fetched<Quiz> {
        match self.load_quiz(subject_id).await {
            Ok(quiz) => Fetched::store(quiz),
            Err(e) => {
                if e.is_not_found() {
                    tracing::info!("Subject {} not found, serving placeholder", subject_id);
                } else {
                    tracing::warn!("Failed to load quiz for subject {}: {}", subject_id, e);
                }
                Fetched::fallback(Quiz::new(Subject::placeholder(subject_id), Vec::new()))
            }
        }
    }
}
