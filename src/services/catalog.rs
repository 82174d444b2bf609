// src/services/catalog.rs

use std::collections::HashMap;

use serde_json::Value;

use crate::{
    models::{
        fields::{Key, decode},
        quiz::RawQuiz,
        subject::{RawSubject, Subject, SubjectDetail, builtin_subjects},
    },
    services::Fetched,
    store::{Collection, Filter, SharedStore, StoreError, list_or_empty},
};

/// Normalized subject metadata.
#[derive(Clone)]
pub struct SubjectCatalog {
    store: SharedStore,
}

impl SubjectCatalog {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    /// All subjects in store order, with question counts derived from the
    /// question source each subject's quiz is assembled from.
    ///
    /// Falls back to the built-in subject list when the store is unreachable.
    pub async fn list_subjects(&self) -> Fetched<Vec<Subject>> {
        let (subjects, quizzes, questions) = tokio::join!(
            self.store.list(Collection::Subjects, None),
            list_or_empty(self.store.as_ref(), Collection::Quizzes, None),
            list_or_empty(self.store.as_ref(), Collection::Questions, None),
        );

        let records = match subjects {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Falling back to built-in subjects: {}", e);
                return Fetched::fallback(builtin_subjects());
            }
        };

        // Without the question collections the record's own count is used.
        let sources = match (&quizzes, &questions) {
            (Ok(quizzes), Ok(questions)) => Some(QuestionSources::index(quizzes, questions)),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Question counts unavailable: {}", e);
                None
            }
        };

        let subjects = records
            .iter()
            .filter_map(decode::<RawSubject>)
            .filter_map(|raw| {
                let count = sources
                    .as_ref()
                    .zip(raw.id)
                    .map(|(sources, id)| sources.resolve(id, &raw).len());
                raw.to_subject(count)
            })
            .collect();

        Fetched::store(subjects)
    }

    /// The raw subject record, normalized to its typed fields.
    pub async fn get_record(&self, id: i64) -> Result<RawSubject, StoreError> {
        let record = self.store.get(Collection::Subjects, &Key::from(id)).await?;
        decode(&record)
            .ok_or_else(|| StoreError::InvalidInput(format!("subject {} is malformed", id)))
    }

    /// One subject with its raw questions.
    pub async fn get_subject(&self, id: i64) -> Result<SubjectDetail, StoreError> {
        let filter = Filter::eq("subjectId", id);

        let (raw, quizzes, questions) = tokio::join!(
            self.get_record(id),
            list_or_empty(self.store.as_ref(), Collection::Quizzes, Some(&filter)),
            list_or_empty(self.store.as_ref(), Collection::Questions, Some(&filter)),
        );
        let raw = raw?;

        let questions = QuestionSources::index(&quizzes?, &questions?)
            .resolve(id, &raw)
            .to_vec();
        let subject = raw.to_subject(Some(questions.len())).ok_or_else(|| {
            StoreError::InvalidInput(format!("subject {} has no usable id", id))
        })?;

        Ok(SubjectDetail { subject, questions })
    }
}

/// Question material grouped by subject id.
///
/// A quiz entry in `quizzes` wins over questions embedded in the subject
/// record, which win over loose records in `questions`.
struct QuestionSources {
    quizzes: HashMap<i64, Vec<Value>>,
    questions: HashMap<i64, Vec<Value>>,
}

impl QuestionSources {
    fn index(quizzes: &[Value], questions: &[Value]) -> Self {
        let mut by_quiz = HashMap::new();
        for quiz in quizzes.iter().filter_map(decode::<RawQuiz>) {
            let list = quiz.questions.filter(|list| !list.is_empty());
            if let (Some(subject), Some(list)) = (quiz.subject_id, list) {
                by_quiz.entry(subject).or_insert(list);
            }
        }

        let mut by_subject: HashMap<i64, Vec<Value>> = HashMap::new();
        for question in questions {
            let subject = decode::<RawQuiz>(question).and_then(|owner| owner.subject_id);
            if let Some(subject) = subject {
                by_subject.entry(subject).or_default().push(question.clone());
            }
        }

        Self {
            quizzes: by_quiz,
            questions: by_subject,
        }
    }

    fn resolve<'a>(&'a self, subject_id: i64, raw: &'a RawSubject) -> &'a [Value] {
        if let Some(list) = self.quizzes.get(&subject_id) {
            return list;
        }
        raw.embedded_questions()
            .or_else(|| self.questions.get(&subject_id).map(Vec::as_slice))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonFileStore;
    use serde_json::json;
    use std::sync::Arc;

    fn catalog(db: Value) -> SubjectCatalog {
        SubjectCatalog::new(Arc::new(JsonFileStore::in_memory(db)))
    }

    #[tokio::test]
    async fn counts_questions_per_source() {
        let catalog = catalog(json!({
            "subjects": [
                { "id": 1, "name": "A", "totalQuestions": 50 },
                { "id": 2, "name": "B", "questions": [{ "id": 1 }] },
                { "id": 3, "name": "C" }
            ],
            "quizzes": [{ "subjectId": "1", "questions": [{ "id": 1 }, { "id": 2 }] }],
            "questions": [{ "id": 9, "subjectId": 3 }, { "id": 10, "subject_id": "3" }]
        }));

        let fetched = catalog.list_subjects().await;
        assert!(!fetched.is_fallback());
        let counts: Vec<_> = fetched.value.iter().map(|s| s.total_questions).collect();
        assert_eq!(counts, vec![2, 1, 2]);
    }

    #[tokio::test]
    async fn get_subject_not_found() {
        let err = catalog(json!({ "subjects": [] })).get_subject(4).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn get_subject_without_questions() {
        let detail = catalog(json!({ "subjects": [{ "id": 1, "name": "A", "totalQuestions": 9 }] }))
            .get_subject(1)
            .await
            .unwrap();

        assert!(detail.questions.is_empty());
        assert_eq!(detail.subject.total_questions, 0);
    }

    #[tokio::test]
    async fn get_record_reads_embedded_windows() {
        let raw = catalog(json!({
            "subjects": [{
                "id": 1,
                "schedules": [{ "department": "CNTT", "start": "2025-01-01T08:00", "end": "2025-01-01T09:00" }]
            }]
        }))
        .get_record(1)
        .await
        .unwrap();

        assert_eq!(raw.windows().len(), 1);
    }
}
