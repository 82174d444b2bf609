// src/services/session.rs

//! Timed quiz sessions.
//!
//! A session moves `Loading -> Active -> Submitted`, or ends in `Empty` /
//! `Error` when there is nothing to take. Active sessions are driven by a
//! one-second ticker task that forces submission when time runs out.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::{sync::Mutex, task::JoinHandle};
use uuid::Uuid;

use crate::{
    config::RetakeRules,
    models::{
        fields::Key,
        quiz::{AnswerSet, Quiz},
        session::{RawAnswers, SessionContext},
    },
    services::{
        Fetched,
        assembler::QuizAssembler,
        eligibility::EligibilityChecker,
        progress::{NewAttempt, ProgressTracker, is_locked},
        scoring::{Evaluation, evaluate},
    },
    store::StoreError,
};

/// Submitted sessions are kept this long so clients can re-read the result.
const SUBMITTED_RETENTION_SECS: i64 = 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("subject {0} is not open for your department right now")]
    NotEligible(i64),

    #[error("subject {0} can no longer be attempted")]
    Locked(i64),

    #[error("subject {0} could not be loaded")]
    SubjectUnavailable(i64),

    #[error("subject {0} cannot be loaded while the record store is unreachable")]
    StoreUnavailable(i64),

    #[error("subject {0} has no questions yet")]
    NoQuestions(i64),

    #[error("session not found")]
    NotFound,

    #[error("session is no longer active")]
    NotActive,

    #[error("question {0} is not part of this quiz")]
    UnknownQuestion(Key),

    #[error("option {option} does not belong to question {question}")]
    UnknownOption { question: Key, option: Key },
}

impl SessionError {
    /// Maps a failed quiz load: a missing subject is the student's problem,
    /// anything else is an outage.
    pub fn loading(subject_id: i64, err: StoreError) -> Self {
        if err.is_not_found() {
            SessionError::SubjectUnavailable(subject_id)
        } else {
            tracing::warn!("Failed to load quiz for subject {}: {}", subject_id, err);
            SessionError::StoreUnavailable(subject_id)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Loading,
    Active { answers: AnswerSet, time_left: u32 },
    Submitted { result: Evaluation, saved: bool },
    Empty,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Loading,
    Active,
    Submitted,
    Empty,
    Error,
}

/// Outcome of one timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Running,
    Expired,
    Stopped,
}

/// What a submission produced, before it is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub evaluation: Evaluation,
    pub time_taken: u32,
}

#[derive(Debug)]
pub struct QuizSession {
    pub id: Uuid,
    pub student_id: String,
    pub subject_id: i64,
    quiz: Option<Quiz>,
    phase: Phase,
    submitted_at: Option<DateTime<Utc>>,
}

impl QuizSession {
    pub fn loading(id: Uuid, student_id: impl Into<String>, subject_id: i64) -> Self {
        Self {
            id,
            student_id: student_id.into(),
            subject_id,
            quiz: None,
            phase: Phase::Loading,
            submitted_at: None,
        }
    }

    /// Leaves `Loading`. A fallback quiz means the subject could not be read.
    pub fn load(&mut self, fetched: Fetched<Quiz>) {
        if self.phase != Phase::Loading {
            return;
        }
        self.phase = if fetched.is_fallback() {
            Phase::Error
        } else if fetched.value.is_empty() {
            Phase::Empty
        } else {
            Phase::Active {
                answers: AnswerSet::new(),
                time_left: fetched.value.subject.time_limit_secs(),
            }
        };
        self.quiz = Some(fetched.value);
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Loading => SessionState::Loading,
            Phase::Active { .. } => SessionState::Active,
            Phase::Submitted { .. } => SessionState::Submitted,
            Phase::Empty => SessionState::Empty,
            Phase::Error => SessionState::Error,
        }
    }

    pub fn set_answer(&mut self, question_id: &Key, options: Vec<Key>) -> Result<(), SessionError> {
        let (Phase::Active { answers, .. }, Some(quiz)) = (&mut self.phase, &self.quiz) else {
            return Err(SessionError::NotActive);
        };
        let question = quiz
            .question(question_id)
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.clone()))?;
        if let Some(option) = options.iter().find(|o| !question.has_option(o)) {
            return Err(SessionError::UnknownOption {
                question: question_id.clone(),
                option: option.clone(),
            });
        }
        answers.select(question, options);
        Ok(())
    }

    /// Counts down one second while active.
    pub fn tick(&mut self) -> Tick {
        match &mut self.phase {
            Phase::Active { time_left, .. } => {
                *time_left = time_left.saturating_sub(1);
                if *time_left == 0 {
                    Tick::Expired
                } else {
                    Tick::Running
                }
            }
            _ => Tick::Stopped,
        }
    }

    /// Scores the current answers and enters `Submitted`.
    ///
    /// Only the first call on an active session yields a submission; every
    /// later call returns `None`.
    pub fn submit(&mut self, now: DateTime<Utc>) -> Option<Submission> {
        let (Phase::Active { answers, time_left }, Some(quiz)) = (&self.phase, &self.quiz) else {
            return None;
        };
        let evaluation = evaluate(quiz, answers);
        let time_taken = quiz.subject.time_limit_secs().saturating_sub(*time_left);

        self.phase = Phase::Submitted {
            result: evaluation,
            saved: false,
        };
        self.submitted_at = Some(now);
        Some(Submission {
            evaluation,
            time_taken,
        })
    }

    pub fn mark_saved(&mut self, saved: bool) {
        if let Phase::Submitted { saved: flag, .. } = &mut self.phase {
            *flag = saved;
        }
    }

    fn expired_before(&self, cutoff: DateTime<Utc>) -> bool {
        self.submitted_at.is_some_and(|at| at < cutoff)
    }

    pub fn view(&self) -> SessionView {
        let (time_left, answers, result, saved) = match &self.phase {
            Phase::Active { answers, time_left } => (Some(*time_left), Some(answers.clone()), None, None),
            Phase::Submitted { result, saved } => (None, None, Some(*result), Some(*saved)),
            _ => (None, None, None, None),
        };

        SessionView {
            id: self.id,
            subject_id: self.subject_id,
            state: self.state(),
            time_left,
            answers,
            result,
            saved,
            quiz: self.quiz.clone().filter(|_| self.state() == SessionState::Active),
        }
    }
}

/// Client-facing snapshot of a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub subject_id: i64,
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answers: Option<AnswerSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Evaluation>,

    /// Whether the attempt record reached the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Quiz>,
}

/// Builds an Answer Set from posted answers, rejecting ids the quiz does not
/// know.
pub fn answers_for(quiz: &Quiz, raw: RawAnswers) -> Result<AnswerSet, SessionError> {
    let mut answers = AnswerSet::new();
    for (question_id, options) in raw {
        let question = quiz
            .question(&question_id)
            .ok_or_else(|| SessionError::UnknownQuestion(question_id.clone()))?;
        if let Some(option) = options.iter().find(|o| !question.has_option(o)) {
            return Err(SessionError::UnknownOption {
                question: question_id,
                option: option.clone(),
            });
        }
        answers.select(question, options);
    }
    Ok(answers)
}

struct Slot {
    session: QuizSession,
    ticker: Option<JoinHandle<()>>,
}

impl Slot {
    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

/// Process-wide registry of quiz sessions.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<Mutex<HashMap<Uuid, Slot>>>,
    assembler: QuizAssembler,
    eligibility: EligibilityChecker,
    progress: ProgressTracker,
    retake: RetakeRules,
}

impl SessionManager {
    pub fn new(
        assembler: QuizAssembler,
        eligibility: EligibilityChecker,
        progress: ProgressTracker,
        retake: RetakeRules,
    ) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            assembler,
            eligibility,
            progress,
            retake,
        }
    }

    /// Refuses students outside every open window and subjects locked by the
    /// retake rules.
    pub async fn gate(
        &self,
        ctx: &SessionContext,
        subject_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        let (eligible, progress) = tokio::join!(
            self.eligibility
                .can_start(subject_id, ctx.department.as_deref(), now),
            self.progress.get_progress(&ctx.student_id),
        );

        if !eligible.value {
            return Err(SessionError::NotEligible(subject_id));
        }
        if is_locked(progress.value.get(&subject_id), &self.retake) {
            return Err(SessionError::Locked(subject_id));
        }
        Ok(())
    }

    /// Starts a session for `ctx`, discarding any other session the student
    /// still has open.
    pub async fn start(
        &self,
        ctx: &SessionContext,
        subject_id: i64,
        now: DateTime<Utc>,
    ) -> Result<SessionView, SessionError> {
        self.gate(ctx, subject_id, now).await?;

        let quiz = self
            .assembler
            .load_quiz(subject_id)
            .await
            .map_err(|e| SessionError::loading(subject_id, e))?;

        let mut session = QuizSession::loading(Uuid::new_v4(), &ctx.student_id, subject_id);
        session.load(Fetched::store(quiz));
        if session.state() == SessionState::Empty {
            return Err(SessionError::NoQuestions(subject_id));
        }

        let id = session.id;
        let view = session.view();

        let mut sessions = self.sessions.lock().await;
        let cutoff = now - chrono::Duration::seconds(SUBMITTED_RETENTION_SECS);
        sessions.retain(|_, slot| {
            let keep = slot.session.student_id != ctx.student_id && !slot.session.expired_before(cutoff);
            if !keep {
                slot.stop_ticker();
            }
            keep
        });
        sessions.insert(
            id,
            Slot {
                session,
                ticker: Some(self.spawn_ticker(id)),
            },
        );

        tracing::info!(
            "Session {} started for {} on subject {}",
            id,
            ctx.student_id,
            subject_id
        );
        Ok(view)
    }

    fn spawn_ticker(&self, id: Uuid) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;

                let now = Utc::now();
                let attempt = {
                    let mut sessions = manager.sessions.lock().await;
                    let Some(slot) = sessions.get_mut(&id) else {
                        return;
                    };
                    match slot.session.tick() {
                        Tick::Running => continue,
                        Tick::Stopped => return,
                        Tick::Expired => {
                            tracing::info!("Session {} ran out of time, submitting", id);
                            // Detach rather than abort: this task is the ticker.
                            slot.ticker = None;
                            pending_attempt(&mut slot.session, now)
                        }
                    }
                };

                if let Some(attempt) = attempt {
                    manager.record(id, attempt, now).await;
                }
                return;
            }
        })
    }

    /// Writes the attempt of a session that has just left `Active`, then
    /// flags the session with the outcome. The registry lock is not held
    /// during the write.
    async fn record(&self, id: Uuid, attempt: NewAttempt, now: DateTime<Utc>) -> bool {
        let saved = self.progress.record_attempt(attempt, now).await.is_ok();
        if let Some(slot) = self.sessions.lock().await.get_mut(&id) {
            slot.session.mark_saved(saved);
        }
        saved
    }

    pub async fn view(&self, id: Uuid, student_id: &str) -> Result<SessionView, SessionError> {
        let mut sessions = self.sessions.lock().await;
        Ok(owned(&mut sessions, id, student_id)?.session.view())
    }

    pub async fn set_answer(
        &self,
        id: Uuid,
        student_id: &str,
        question_id: &Key,
        options: Vec<Key>,
    ) -> Result<SessionView, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let slot = owned(&mut sessions, id, student_id)?;
        slot.session.set_answer(question_id, options)?;
        Ok(slot.session.view())
    }

    /// Explicit submission. Repeating it returns the stored result without
    /// recording another attempt.
    pub async fn submit(&self, id: Uuid, student_id: &str) -> Result<SessionView, SessionError> {
        let now = Utc::now();
        let (attempt, mut view) = {
            let mut sessions = self.sessions.lock().await;
            let slot = owned(&mut sessions, id, student_id)?;
            slot.stop_ticker();
            (pending_attempt(&mut slot.session, now), slot.session.view())
        };

        if let Some(attempt) = attempt {
            view.saved = Some(self.record(id, attempt, now).await);
        }
        Ok(view)
    }

    /// Drops a session. Answers of an active session are discarded unsaved.
    pub async fn abandon(&self, id: Uuid, student_id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().await;
        owned(&mut sessions, id, student_id)?;
        if let Some(mut slot) = sessions.remove(&id) {
            slot.stop_ticker();
            if slot.session.state() == SessionState::Active {
                tracing::info!("Session {} abandoned, answers discarded", id);
            }
        }
        Ok(())
    }
}

/// Submits an active session and describes the attempt to record. Only the
/// first submission of a session yields one, so manual and forced
/// submissions never record twice.
fn pending_attempt(session: &mut QuizSession, now: DateTime<Utc>) -> Option<NewAttempt> {
    let submission = session.submit(now)?;
    Some(NewAttempt {
        user_id: session.student_id.clone(),
        subject_id: session.subject_id,
        evaluation: submission.evaluation,
        time_taken: Some(submission.time_taken),
    })
}

fn owned<'a>(
    sessions: &'a mut HashMap<Uuid, Slot>,
    id: Uuid,
    student_id: &str,
) -> Result<&'a mut Slot, SessionError> {
    sessions
        .get_mut(&id)
        .filter(|slot| slot.session.student_id == student_id)
        .ok_or(SessionError::NotFound)
}
