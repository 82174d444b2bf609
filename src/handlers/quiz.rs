// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

use crate::{
    error::AppError,
    models::session::{SessionContext, SubmitAnswersRequest},
    services::{
        progress::NewAttempt,
        scoring::evaluate,
        session::{SessionError, answers_for},
    },
    state::AppState,
};

/// Scores a whole Answer Set in one request and records the attempt.
///
/// * Applies the same eligibility and retake checks as starting a session.
/// * Rebuilds the quiz from the store, so the client cannot alter the key.
/// * An unreachable store answers 503. When only the attempt write fails the
///   outcome is kept locally until the store is back.
pub async fn submit_quiz(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(subject_id): Path<i64>,
    Json(req): Json<SubmitAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    state.sessions.gate(&ctx, subject_id, now).await?;

    let quiz = state
        .assembler
        .load_quiz(subject_id)
        .await
        .map_err(|e| SessionError::loading(subject_id, e))?;
    if quiz.is_empty() {
        return Err(SessionError::NoQuestions(subject_id).into());
    }

    let answers = answers_for(&quiz, req.answers)?;
    let result = evaluate(&quiz, &answers);

    let attempt = state
        .progress
        .record_attempt(
            NewAttempt {
                user_id: ctx.student_id.clone(),
                subject_id,
                evaluation: result,
                time_taken: req.time_taken,
            },
            now,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "result": result,
            "attempt": attempt,
        })),
    ))
}
