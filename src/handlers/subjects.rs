// src/handlers/subjects.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;

use crate::{
    error::AppError,
    models::session::SessionContext,
    services::{Fetched, progress::overview},
    state::AppState,
};

/// Lists subjects with the caller's status and retake lock per subject.
///
/// Subjects and progress are fetched concurrently; the response is marked
/// as fallback when either side had to fall back.
pub async fn list_subjects(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<impl IntoResponse, AppError> {
    let (subjects, progress) = tokio::join!(
        state.catalog.list_subjects(),
        state.progress.get_progress(&ctx.student_id),
    );

    let rows = overview(&subjects.value, &progress.value, &state.config.retake);
    let fetched = if subjects.is_fallback() || progress.is_fallback() {
        Fetched::fallback(rows)
    } else {
        Fetched::store(rows)
    };

    Ok(Json(fetched))
}

/// Returns the quiz snapshot for a subject, correctness flags included.
/// Never fails; a missing subject comes back as a placeholder with no questions.
pub async fn get_quiz(
    State(state): State<AppState>,
    Path(subject_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.assembler.build_quiz(subject_id).await))
}

/// Whether the caller may start this subject now.
pub async fn get_eligibility(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(subject_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let fetched = state
        .eligibility
        .can_start(subject_id, ctx.department.as_deref(), Utc::now())
        .await;

    Ok(Json(fetched.map(|eligible| {
        json!({
            "subjectId": subject_id,
            "department": ctx.department,
            "eligible": eligible,
        })
    })))
}
