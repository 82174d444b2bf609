// src/handlers/progress.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{error::AppError, models::session::SessionContext, state::AppState};

/// Progress summaries of the caller, keyed by subject id.
pub async fn my_progress(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.progress.get_progress(&ctx.student_id).await))
}

/// The caller's result history, newest first.
pub async fn my_results(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
) -> Result<impl IntoResponse, AppError> {
    let subjects = state.catalog.list_subjects().await;
    Ok(Json(
        state
            .progress
            .history(&ctx.student_id, &subjects.value)
            .await,
    ))
}

/// Progress summaries of any student.
/// Admin only.
pub async fn student_progress(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.progress.get_progress(&student_id).await))
}
