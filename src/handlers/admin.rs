// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        fields::Key,
        schedule::{CreateBatchScheduleRequest, ReplaceSubjectSchedulesRequest, ScheduleWindow},
    },
    services::dashboard,
    state::AppState,
    utils::html::clean_html,
};

/// Lists batch schedules.
/// Admin only.
pub async fn list_batch_schedules(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.schedules.list_batch().await))
}

/// Creates a department-wide window covering every subject.
/// Admin only.
pub async fn create_batch_schedule(
    State(state): State<AppState>,
    Json(payload): Json<CreateBatchScheduleRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let window = payload.to_window()?;
    let notes = payload.notes.as_deref().map(clean_html);

    let schedule = state.schedules.create_batch(window, notes).await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

/// Deletes a batch schedule.
/// Admin only.
pub async fn delete_batch_schedule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.schedules.delete_batch(&Key::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replaces every window attached to one subject.
/// Admin only.
pub async fn replace_subject_schedules(
    State(state): State<AppState>,
    Path(subject_id): Path<i64>,
    Json(payload): Json<ReplaceSubjectSchedulesRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let windows = payload
        .schedules
        .iter()
        .map(|input| input.to_window())
        .collect::<Result<Vec<ScheduleWindow>, _>>()?;

    let windows = state
        .schedules
        .replace_subject_windows(subject_id, windows)
        .await?;

    Ok(Json(json!({
        "subjectId": subject_id,
        "schedules": windows,
    })))
}

/// Student counts, per-subject completion and recent attempts.
/// Admin only.
pub async fn get_dashboard(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(dashboard::build(&state.store, &state.catalog).await))
}
