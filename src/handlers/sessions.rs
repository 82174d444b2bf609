// src/handlers/sessions.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::session::{SessionContext, SetAnswerRequest},
    state::AppState,
};

/// Starts a timed session (Loading -> Active).
pub async fn start_session(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(subject_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.sessions.start(&ctx, subject_id, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_session(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.sessions.view(id, &ctx.student_id).await?))
}

/// Changes the selection for one question while the session is active.
pub async fn set_answer(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = state
        .sessions
        .set_answer(id, &ctx.student_id, &req.question_id, req.option_ids)
        .await?;
    Ok(Json(view))
}

pub async fn submit_session(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.sessions.submit(id, &ctx.student_id).await?))
}

pub async fn abandon_session(
    State(state): State<AppState>,
    Extension(ctx): Extension<SessionContext>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.sessions.abandon(id, &ctx.student_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
