// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, progress, quiz, sessions, subjects},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Student routes require a valid bearer token.
/// * Admin routes additionally require the admin role.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
        HeaderValue::from_static("http://localhost:5173"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let student_routes = Router::new()
        .route("/subjects", get(subjects::list_subjects))
        .route("/subjects/{id}/quiz", get(subjects::get_quiz))
        .route("/subjects/{id}/eligibility", get(subjects::get_eligibility))
        .route("/subjects/{id}/submit", post(quiz::submit_quiz))
        .route("/subjects/{id}/sessions", post(sessions::start_session))
        .route(
            "/sessions/{id}",
            get(sessions::get_session).delete(sessions::abandon_session),
        )
        .route("/sessions/{id}/answers", put(sessions::set_answer))
        .route("/sessions/{id}/submit", post(sessions::submit_session))
        .route("/progress", get(progress::my_progress))
        .route("/results", get(progress::my_results))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/progress/{student_id}", get(progress::student_progress))
        .route(
            "/batch-schedules",
            get(admin::list_batch_schedules).post(admin::create_batch_schedule),
        )
        .route("/batch-schedules/{id}", delete(admin::delete_batch_schedule))
        .route("/subjects/{id}/schedules", put(admin::replace_subject_schedules))
        .route("/dashboard", get(admin::get_dashboard))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api", student_routes)
        .nest("/api/admin", admin_routes)
        // Global middleware, outermost first
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::MemoryCache,
        config::Config,
        models::session::Role,
        store::JsonFileStore,
        utils::jwt::sign_jwt,
    };
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let store = Arc::new(JsonFileStore::in_memory(json!({ "subjects": [{ "id": 1, "name": "A" }] })));
        create_router(AppState::new(store, Arc::new(MemoryCache::new()), Config::with_secret("secret")))
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let response = app()
            .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_requires_admin_role() {
        let token = sign_jwt("sv1", Role::Student, Some("CNTT"), "secret", 60).unwrap();
        let response = app()
            .oneshot(
                Request::get("/api/admin/dashboard")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_frontend() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/subjects")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:5173"
        );
    }
}
