pub mod admin;
pub mod auth;
pub mod catalog;
pub mod quiz_sessions;
pub mod student;
pub mod survey;

use axum::Router;

use crate::app_state::AppState;

/// Every JSON endpoint, mounted under `/api` by the application router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(auth::auth_routes())
        .merge(catalog::catalog_routes())
        .merge(student::student_routes())
        .merge(quiz_sessions::quiz_session_routes())
        .merge(survey::survey_routes())
        .nest("/admin", admin::admin_routes())
}
