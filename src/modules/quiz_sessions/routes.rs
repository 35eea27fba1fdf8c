use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{answer, finish, get_session, next, previous, start_session};
use crate::app_state::AppState;

pub fn quiz_session_routes() -> Router<AppState> {
    Router::new()
        .route("/quizzes/:id/sessions", post(start_session))
        .route("/sessions/:session_id", get(get_session))
        .route("/sessions/:session_id/answer", post(answer))
        .route("/sessions/:session_id/next", post(next))
        .route("/sessions/:session_id/previous", post(previous))
        .route("/sessions/:session_id/finish", post(finish))
}
