use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{login, logout, me, register};
use crate::app_state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/user", get(me))
}
