use axum::{routing::post, Router};

use super::handlers::survey_feedback;
use crate::app_state::AppState;

pub fn survey_routes() -> Router<AppState> {
    Router::new().route("/encuesta-feedback", post(survey_feedback))
}
