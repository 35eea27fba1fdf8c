use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    list_progress, quiz_feedback, quiz_progress, quiz_results, record_answer, save_progress,
    user_categories, user_quizzes,
};
use crate::app_state::AppState;

pub fn student_routes() -> Router<AppState> {
    Router::new()
        .route("/user/categories", get(user_categories))
        .route("/user/quizzes", get(user_quizzes))
        .route("/progress", get(list_progress).post(save_progress))
        .route("/progress/:quiz_id", get(quiz_progress))
        .route("/answers", post(record_answer))
        .route("/results/:progress_id", get(quiz_results))
        .route("/quiz-feedback/:progress_id", get(quiz_feedback))
}
