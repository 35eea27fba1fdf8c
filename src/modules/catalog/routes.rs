use axum::{routing::get, Router};

use super::handlers::{
    category_quizzes, category_subcategories, get_category, get_quiz, list_categories,
    list_public_quizzes, list_quizzes, quiz_questions, search_quizzes,
};
use crate::app_state::AppState;

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/:id", get(get_category))
        .route("/categories/:id/quizzes", get(category_quizzes))
        .route("/categories/:id/subcategories", get(category_subcategories))
        .route("/quizzes", get(list_quizzes))
        .route("/public/quizzes", get(list_public_quizzes))
        .route("/quizzes/:id", get(get_quiz))
        .route("/quizzes/:id/questions", get(quiz_questions))
        .route("/search/quizzes", get(search_quizzes))
}
