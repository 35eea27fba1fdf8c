use axum::{
    routing::{get, patch, post, put},
    Router,
};

use super::handlers::{catalog, grading, users};
use crate::app_state::AppState;

/// Routes under `/api/admin`. Every handler takes an `AdminUser`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // Catalogue
        .route("/categories", post(catalog::create_category))
        .route(
            "/categories/:id",
            put(catalog::update_category).delete(catalog::delete_category),
        )
        .route(
            "/categories/:id/subcategories",
            get(catalog::subcategories_by_category),
        )
        .route(
            "/subcategories",
            get(catalog::list_subcategories).post(catalog::create_subcategory),
        )
        .route(
            "/subcategories/:id",
            put(catalog::update_subcategory).delete(catalog::delete_subcategory),
        )
        .route(
            "/quizzes",
            get(catalog::list_quizzes).post(catalog::create_quiz),
        )
        .route(
            "/quizzes/:id",
            put(catalog::update_quiz).delete(catalog::delete_quiz),
        )
        .route(
            "/questions",
            get(catalog::list_questions).post(catalog::create_question),
        )
        .route(
            "/questions/:id",
            put(catalog::update_question).delete(catalog::delete_question),
        )
        // Users
        .route("/users", get(users::list_users))
        .route("/users-with-categories", get(users::users_with_categories))
        .route("/search/users", get(users::search_users))
        .route(
            "/users/:id",
            patch(users::update_user).delete(users::delete_user),
        )
        .route(
            "/users/:id/categories",
            get(users::user_categories).put(users::replace_user_categories),
        )
        .route(
            "/users/quizzes",
            post(users::assign_quiz).delete(users::unassign_quiz),
        )
        .route("/users/quizzes/:quiz_id", get(users::users_assigned_to_quiz))
        // Grading
        .route("/submissions", get(grading::list_submissions))
        .route(
            "/submissions/:progress_id/review",
            post(grading::mark_reviewed),
        )
        .route("/quiz-feedback", post(grading::save_feedback))
        .route(
            "/quiz-feedback/:progress_id/draft",
            post(grading::draft_feedback),
        )
        .route("/dashboard/kpis", get(grading::dashboard_kpis))
        .route("/dashboard/recent-pending", get(grading::recent_pending))
        .route("/dashboard/user-progress", get(grading::user_progress_summary))
        .route("/dashboard/students-at-risk", get(grading::students_at_risk))
}
