use axum::{
    extract::{Path, Query, State},
    response::Json,
};

use crate::app_state::AppState;
use crate::auth::OptionalUser;
use crate::db::repositories::{CategoryRepository, QuizRepository};
use crate::db::{Category, Quiz, QuizForUser, QuizListing, SearchQuery, Subcategory};
use crate::error::{AppError, AppResult};
use crate::quiz::{prepare_attempt, QuestionInstance};

pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(CategoryRepository::list_categories(&state.db).await?))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Category>> {
    CategoryRepository::get_category(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("category {id}")))
}

/// Quizzes of a category, each tagged with the caller's status when signed in.
pub async fn category_quizzes(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<QuizForUser>>> {
    let quizzes =
        QuizRepository::list_quizzes_by_category(&state.db, id, user.map(|u| u.id)).await?;
    Ok(Json(quizzes))
}

pub async fn category_subcategories(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<Subcategory>>> {
    Ok(Json(
        CategoryRepository::list_subcategories_by_category(&state.db, id).await?,
    ))
}

pub async fn list_quizzes(State(state): State<AppState>) -> AppResult<Json<Vec<QuizListing>>> {
    Ok(Json(QuizRepository::list_quizzes(&state.db).await?))
}

pub async fn list_public_quizzes(State(state): State<AppState>) -> AppResult<Json<Vec<Quiz>>> {
    Ok(Json(QuizRepository::list_public_quizzes(&state.db).await?))
}

pub async fn get_quiz(State(state): State<AppState>, Path(id): Path<i32>) -> AppResult<Json<Quiz>> {
    find_quiz(&state, id).await.map(Json)
}

/// A fresh randomized instance of the quiz: variables drawn, options shuffled.
/// Private quizzes need a signed-in user.
pub async fn quiz_questions(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<QuestionInstance>>> {
    let quiz = find_quiz(&state, id).await?;
    if !quiz.is_public && user.is_none() {
        return Err(AppError::Authentication(
            "Sign in to take this quiz".to_string(),
        ));
    }

    let questions = QuizRepository::list_questions_with_answers(&state.db, id).await?;
    Ok(Json(prepare_attempt(&questions, &mut rand::rng())))
}

pub async fn search_quizzes(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<QuizForUser>>> {
    let quizzes =
        QuizRepository::search_quizzes(&state.db, &query.q, user.map(|u| u.id)).await?;
    Ok(Json(quizzes))
}

pub(crate) async fn find_quiz(state: &AppState, id: i32) -> AppResult<Quiz> {
    QuizRepository::get_quiz(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("quiz {id}")))
}
