use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::app_state::AppState;
use crate::auth::AdminUser;
use crate::db::repositories::{CategoryRepository, QuizRepository};
use crate::db::{
    Category, NewCategory, NewQuestion, NewQuiz, NewSubcategory, Quiz, QuizListing,
    QuestionWithAnswers, Subcategory, UpdateCategory, UpdateQuestion, UpdateQuiz,
    UpdateSubcategory,
};
use crate::error::{AppError, AppResult};

// Categories

pub async fn create_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<NewCategory>,
) -> AppResult<(StatusCode, Json<Category>)> {
    payload.validate()?;
    let category = CategoryRepository::create_category(&state.db, &payload).await?;
    info!(admin_id = admin.id, category_id = category.id, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateCategory>,
) -> AppResult<Json<Category>> {
    payload.validate()?;
    Ok(Json(
        CategoryRepository::update_category(&state.db, id, &payload).await?,
    ))
}

/// Fails with 409 while quizzes are still filed under the category.
pub async fn delete_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    let mut tx = state.db.begin().await?;
    if !CategoryRepository::delete_category(&mut tx, id).await? {
        return Err(AppError::NotFound(format!("category {id}")));
    }
    tx.commit().await?;

    info!(admin_id = admin.id, category_id = id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

// Subcategories

pub async fn list_subcategories(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<Vec<Subcategory>>> {
    Ok(Json(CategoryRepository::list_subcategories(&state.db).await?))
}

pub async fn subcategories_by_category(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(category_id): Path<i32>,
) -> AppResult<Json<Vec<Subcategory>>> {
    Ok(Json(
        CategoryRepository::list_subcategories_by_category(&state.db, category_id).await?,
    ))
}

pub async fn create_subcategory(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(payload): Json<NewSubcategory>,
) -> AppResult<(StatusCode, Json<Subcategory>)> {
    payload.validate()?;
    if CategoryRepository::get_category(&state.db, payload.category_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!("category {}", payload.category_id)));
    }
    let subcategory = CategoryRepository::create_subcategory(&state.db, &payload).await?;
    Ok((StatusCode::CREATED, Json(subcategory)))
}

pub async fn update_subcategory(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateSubcategory>,
) -> AppResult<Json<Subcategory>> {
    payload.validate()?;
    Ok(Json(
        CategoryRepository::update_subcategory(&state.db, id, &payload).await?,
    ))
}

/// Quizzes filed under the subcategory stay in its parent category.
pub async fn delete_subcategory(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    let mut tx = state.db.begin().await?;
    if !CategoryRepository::delete_subcategory(&mut tx, id).await? {
        return Err(AppError::NotFound(format!("subcategory {id}")));
    }
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

// Quizzes

pub async fn list_quizzes(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<Vec<QuizListing>>> {
    Ok(Json(QuizRepository::list_quizzes(&state.db).await?))
}

pub async fn create_quiz(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<NewQuiz>,
) -> AppResult<(StatusCode, Json<Quiz>)> {
    payload.validate()?;
    let quiz = QuizRepository::create_quiz(&state.db, &payload).await?;
    info!(admin_id = admin.id, quiz_id = quiz.id, "Quiz created");
    Ok((StatusCode::CREATED, Json(quiz)))
}

pub async fn update_quiz(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateQuiz>,
) -> AppResult<Json<Quiz>> {
    payload.validate()?;
    Ok(Json(QuizRepository::update_quiz(&state.db, id, &payload).await?))
}

/// Removes the quiz with its questions, answers and every student attempt.
pub async fn delete_quiz(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    let mut tx = state.db.begin().await?;
    if !QuizRepository::delete_quiz(&mut tx, id).await? {
        return Err(AppError::NotFound(format!("quiz {id}")));
    }
    tx.commit().await?;

    info!(admin_id = admin.id, quiz_id = id, "Quiz deleted");
    Ok(StatusCode::NO_CONTENT)
}

// Questions

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionsQuery {
    pub quiz_id: i32,
}

pub async fn list_questions(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<QuestionsQuery>,
) -> AppResult<Json<Vec<QuestionWithAnswers>>> {
    Ok(Json(
        QuizRepository::list_questions_with_answers(&state.db, query.quiz_id).await?,
    ))
}

pub async fn create_question(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(payload): Json<NewQuestion>,
) -> AppResult<(StatusCode, Json<QuestionWithAnswers>)> {
    payload.validate()?;
    if QuizRepository::get_quiz(&state.db, payload.quiz_id).await?.is_none() {
        return Err(AppError::NotFound(format!("quiz {}", payload.quiz_id)));
    }

    let mut tx = state.db.begin().await?;
    let question = QuizRepository::create_question(&mut tx, &payload).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn update_question(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateQuestion>,
) -> AppResult<Json<QuestionWithAnswers>> {
    payload.validate()?;
    let mut tx = state.db.begin().await?;
    let question = QuizRepository::update_question(&mut tx, id, &payload).await?;
    tx.commit().await?;
    Ok(Json(question))
}

pub async fn delete_question(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    let mut tx = state.db.begin().await?;
    if !QuizRepository::delete_question(&mut tx, id).await? {
        return Err(AppError::NotFound(format!("question {id}")));
    }
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
