use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use tracing::info;
use validator::Validate;

use crate::app_state::AppState;
use crate::auth::AdminUser;
use crate::db::repositories::{QuizRepository, UserRepository};
use crate::db::{
    Category, QuizAssignment, ReplaceUserCategories, SearchQuery, UpdateUser, User,
    UserWithCategories,
};
use crate::error::{AppError, AppResult};

pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(UserRepository::list_users(&state.db).await?))
}

pub async fn users_with_categories(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<Vec<UserWithCategories>>> {
    Ok(Json(UserRepository::list_users_with_categories(&state.db).await?))
}

pub async fn search_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(UserRepository::search_users(&state.db, &query.q).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUser>,
) -> AppResult<Json<User>> {
    payload.validate()?;
    if id == admin.id && payload.role.is_some_and(|role| role != admin.role) {
        return Err(AppError::BadRequest(
            "Admins cannot change their own role".to_string(),
        ));
    }

    let user = UserRepository::update_user(&state.db, id, &payload).await?;
    info!(admin_id = admin.id, user_id = id, "User updated");
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    if id == admin.id {
        return Err(AppError::BadRequest(
            "Admins cannot delete their own account".to_string(),
        ));
    }

    let mut tx = state.db.begin().await?;
    if !UserRepository::delete_user(&mut tx, id).await? {
        return Err(AppError::NotFound(format!("user {id}")));
    }
    tx.commit().await?;

    info!(admin_id = admin.id, user_id = id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn user_categories(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(UserRepository::get_user_categories(&state.db, id).await?))
}

/// Replaces the categories a user may browse and returns the new set.
pub async fn replace_user_categories(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(id): Path<i32>,
    Json(payload): Json<ReplaceUserCategories>,
) -> AppResult<Json<Vec<Category>>> {
    if UserRepository::get_user_by_id(&state.db, id).await?.is_none() {
        return Err(AppError::NotFound(format!("user {id}")));
    }

    let mut tx = state.db.begin().await?;
    UserRepository::replace_user_categories(&mut tx, id, &payload.category_ids).await?;
    tx.commit().await?;

    Ok(Json(UserRepository::get_user_categories(&state.db, id).await?))
}

pub async fn assign_quiz(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<QuizAssignment>,
) -> AppResult<StatusCode> {
    QuizRepository::assign_quiz(&state.db, payload.user_id, payload.quiz_id).await?;
    info!(
        admin_id = admin.id,
        user_id = payload.user_id,
        quiz_id = payload.quiz_id,
        "Quiz assigned"
    );
    Ok(StatusCode::CREATED)
}

pub async fn unassign_quiz(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Json(payload): Json<QuizAssignment>,
) -> AppResult<StatusCode> {
    if !QuizRepository::unassign_quiz(&state.db, payload.user_id, payload.quiz_id).await? {
        return Err(AppError::NotFound(format!(
            "assignment of quiz {} to user {}",
            payload.quiz_id, payload.user_id
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn users_assigned_to_quiz(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(quiz_id): Path<i32>,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(
        QuizRepository::users_assigned_to_quiz(&state.db, quiz_id).await?,
    ))
}
