use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use tracing::info;
use validator::Validate;

use crate::app_state::AppState;
use crate::auth::CurrentUser;
use crate::db::repositories::{
    ProgressRepository, QuizRepository, SubmissionRepository, UserRepository,
};
use crate::db::{
    judge_answer, AnswerRejection, AssignedQuiz, Category, NewStudentAnswer, ProgressStatus,
    ProgressWithQuiz, QuizFeedback, QuizResults, StudentAnswer, StudentProgress, UpsertProgress,
    User,
};
use crate::error::{AppError, AppResult};

pub async fn user_categories(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(UserRepository::get_user_categories(&state.db, user.id).await?))
}

pub async fn user_quizzes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<AssignedQuiz>>> {
    Ok(Json(QuizRepository::assigned_quizzes(&state.db, user.id).await?))
}

pub async fn list_progress(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<ProgressWithQuiz>>> {
    Ok(Json(ProgressRepository::list_progress(&state.db, user.id).await?))
}

/// `null` when the student has not started the quiz.
pub async fn quiz_progress(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(quiz_id): Path<i32>,
) -> AppResult<Json<Option<StudentProgress>>> {
    Ok(Json(
        ProgressRepository::get_progress_by_quiz(&state.db, user.id, quiz_id).await?,
    ))
}

/// Creates or updates the caller's progress on a quiz. Completing it with a
/// score also files the attempt for review.
pub async fn save_progress(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpsertProgress>,
) -> AppResult<Json<StudentProgress>> {
    payload.validate()?;
    if QuizRepository::get_quiz(&state.db, payload.quiz_id).await?.is_none() {
        return Err(AppError::NotFound(format!("quiz {}", payload.quiz_id)));
    }

    let mut tx = state.db.begin().await?;
    let progress = ProgressRepository::save_progress(&mut tx, user.id, payload).await?;
    if let (ProgressStatus::Completed, Some(score)) = (progress.status, progress.score) {
        SubmissionRepository::save_submission(
            &mut tx,
            user.id,
            progress.quiz_id,
            progress.id,
            score,
        )
        .await?;
    }
    tx.commit().await?;

    info!(
        user_id = user.id,
        quiz_id = progress.quiz_id,
        status = ?progress.status,
        "Progress saved"
    );
    Ok(Json(progress))
}

/// Records one answer of an open attempt. Correctness is read from the
/// stored options, and a question already answered is refused with 409.
pub async fn record_answer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<NewStudentAnswer>,
) -> AppResult<(StatusCode, Json<StudentAnswer>)> {
    payload.validate()?;
    let progress = owned_progress(&state, &user, payload.progress_id).await?;

    let question = QuizRepository::get_question(&state.db, payload.question_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("question {}", payload.question_id)))?;
    let key = match payload.answer_id {
        Some(answer_id) => QuizRepository::answer_key(&state.db, answer_id).await?,
        None => None,
    };

    let is_correct = judge_answer(&progress, question.quiz_id, &payload, key).map_err(|rejection| {
        match rejection {
            AnswerRejection::AttemptCompleted => AppError::Conflict(rejection.to_string()),
            _ => AppError::BadRequest(rejection.to_string()),
        }
    })?;

    let answer = ProgressRepository::record_answer(&state.db, &payload, is_correct).await?;
    Ok((StatusCode::CREATED, Json(answer)))
}

pub async fn quiz_results(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(progress_id): Path<i32>,
) -> AppResult<Json<QuizResults>> {
    owned_progress(&state, &user, progress_id).await?;
    ProgressRepository::quiz_results(&state.db, progress_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("results for progress {progress_id}")))
}

/// Reviewer feedback on an attempt, `null` until one is written.
pub async fn quiz_feedback(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(progress_id): Path<i32>,
) -> AppResult<Json<Option<QuizFeedback>>> {
    owned_progress(&state, &user, progress_id).await?;
    Ok(Json(
        SubmissionRepository::get_feedback(&state.db, progress_id).await?,
    ))
}

/// Progress row readable by `user`: their own, or any row for an admin.
async fn owned_progress(state: &AppState, user: &User, progress_id: i32) -> AppResult<StudentProgress> {
    let progress = ProgressRepository::get_progress(&state.db, progress_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("progress {progress_id}")))?;

    if progress.user_id != user.id && !user.is_admin() {
        return Err(AppError::Authorization(
            "Progress belongs to another student".to_string(),
        ));
    }
    Ok(progress)
}
