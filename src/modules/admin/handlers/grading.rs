use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use crate::app_state::AppState;
use crate::auth::AdminUser;
use crate::db::repositories::{ProgressRepository, SubmissionRepository};
use crate::db::{
    DashboardKpis, NewQuizFeedback, PendingSubmission, QuizFeedback, StudentAtRisk,
    SubmissionSummary, UserProgressSummary,
};
use crate::error::{AppError, AppResult};
use crate::feedback::quiz_prompt;

const DEFAULT_AT_RISK_LIMIT: i64 = 10;

pub async fn list_submissions(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<Vec<SubmissionSummary>>> {
    Ok(Json(SubmissionRepository::list_submissions(&state.db).await?))
}

pub async fn mark_reviewed(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(progress_id): Path<i32>,
) -> AppResult<StatusCode> {
    if !SubmissionRepository::mark_reviewed(&state.db, progress_id).await? {
        return Err(AppError::NotFound(format!(
            "submission for progress {progress_id}"
        )));
    }
    info!(admin_id = admin.id, progress_id, "Submission reviewed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn save_feedback(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<NewQuizFeedback>,
) -> AppResult<(StatusCode, Json<QuizFeedback>)> {
    payload.validate()?;
    if ProgressRepository::get_progress(&state.db, payload.progress_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!("progress {}", payload.progress_id)));
    }

    let mut tx = state.db.begin().await?;
    let feedback =
        SubmissionRepository::save_feedback(&mut tx, payload.progress_id, &payload.feedback)
            .await?;
    tx.commit().await?;

    info!(admin_id = admin.id, progress_id = payload.progress_id, "Feedback saved");
    Ok((StatusCode::CREATED, Json(feedback)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackDraft {
    pub progress_id: i32,
    pub draft: String,
}

/// Drafts reviewer feedback for an attempt. Nothing is stored; the admin
/// edits the draft and saves it through `save_feedback`.
pub async fn draft_feedback(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Path(progress_id): Path<i32>,
) -> AppResult<Json<FeedbackDraft>> {
    let client = state.feedback.clone().ok_or_else(|| {
        AppError::ServiceUnavailable("Feedback generation is not configured".to_string())
    })?;

    let results = ProgressRepository::quiz_results(&state.db, progress_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("progress {progress_id}")))?;

    let draft = client
        .generate(&quiz_prompt(&results))
        .await
        .map_err(|e| {
            warn!(progress_id, error = %e, "Feedback draft failed");
            AppError::ServiceUnavailable(format!("Feedback generation failed: {e}"))
        })?;

    Ok(Json(FeedbackDraft { progress_id, draft }))
}

pub async fn dashboard_kpis(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<DashboardKpis>> {
    Ok(Json(SubmissionRepository::dashboard_kpis(&state.db).await?))
}

pub async fn recent_pending(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<Vec<PendingSubmission>>> {
    Ok(Json(SubmissionRepository::recent_pending(&state.db).await?))
}

pub async fn user_progress_summary(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<Vec<UserProgressSummary>>> {
    Ok(Json(
        SubmissionRepository::user_progress_summary(&state.db).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct AtRiskQuery {
    pub limit: Option<i64>,
}

pub async fn students_at_risk(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<AtRiskQuery>,
) -> AppResult<Json<Vec<StudentAtRisk>>> {
    let limit = query.limit.unwrap_or(DEFAULT_AT_RISK_LIMIT).clamp(1, 100);
    Ok(Json(
        SubmissionRepository::students_at_risk(&state.db, limit).await?,
    ))
}
