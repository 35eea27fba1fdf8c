use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::CurrentUser;
use crate::db::repositories::{ProgressRepository, QuizRepository};
use crate::db::{ProgressStatus, StudentProgress, UpsertProgress};
use crate::error::{AppError, AppResult};
use crate::modules::catalog::handlers::find_quiz;
use crate::quiz::{
    prepare_attempt, QuizSession, QuizTimer, SessionError, SessionState, SessionView, StoredPick,
    DEFAULT_TIME_LIMIT_SECS,
};
use crate::sessions::{finalize, save_checkpoint, LiveSession};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub quiz_id: i32,
    /// Progress row backing the attempt; `null` for admin previews.
    pub progress_id: Option<i32>,
    #[serde(flatten)]
    pub view: SessionView,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub answer_id: i32,
}

/// Starts an attempt. A student's attempt is backed by their progress row
/// from the start and resumes where a previous visit left off; a quiz they
/// already completed is refused. Admins get a preview that is never stored.
pub async fn start_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(quiz_id): Path<i32>,
) -> AppResult<(StatusCode, Json<SessionResponse>)> {
    let quiz = find_quiz(&state, quiz_id).await?;
    let questions = QuizRepository::list_questions_with_answers(&state.db, quiz_id).await?;

    let limit_secs = match u64::try_from(quiz.time_limit) {
        Ok(minutes) if minutes > 0 => minutes * 60,
        _ => DEFAULT_TIME_LIMIT_SECS,
    };
    let mut session = QuizSession::new(QuizTimer::new(limit_secs));
    session.load(prepare_attempt(&questions, &mut rand::rng()))?;

    let (progress, resumed) = if user.is_admin() {
        (None, false)
    } else {
        let stored = ProgressRepository::get_progress_by_quiz(&state.db, user.id, quiz_id).await?;
        match attempt_to_continue(stored)? {
            Some(progress) => {
                let picks: Vec<StoredPick> = ProgressRepository::list_answers(&state.db, progress.id)
                    .await?
                    .into_iter()
                    .filter_map(|answer| {
                        Some(StoredPick {
                            question_id: answer.question_id,
                            answer_id: answer.answer_id?,
                            time_spent: u64::try_from(answer.time_spent).unwrap_or(0),
                        })
                    })
                    .collect();
                session.resume(
                    usize::try_from(progress.completed_questions).unwrap_or(0),
                    u64::try_from(progress.time_spent).unwrap_or(0),
                    &picks,
                )?;
                (Some(progress), true)
            }
            None => {
                let mut tx = state.db.begin().await?;
                let progress = ProgressRepository::save_progress(
                    &mut tx,
                    user.id,
                    UpsertProgress {
                        quiz_id,
                        status: Some(ProgressStatus::InProgress),
                        ..Default::default()
                    },
                )
                .await?;
                tx.commit().await?;
                (Some(progress), false)
            }
        }
    };

    let progress_id = progress.map(|p| p.id);
    let live = LiveSession::new(user.id, quiz_id, progress_id, session);
    let view = live.session.view();
    let session_id = state.sessions.start(live).await;

    info!(
        %session_id,
        user_id = user.id,
        quiz_id,
        preview = progress_id.is_none(),
        resumed,
        "Quiz session started"
    );

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id,
            quiz_id,
            progress_id,
            view,
        }),
    ))
}

/// The stored attempt a new session continues. Completed attempts are final.
fn attempt_to_continue(stored: Option<StudentProgress>) -> AppResult<Option<StudentProgress>> {
    match stored {
        Some(progress) if progress.status == ProgressStatus::Completed => {
            Err(AppError::Conflict(format!(
                "quiz {} is already completed, see /api/results/{}",
                progress.quiz_id, progress.id
            )))
        }
        Some(progress) if progress.status == ProgressStatus::InProgress => Ok(Some(progress)),
        _ => Ok(None),
    }
}

pub async fn get_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    drive(&state, session_id, user.id, |_| Ok(Step::Viewed)).await
}

pub async fn answer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> AppResult<Json<SessionResponse>> {
    drive(&state, session_id, user.id, |session| {
        let question_id = session.current_question().map(|q| q.id);
        session.select_answer(payload.answer_id)?;
        Ok(question_id.map_or(Step::Moved, Step::Answered))
    })
    .await
}

pub async fn next(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    drive(&state, session_id, user.id, |session| {
        session.next().map(|_| Step::Moved)
    })
    .await
}

pub async fn previous(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    drive(&state, session_id, user.id, |session| {
        session.previous().map(|_| Step::Viewed)
    })
    .await
}

pub async fn finish(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<SessionResponse>> {
    drive(&state, session_id, user.id, |session| {
        session.finish().map(|_| Step::Moved)
    })
    .await
}

/// What an action changed, and so what has to be written through.
#[derive(Debug, Clone, Copy)]
enum Step {
    Viewed,
    Moved,
    Answered(i32),
}

/// Applies `action` to the caller's session and returns the new view.
///
/// A session that ends up completed, by the action or by its timer, is
/// stored and leaves the registry, and the completed view is returned even
/// when the action itself was refused because time ran out. Otherwise the
/// step is written through to the student's progress row.
async fn drive<F>(
    state: &AppState,
    session_id: Uuid,
    user_id: i32,
    action: F,
) -> AppResult<Json<SessionResponse>>
where
    F: FnOnce(&mut QuizSession) -> Result<Step, SessionError>,
{
    let (outcome, view, quiz_id, progress_id, checkpoint) = state
        .sessions
        .with_session_mut(session_id, user_id, |live| {
            let outcome = action(&mut live.session);
            live.session.check_timer();
            let checkpoint = match outcome {
                Ok(Step::Answered(question_id)) => live.checkpoint(Some(question_id)),
                Ok(Step::Moved) => live.checkpoint(None),
                Ok(Step::Viewed) | Err(_) => None,
            };
            (outcome, live.session.view(), live.quiz_id, live.progress_id, checkpoint)
        })
        .await
        .ok_or_else(|| AppError::NotFound(format!("quiz session {session_id}")))?;

    if view.state == SessionState::Completed {
        let stored = finalize(&state.sessions, &state.db, session_id)
            .await?
            .and_then(|(_, progress)| progress)
            .map(|progress| progress.id);
        return Ok(Json(SessionResponse {
            session_id,
            quiz_id,
            progress_id: stored.or(progress_id),
            view,
        }));
    }

    outcome?;
    if let Some(checkpoint) = checkpoint {
        // The pick stays in memory and is written again on completion
        if let Err(e) = save_checkpoint(&state.db, &checkpoint).await {
            error!(%session_id, error = %e, "Failed to checkpoint quiz session");
        }
    }

    Ok(Json(SessionResponse {
        session_id,
        quiz_id,
        progress_id,
        view,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(status: ProgressStatus) -> StudentProgress {
        StudentProgress {
            id: 12,
            user_id: 3,
            quiz_id: 4,
            status,
            score: None,
            completed_questions: 2,
            time_spent: 90,
            completed_at: None,
        }
    }

    #[test]
    fn completed_quiz_cannot_be_started_again() {
        let err = attempt_to_continue(Some(stored(ProgressStatus::Completed))).unwrap_err();
        assert!(matches!(err, AppError::Conflict(message) if message.contains("/api/results/12")));
    }

    #[test]
    fn open_attempt_is_continued() {
        let progress = attempt_to_continue(Some(stored(ProgressStatus::InProgress))).unwrap();
        assert_eq!(progress.map(|p| p.completed_questions), Some(2));
    }

    #[test]
    fn untouched_quiz_starts_fresh() {
        assert!(attempt_to_continue(None).unwrap().is_none());
        assert!(attempt_to_continue(Some(stored(ProgressStatus::NotStarted)))
            .unwrap()
            .is_none());
    }
}
