use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use thiserror::Error;
use time::OffsetDateTime;
use validator::Validate;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "progress_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgress {
    pub id: i32,
    pub user_id: i32,
    pub quiz_id: i32,
    pub status: ProgressStatus,
    /// Grade on the 0..10 scale.
    pub score: Option<i32>,
    pub completed_questions: i32,
    /// Seconds.
    pub time_spent: i32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

/// Progress row joined with the quiz it belongs to.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressWithQuiz {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub progress: StudentProgress,
    pub quiz_title: String,
    pub category_id: i32,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpsertProgress {
    pub quiz_id: i32,
    pub status: Option<ProgressStatus>,
    #[validate(range(min = 0, max = 10))]
    pub score: Option<i32>,
    #[validate(range(min = 0))]
    pub completed_questions: Option<i32>,
    #[validate(range(min = 0))]
    pub time_spent: Option<i32>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

/// Applies an incoming progress update on top of the stored row.
///
/// A completed row keeps its grade: later updates never change its score,
/// and one asking for `in_progress` loses its status and completion time
/// too. Completing a row that has no completion time yet stamps `now`.
pub fn merge_progress_update(
    current: Option<&StudentProgress>,
    mut update: UpsertProgress,
    now: OffsetDateTime,
) -> UpsertProgress {
    let already_completed =
        current.is_some_and(|progress| progress.status == ProgressStatus::Completed);

    if already_completed {
        update.score = None;
        if update.status == Some(ProgressStatus::InProgress) {
            update.status = None;
            update.completed_at = None;
        }
    }

    let has_completion_time = current.is_some_and(|progress| progress.completed_at.is_some());
    if update.status == Some(ProgressStatus::Completed)
        && update.completed_at.is_none()
        && !has_completion_time
    {
        update.completed_at = Some(now);
    }

    update
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAnswer {
    pub id: i32,
    pub progress_id: i32,
    pub question_id: i32,
    pub answer_id: Option<i32>,
    pub is_correct: bool,
    /// Values drawn for the question's placeholders when it was shown.
    pub variables: Option<Json<Value>>,
    pub time_spent: i32,
}

/// Answer submitted outside a live session. Correctness is decided from the
/// stored options; a missing `answerId` records the question as unanswered.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewStudentAnswer {
    pub progress_id: i32,
    pub question_id: i32,
    pub answer_id: Option<i32>,
    pub variables: Option<Value>,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub time_spent: i32,
}

/// Where a stored option belongs and whether it is the right one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct AnswerKey {
    pub question_id: i32,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AnswerRejection {
    #[error("the attempt is already completed")]
    AttemptCompleted,

    #[error("question {0} is not part of this quiz")]
    ForeignQuestion(i32),

    #[error("answer {answer_id} is not an option of question {question_id}")]
    ForeignAnswer { answer_id: i32, question_id: i32 },
}

/// Checks an answer against the attempt it is filed under and returns its
/// correctness. `question_quiz_id` is the quiz owning the question and
/// `key` the stored option for `answer.answer_id`, if any.
pub fn judge_answer(
    progress: &StudentProgress,
    question_quiz_id: i32,
    answer: &NewStudentAnswer,
    key: Option<AnswerKey>,
) -> Result<bool, AnswerRejection> {
    if progress.status == ProgressStatus::Completed {
        return Err(AnswerRejection::AttemptCompleted);
    }
    if question_quiz_id != progress.quiz_id {
        return Err(AnswerRejection::ForeignQuestion(answer.question_id));
    }
    let Some(answer_id) = answer.answer_id else {
        return Ok(false);
    };
    match key {
        Some(key) if key.question_id == answer.question_id => Ok(key.is_correct),
        _ => Err(AnswerRejection::ForeignAnswer {
            answer_id,
            question_id: answer.question_id,
        }),
    }
}

/// One answered question of a completed quiz, with the chosen and correct options.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedAnswer {
    pub question_id: i32,
    pub question_content: String,
    pub points: i32,
    pub answer_id: Option<i32>,
    pub answer_content: Option<String>,
    pub is_correct: bool,
    pub correct_answer_content: Option<String>,
    pub explanation: Option<String>,
    pub variables: Option<Json<Value>>,
    pub time_spent: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResults {
    pub progress: StudentProgress,
    pub quiz_title: String,
    pub answers: Vec<DetailedAnswer>,
    pub feedback: Option<String>,
}

/// Everything persisted when a live attempt finishes.
#[derive(Debug, Clone)]
pub struct CompletedAttempt {
    pub user_id: i32,
    pub quiz_id: i32,
    pub grade: i32,
    pub completed_questions: i32,
    pub time_spent: i32,
    pub answers: Vec<AttemptAnswer>,
}

#[derive(Debug, Clone)]
pub struct AttemptAnswer {
    pub question_id: i32,
    pub answer_id: Option<i32>,
    pub is_correct: bool,
    pub variables: Value,
    pub time_spent: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn completed_row() -> StudentProgress {
        StudentProgress {
            id: 1,
            user_id: 2,
            quiz_id: 3,
            status: ProgressStatus::Completed,
            score: Some(8),
            completed_questions: 10,
            time_spent: 600,
            completed_at: Some(datetime!(2024-03-01 10:00 UTC)),
        }
    }

    #[test]
    fn completed_progress_does_not_regress() {
        let update = UpsertProgress {
            quiz_id: 3,
            status: Some(ProgressStatus::InProgress),
            score: Some(2),
            completed_questions: Some(4),
            ..Default::default()
        };

        let merged = merge_progress_update(
            Some(&completed_row()),
            update,
            datetime!(2024-03-02 10:00 UTC),
        );

        assert_eq!(merged.status, None);
        assert_eq!(merged.score, None);
        assert_eq!(merged.completed_questions, Some(4));
    }

    #[test]
    fn completed_grade_survives_a_second_completion() {
        let update = UpsertProgress {
            quiz_id: 3,
            status: Some(ProgressStatus::Completed),
            score: Some(2),
            ..Default::default()
        };

        let merged = merge_progress_update(
            Some(&completed_row()),
            update,
            datetime!(2024-03-02 10:00 UTC),
        );

        assert_eq!(merged.status, Some(ProgressStatus::Completed));
        assert_eq!(merged.score, None);
    }

    fn in_progress_row() -> StudentProgress {
        StudentProgress {
            status: ProgressStatus::InProgress,
            score: None,
            completed_at: None,
            ..completed_row()
        }
    }

    fn submitted(answer_id: Option<i32>) -> NewStudentAnswer {
        NewStudentAnswer {
            progress_id: 1,
            question_id: 40,
            answer_id,
            variables: None,
            time_spent: 5,
        }
    }

    #[test]
    fn answer_correctness_comes_from_the_stored_option() {
        let right = AnswerKey { question_id: 40, is_correct: true };
        let wrong = AnswerKey { question_id: 40, is_correct: false };

        assert_eq!(judge_answer(&in_progress_row(), 3, &submitted(Some(401)), Some(right)), Ok(true));
        assert_eq!(judge_answer(&in_progress_row(), 3, &submitted(Some(402)), Some(wrong)), Ok(false));
        assert_eq!(judge_answer(&in_progress_row(), 3, &submitted(None), None), Ok(false));
    }

    #[test]
    fn answers_outside_the_attempt_are_rejected() {
        let other_question = AnswerKey { question_id: 41, is_correct: true };

        assert_eq!(
            judge_answer(&in_progress_row(), 3, &submitted(Some(411)), Some(other_question)),
            Err(AnswerRejection::ForeignAnswer { answer_id: 411, question_id: 40 })
        );
        assert_eq!(
            judge_answer(&in_progress_row(), 3, &submitted(Some(999)), None),
            Err(AnswerRejection::ForeignAnswer { answer_id: 999, question_id: 40 })
        );
        assert_eq!(
            judge_answer(&in_progress_row(), 8, &submitted(None), None),
            Err(AnswerRejection::ForeignQuestion(40))
        );
    }

    #[test]
    fn completed_attempts_take_no_more_answers() {
        let right = AnswerKey { question_id: 40, is_correct: true };
        assert_eq!(
            judge_answer(&completed_row(), 3, &submitted(Some(401)), Some(right)),
            Err(AnswerRejection::AttemptCompleted)
        );
    }

    #[test]
    fn recompleting_keeps_original_completion_time() {
        let update = UpsertProgress {
            quiz_id: 3,
            status: Some(ProgressStatus::Completed),
            ..Default::default()
        };
        let merged = merge_progress_update(
            Some(&completed_row()),
            update,
            datetime!(2024-03-02 10:00 UTC),
        );
        assert_eq!(merged.completed_at, None);
    }

    #[test]
    fn completing_stamps_completion_time() {
        let now = datetime!(2024-03-02 10:00 UTC);
        let update = UpsertProgress {
            quiz_id: 3,
            status: Some(ProgressStatus::Completed),
            score: Some(7),
            ..Default::default()
        };

        let merged = merge_progress_update(None, update, now);
        assert_eq!(merged.completed_at, Some(now));
        assert_eq!(merged.score, Some(7));
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_value(ProgressStatus::InProgress).unwrap();
        assert_eq!(json, "in_progress");
    }
}
