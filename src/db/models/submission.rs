use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSubmission {
    pub id: Uuid,
    pub user_id: i32,
    pub quiz_id: i32,
    pub progress_id: i32,
    pub score: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
    pub reviewed: bool,
    pub feedback: Option<String>,
}

/// Submission joined with the student's and the quiz's display names.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub submission: QuizSubmission,
    pub student_name: Option<String>,
    pub quiz_title: Option<String>,
    pub time_spent: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizFeedback {
    pub id: i32,
    pub progress_id: i32,
    pub feedback: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewQuizFeedback {
    pub progress_id: i32,
    #[validate(length(min = 1, max = 10000))]
    pub feedback: String,
}

#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardKpis {
    pub total_students: i64,
    pub assigned_quizzes: i64,
    pub completed_quizzes: i64,
    pub pending_reviews: i64,
    /// Mean 0..10 grade over completed progress rows.
    pub average_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSubmission {
    pub id: Uuid,
    pub progress_id: i32,
    pub user_id: i32,
    pub quiz_id: i32,
    pub user_name: String,
    pub quiz_title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
}

/// Keeps the first row seen for each (user, quiz) pair, up to `limit` rows.
///
/// Rows are expected newest first, so the kept row is the latest attempt.
pub fn latest_per_user_quiz(rows: Vec<PendingSubmission>, limit: usize) -> Vec<PendingSubmission> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert((row.user_id, row.quiz_id)))
        .take(limit)
        .collect()
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgressSummary {
    pub user_id: i32,
    pub name: String,
    pub assigned: i64,
    pub completed: i64,
    pub pending: i64,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAtRisk {
    pub user_id: i32,
    pub user_name: String,
    pub quiz_id: i32,
    pub quiz_title: String,
    pub subcategory_id: Option<i32>,
    pub score: Option<i32>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(progress_id: i32, user_id: i32, quiz_id: i32) -> PendingSubmission {
        PendingSubmission {
            id: Uuid::new_v4(),
            progress_id,
            user_id,
            quiz_id,
            user_name: format!("student {user_id}"),
            quiz_title: format!("quiz {quiz_id}"),
            submitted_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn keeps_latest_attempt_per_student_quiz() {
        let rows = vec![
            pending(10, 1, 1),
            pending(9, 1, 1),
            pending(8, 2, 1),
            pending(7, 1, 2),
        ];

        let kept: Vec<i32> = latest_per_user_quiz(rows, 5)
            .into_iter()
            .map(|row| row.progress_id)
            .collect();
        assert_eq!(kept, vec![10, 8, 7]);
    }

    #[test]
    fn respects_limit() {
        let rows = (1..=8).map(|id| pending(id, id, 1)).collect();
        assert_eq!(latest_per_user_quiz(rows, 5).len(), 5);
    }
}
