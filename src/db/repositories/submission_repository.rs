use sqlx::{Error, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::models::{
    latest_per_user_quiz, DashboardKpis, PendingSubmission, QuizFeedback, QuizSubmission,
    StudentAtRisk, SubmissionSummary, UserProgressSummary,
};

const SUBMISSION_COLUMNS: &str =
    "id, user_id, quiz_id, progress_id, score, completed_at, reviewed, feedback";

/// Grades at or below this mark a student as at risk.
const AT_RISK_MAX_SCORE: i32 = 7;
const PENDING_SCAN_LIMIT: i64 = 50;
const PENDING_SHOWN: usize = 5;

pub struct SubmissionRepository;

impl SubmissionRepository {
    /// Files an attempt for review. The first submission of a progress row
    /// stands; filing it again returns the stored one unchanged.
    pub async fn save_submission(
        tx: &mut Transaction<'_, Postgres>,
        user_id: i32,
        quiz_id: i32,
        progress_id: i32,
        score: i32,
    ) -> Result<QuizSubmission, Error> {
        sqlx::query(
            r#"
            INSERT INTO quiz_submissions (id, user_id, quiz_id, progress_id, score)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (progress_id) DO NOTHING
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(quiz_id)
        .bind(progress_id)
        .bind(score)
        .execute(&mut **tx)
        .await?;

        sqlx::query_as::<_, QuizSubmission>(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM quiz_submissions WHERE progress_id = $1"
        ))
        .bind(progress_id)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn list_submissions(pool: &PgPool) -> Result<Vec<SubmissionSummary>, Error> {
        sqlx::query_as::<_, SubmissionSummary>(
            r#"
            SELECT qs.id, qs.user_id, qs.quiz_id, qs.progress_id, qs.score, qs.completed_at,
                   qs.reviewed, qs.feedback,
                   u.name AS student_name, q.title AS quiz_title, sp.time_spent
            FROM quiz_submissions qs
            LEFT JOIN users u ON u.id = qs.user_id
            LEFT JOIN quizzes q ON q.id = qs.quiz_id
            LEFT JOIN student_progress sp ON sp.id = qs.progress_id
            ORDER BY qs.completed_at DESC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn mark_reviewed(pool: &PgPool, progress_id: i32) -> Result<bool, Error> {
        let result = sqlx::query("UPDATE quiz_submissions SET reviewed = TRUE WHERE progress_id = $1")
            .bind(progress_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replaces the reviewer feedback of an attempt and mirrors it onto the submission.
    pub async fn save_feedback(
        tx: &mut Transaction<'_, Postgres>,
        progress_id: i32,
        feedback: &str,
    ) -> Result<QuizFeedback, Error> {
        let saved = sqlx::query_as::<_, QuizFeedback>(
            r#"
            INSERT INTO quiz_feedback (progress_id, feedback)
            VALUES ($1, $2)
            ON CONFLICT (progress_id) DO UPDATE SET
                feedback = EXCLUDED.feedback,
                created_at = NOW()
            RETURNING id, progress_id, feedback, created_at
            "#,
        )
        .bind(progress_id)
        .bind(feedback)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query("UPDATE quiz_submissions SET feedback = $2 WHERE progress_id = $1")
            .bind(progress_id)
            .bind(feedback)
            .execute(&mut **tx)
            .await?;

        Ok(saved)
    }

    pub async fn get_feedback(pool: &PgPool, progress_id: i32) -> Result<Option<QuizFeedback>, Error> {
        sqlx::query_as::<_, QuizFeedback>(
            "SELECT id, progress_id, feedback, created_at FROM quiz_feedback WHERE progress_id = $1",
        )
        .bind(progress_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn dashboard_kpis(pool: &PgPool) -> Result<DashboardKpis, Error> {
        sqlx::query_as::<_, DashboardKpis>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users WHERE role = 'student') AS total_students,
                (SELECT COUNT(*) FROM user_quizzes) AS assigned_quizzes,
                (SELECT COUNT(*) FROM student_progress WHERE status = 'completed') AS completed_quizzes,
                (SELECT COUNT(*) FROM quiz_submissions WHERE NOT reviewed) AS pending_reviews,
                (SELECT AVG(score)::float8 FROM student_progress
                  WHERE status = 'completed' AND score IS NOT NULL) AS average_score
            "#,
        )
        .fetch_one(pool)
        .await
    }

    /// Latest unreviewed submission per student and quiz, newest first.
    pub async fn recent_pending(pool: &PgPool) -> Result<Vec<PendingSubmission>, Error> {
        let rows = sqlx::query_as::<_, PendingSubmission>(
            r#"
            SELECT qs.id, qs.progress_id, qs.user_id, qs.quiz_id,
                   u.name AS user_name, q.title AS quiz_title, qs.completed_at AS submitted_at
            FROM quiz_submissions qs
            JOIN student_progress sp ON sp.id = qs.progress_id
            JOIN users u ON u.id = qs.user_id
            JOIN quizzes q ON q.id = qs.quiz_id
            WHERE NOT qs.reviewed
            ORDER BY qs.completed_at DESC
            LIMIT $1
            "#,
        )
        .bind(PENDING_SCAN_LIMIT)
        .fetch_all(pool)
        .await?;

        Ok(latest_per_user_quiz(rows, PENDING_SHOWN))
    }

    /// Assigned, completed and still-pending counts for every user.
    pub async fn user_progress_summary(pool: &PgPool) -> Result<Vec<UserProgressSummary>, Error> {
        sqlx::query_as::<_, UserProgressSummary>(
            r#"
            SELECT u.id AS user_id, u.name, counts.assigned, counts.completed,
                   counts.assigned - counts.completed AS pending
            FROM users u
            CROSS JOIN LATERAL (
                SELECT
                    (SELECT COUNT(*) FROM user_quizzes uq WHERE uq.user_id = u.id) AS assigned,
                    (SELECT COUNT(*) FROM student_progress sp
                      WHERE sp.user_id = u.id AND sp.status = 'completed') AS completed
            ) counts
            ORDER BY u.name
            "#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn students_at_risk(pool: &PgPool, limit: i64) -> Result<Vec<StudentAtRisk>, Error> {
        sqlx::query_as::<_, StudentAtRisk>(
            r#"
            SELECT sp.user_id, u.name AS user_name, sp.quiz_id, q.title AS quiz_title,
                   q.subcategory_id, sp.score, sp.completed_at
            FROM student_progress sp
            JOIN users u ON u.id = sp.user_id
            JOIN quizzes q ON q.id = sp.quiz_id
            WHERE sp.status = 'completed' AND sp.score <= $1
            ORDER BY sp.completed_at DESC NULLS LAST
            LIMIT $2
            "#,
        )
        .bind(AT_RISK_MAX_SCORE)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
