use sqlx::types::Json;
use sqlx::{Error, PgPool, Postgres, Transaction};
use time::OffsetDateTime;

use crate::db::models::{
    merge_progress_update, AttemptAnswer, CompletedAttempt, DetailedAnswer, NewStudentAnswer,
    ProgressStatus, ProgressWithQuiz, QuizResults, StudentAnswer, StudentProgress, UpsertProgress,
};

const PROGRESS_COLUMNS: &str =
    "id, user_id, quiz_id, status, score, completed_questions, time_spent, completed_at";
const STUDENT_ANSWER_COLUMNS: &str =
    "id, progress_id, question_id, answer_id, is_correct, variables, time_spent";

pub struct ProgressRepository;

impl ProgressRepository {
    pub async fn list_progress(pool: &PgPool, user_id: i32) -> Result<Vec<ProgressWithQuiz>, Error> {
        sqlx::query_as::<_, ProgressWithQuiz>(
            r#"
            SELECT sp.id, sp.user_id, sp.quiz_id, sp.status, sp.score, sp.completed_questions,
                   sp.time_spent, sp.completed_at,
                   q.title AS quiz_title, q.category_id
            FROM student_progress sp
            JOIN quizzes q ON q.id = sp.quiz_id
            WHERE sp.user_id = $1
            ORDER BY sp.id
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn get_progress(pool: &PgPool, id: i32) -> Result<Option<StudentProgress>, Error> {
        sqlx::query_as::<_, StudentProgress>(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM student_progress WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn get_progress_by_quiz(
        pool: &PgPool,
        user_id: i32,
        quiz_id: i32,
    ) -> Result<Option<StudentProgress>, Error> {
        sqlx::query_as::<_, StudentProgress>(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM student_progress WHERE user_id = $1 AND quiz_id = $2"
        ))
        .bind(user_id)
        .bind(quiz_id)
        .fetch_optional(pool)
        .await
    }

    /// Creates or updates the student's row for a quiz. Completed rows never
    /// move back to `in_progress`.
    pub async fn save_progress(
        tx: &mut Transaction<'_, Postgres>,
        user_id: i32,
        update: UpsertProgress,
    ) -> Result<StudentProgress, Error> {
        let current = sqlx::query_as::<_, StudentProgress>(&format!(
            r#"
            SELECT {PROGRESS_COLUMNS} FROM student_progress
            WHERE user_id = $1 AND quiz_id = $2
            FOR UPDATE
            "#
        ))
        .bind(user_id)
        .bind(update.quiz_id)
        .fetch_optional(&mut **tx)
        .await?;

        let update = merge_progress_update(current.as_ref(), update, OffsetDateTime::now_utc());

        match current {
            Some(current) => {
                sqlx::query_as::<_, StudentProgress>(&format!(
                    r#"
                    UPDATE student_progress SET
                        status = COALESCE($2, status),
                        score = COALESCE($3, score),
                        completed_questions = COALESCE($4, completed_questions),
                        time_spent = COALESCE($5, time_spent),
                        completed_at = COALESCE($6, completed_at)
                    WHERE id = $1
                    RETURNING {PROGRESS_COLUMNS}
                    "#
                ))
                .bind(current.id)
                .bind(update.status)
                .bind(update.score)
                .bind(update.completed_questions)
                .bind(update.time_spent)
                .bind(update.completed_at)
                .fetch_one(&mut **tx)
                .await
            }
            None => {
                sqlx::query_as::<_, StudentProgress>(&format!(
                    r#"
                    INSERT INTO student_progress
                        (user_id, quiz_id, status, score, completed_questions, time_spent, completed_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    RETURNING {PROGRESS_COLUMNS}
                    "#
                ))
                .bind(user_id)
                .bind(update.quiz_id)
                .bind(update.status.unwrap_or_default())
                .bind(update.score)
                .bind(update.completed_questions.unwrap_or(0))
                .bind(update.time_spent.unwrap_or(0))
                .bind(update.completed_at)
                .fetch_one(&mut **tx)
                .await
            }
        }
    }

    /// Records the answer to a question. A question takes one answer per
    /// attempt; a second one fails with a unique violation.
    pub async fn record_answer(
        pool: &PgPool,
        answer: &NewStudentAnswer,
        is_correct: bool,
    ) -> Result<StudentAnswer, Error> {
        sqlx::query_as::<_, StudentAnswer>(&format!(
            r#"
            INSERT INTO student_answers
                (progress_id, question_id, answer_id, is_correct, variables, time_spent)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {STUDENT_ANSWER_COLUMNS}
            "#
        ))
        .bind(answer.progress_id)
        .bind(answer.question_id)
        .bind(answer.answer_id)
        .bind(is_correct)
        .bind(answer.variables.as_ref().map(Json))
        .bind(answer.time_spent)
        .fetch_one(pool)
        .await
    }

    /// Stores a live-session pick. Picks already on file are left as they are.
    pub async fn insert_answer_once(
        tx: &mut Transaction<'_, Postgres>,
        progress_id: i32,
        answer: &AttemptAnswer,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO student_answers
                (progress_id, question_id, answer_id, is_correct, variables, time_spent)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (progress_id, question_id) DO NOTHING
            "#,
        )
        .bind(progress_id)
        .bind(answer.question_id)
        .bind(answer.answer_id)
        .bind(answer.is_correct)
        .bind(Json(&answer.variables))
        .bind(answer.time_spent)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Moves an open attempt forward. Counters only grow and completed rows
    /// are left untouched.
    pub async fn checkpoint(
        tx: &mut Transaction<'_, Postgres>,
        progress_id: i32,
        completed_questions: i32,
        time_spent: i32,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE student_progress SET
                completed_questions = GREATEST(completed_questions, $2),
                time_spent = GREATEST(time_spent, $3)
            WHERE id = $1 AND status <> 'completed'
            "#,
        )
        .bind(progress_id)
        .bind(completed_questions)
        .bind(time_spent)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn list_answers(pool: &PgPool, progress_id: i32) -> Result<Vec<StudentAnswer>, Error> {
        sqlx::query_as::<_, StudentAnswer>(&format!(
            "SELECT {STUDENT_ANSWER_COLUMNS} FROM student_answers WHERE progress_id = $1 ORDER BY id"
        ))
        .bind(progress_id)
        .fetch_all(pool)
        .await
    }

    /// Full breakdown of an attempt: the progress row, every answer with the
    /// chosen and correct options, and the latest reviewer feedback.
    pub async fn quiz_results(
        pool: &PgPool,
        progress_id: i32,
    ) -> Result<Option<QuizResults>, Error> {
        let Some(progress) = Self::get_progress(pool, progress_id).await? else {
            return Ok(None);
        };

        let (quiz_title,): (String,) = sqlx::query_as("SELECT title FROM quizzes WHERE id = $1")
            .bind(progress.quiz_id)
            .fetch_one(pool)
            .await?;

        let answers = sqlx::query_as::<_, DetailedAnswer>(
            r#"
            SELECT sa.question_id, q.content AS question_content, q.points,
                   sa.answer_id, a.content AS answer_content, sa.is_correct,
                   (SELECT ca.content FROM answers ca
                     WHERE ca.question_id = sa.question_id AND ca.is_correct
                     ORDER BY ca.id LIMIT 1) AS correct_answer_content,
                   COALESCE(a.explanation, q.explanation) AS explanation,
                   sa.variables, sa.time_spent
            FROM student_answers sa
            JOIN questions q ON q.id = sa.question_id
            LEFT JOIN answers a ON a.id = sa.answer_id
            WHERE sa.progress_id = $1
            ORDER BY q.id
            "#,
        )
        .bind(progress_id)
        .fetch_all(pool)
        .await?;

        let feedback: Option<(String,)> =
            sqlx::query_as("SELECT feedback FROM quiz_feedback WHERE progress_id = $1")
                .bind(progress_id)
                .fetch_optional(pool)
                .await?;

        Ok(Some(QuizResults {
            progress,
            quiz_title,
            answers,
            feedback: feedback.map(|(text,)| text),
        }))
    }

    /// Stores a finished attempt: the progress row as completed and any pick
    /// not yet on file.
    pub async fn complete_attempt(
        tx: &mut Transaction<'_, Postgres>,
        attempt: &CompletedAttempt,
    ) -> Result<StudentProgress, Error> {
        let progress = Self::save_progress(
            tx,
            attempt.user_id,
            UpsertProgress {
                quiz_id: attempt.quiz_id,
                status: Some(ProgressStatus::Completed),
                score: Some(attempt.grade),
                completed_questions: Some(attempt.completed_questions),
                time_spent: Some(attempt.time_spent),
                completed_at: Some(OffsetDateTime::now_utc()),
            },
        )
        .await?;

        for answer in &attempt.answers {
            Self::insert_answer_once(tx, progress.id, answer).await?;
        }

        Ok(progress)
    }
}
