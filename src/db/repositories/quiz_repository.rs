use sqlx::types::Json;
use sqlx::{Error, PgPool, Postgres, Transaction};
use std::collections::HashMap;

use crate::db::models::{
    Answer, AnswerInput, AnswerKey, AssignedQuiz, NewQuestion, NewQuiz, Question,
    QuestionWithAnswers, Quiz, QuizForUser, QuizListing, QuizProgressRow, UpdateQuestion,
    UpdateQuiz, User,
};

const QUIZ_COLUMNS: &str = "q.id, q.title, q.description, q.category_id, q.subcategory_id, \
     q.time_limit, q.difficulty, q.total_questions, q.is_public";
const QUESTION_COLUMNS: &str = "id, quiz_id, content, type, difficulty, points, image_url, \
     hint1, hint2, hint3, explanation, variables";
const ANSWER_COLUMNS: &str = "id, question_id, content, is_correct, explanation";

pub struct QuizRepository;

impl QuizRepository {
    pub async fn list_quizzes(pool: &PgPool) -> Result<Vec<QuizListing>, Error> {
        sqlx::query_as::<_, QuizListing>(&format!(
            r#"
            SELECT {QUIZ_COLUMNS}, c.name AS category_name, s.name AS subcategory_name
            FROM quizzes q
            LEFT JOIN categories c ON c.id = q.category_id
            LEFT JOIN subcategories s ON s.id = q.subcategory_id
            ORDER BY q.id
            "#
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn list_public_quizzes(pool: &PgPool) -> Result<Vec<Quiz>, Error> {
        sqlx::query_as::<_, Quiz>(&format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes q WHERE q.is_public ORDER BY q.id"
        ))
        .fetch_all(pool)
        .await
    }

    pub async fn get_quiz(pool: &PgPool, id: i32) -> Result<Option<Quiz>, Error> {
        sqlx::query_as::<_, Quiz>(&format!("SELECT {QUIZ_COLUMNS} FROM quizzes q WHERE q.id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Quizzes of a category, with the viewer's status on each when `user_id` is set.
    pub async fn list_quizzes_by_category(
        pool: &PgPool,
        category_id: i32,
        user_id: Option<i32>,
    ) -> Result<Vec<QuizForUser>, Error> {
        let rows = sqlx::query_as::<_, QuizProgressRow>(&format!(
            r#"
            {}
            WHERE q.category_id = $2
            ORDER BY q.id
            "#,
            quiz_progress_select()
        ))
        .bind(user_id)
        .bind(category_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(QuizForUser::from).collect())
    }

    /// Title or description match; at most ten rows.
    pub async fn search_quizzes(
        pool: &PgPool,
        query: &str,
        user_id: Option<i32>,
    ) -> Result<Vec<QuizForUser>, Error> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, QuizProgressRow>(&format!(
            r#"
            {}
            WHERE q.title ILIKE $2 OR q.description ILIKE $2
            ORDER BY q.title
            LIMIT 10
            "#,
            quiz_progress_select()
        ))
        .bind(user_id)
        .bind(format!("%{}%", query.trim()))
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(QuizForUser::from).collect())
    }

    pub async fn create_quiz(pool: &PgPool, new: &NewQuiz) -> Result<Quiz, Error> {
        sqlx::query_as::<_, Quiz>(
            r#"
            INSERT INTO quizzes
                (title, description, category_id, subcategory_id, time_limit, difficulty,
                 total_questions, is_public)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, title, description, category_id, subcategory_id, time_limit,
                      difficulty, total_questions, is_public
            "#,
        )
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.category_id)
        .bind(new.subcategory_id)
        .bind(new.time_limit)
        .bind(&new.difficulty)
        .bind(new.total_questions)
        .bind(new.is_public)
        .fetch_one(pool)
        .await
    }

    pub async fn update_quiz(pool: &PgPool, id: i32, update: &UpdateQuiz) -> Result<Quiz, Error> {
        sqlx::query_as::<_, Quiz>(
            r#"
            UPDATE quizzes SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                category_id = COALESCE($4, category_id),
                subcategory_id = CASE WHEN $10 THEN $5 ELSE subcategory_id END,
                time_limit = COALESCE($6, time_limit),
                difficulty = COALESCE($7, difficulty),
                total_questions = COALESCE($8, total_questions),
                is_public = COALESCE($9, is_public)
            WHERE id = $1
            RETURNING id, title, description, category_id, subcategory_id, time_limit,
                      difficulty, total_questions, is_public
            "#,
        )
        .bind(id)
        .bind(&update.title)
        .bind(&update.description)
        .bind(update.category_id)
        .bind(update.subcategory_id.flatten())
        .bind(update.time_limit)
        .bind(&update.difficulty)
        .bind(update.total_questions)
        .bind(update.is_public)
        .bind(update.subcategory_id.is_some())
        .fetch_one(pool)
        .await
    }

    /// Deletes a quiz and every row hanging off it: attempts, submissions,
    /// feedback, assignments, questions and their answers.
    pub async fn delete_quiz(tx: &mut Transaction<'_, Postgres>, id: i32) -> Result<bool, Error> {
        let dependent = [
            "DELETE FROM student_answers WHERE progress_id IN (SELECT id FROM student_progress WHERE quiz_id = $1)",
            "DELETE FROM quiz_feedback WHERE progress_id IN (SELECT id FROM student_progress WHERE quiz_id = $1)",
            "DELETE FROM quiz_submissions WHERE quiz_id = $1",
            "DELETE FROM student_progress WHERE quiz_id = $1",
            "DELETE FROM user_quizzes WHERE quiz_id = $1",
            "DELETE FROM answers WHERE question_id IN (SELECT id FROM questions WHERE quiz_id = $1)",
            "DELETE FROM questions WHERE quiz_id = $1",
        ];
        for statement in dependent {
            sqlx::query(statement).bind(id).execute(&mut **tx).await?;
        }

        let result = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_questions(pool: &PgPool, quiz_id: i32) -> Result<Vec<Question>, Error> {
        sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE quiz_id = $1 ORDER BY id"
        ))
        .bind(quiz_id)
        .fetch_all(pool)
        .await
    }

    pub async fn get_question(pool: &PgPool, id: i32) -> Result<Option<Question>, Error> {
        sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn answer_key(pool: &PgPool, answer_id: i32) -> Result<Option<AnswerKey>, Error> {
        sqlx::query_as::<_, AnswerKey>("SELECT question_id, is_correct FROM answers WHERE id = $1")
            .bind(answer_id)
            .fetch_optional(pool)
            .await
    }

    /// Questions of a quiz in id order, each with its options.
    pub async fn list_questions_with_answers(
        pool: &PgPool,
        quiz_id: i32,
    ) -> Result<Vec<QuestionWithAnswers>, Error> {
        let questions = Self::list_questions(pool, quiz_id).await?;
        let answers = sqlx::query_as::<_, Answer>(&format!(
            r#"
            SELECT {ANSWER_COLUMNS} FROM answers
            WHERE question_id IN (SELECT id FROM questions WHERE quiz_id = $1)
            ORDER BY id
            "#
        ))
        .bind(quiz_id)
        .fetch_all(pool)
        .await?;

        Ok(attach_answers(questions, answers))
    }

    pub async fn create_question(
        tx: &mut Transaction<'_, Postgres>,
        new: &NewQuestion,
    ) -> Result<QuestionWithAnswers, Error> {
        let question = sqlx::query_as::<_, Question>(&format!(
            r#"
            INSERT INTO questions
                (quiz_id, content, type, difficulty, points, image_url, hint1, hint2, hint3,
                 explanation, variables)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(new.quiz_id)
        .bind(&new.content)
        .bind(new.question_type)
        .bind(new.difficulty)
        .bind(new.points)
        .bind(&new.image_url)
        .bind(&new.hint1)
        .bind(&new.hint2)
        .bind(&new.hint3)
        .bind(&new.explanation)
        .bind(new.variables.as_ref().map(Json))
        .fetch_one(&mut **tx)
        .await?;

        let mut answers = Vec::with_capacity(new.answers.len());
        for input in &new.answers {
            answers.push(insert_answer(tx, question.id, input).await?);
        }

        recount_questions(tx, question.quiz_id).await?;

        Ok(QuestionWithAnswers { question, answers })
    }

    /// Updates a question. When `answers` is given, it becomes the full
    /// option set: listed ids are updated, new entries inserted, the rest removed.
    pub async fn update_question(
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
        update: &UpdateQuestion,
    ) -> Result<QuestionWithAnswers, Error> {
        let question = sqlx::query_as::<_, Question>(&format!(
            r#"
            UPDATE questions SET
                content = COALESCE($2, content),
                type = COALESCE($3, type),
                difficulty = COALESCE($4, difficulty),
                points = COALESCE($5, points),
                image_url = COALESCE($6, image_url),
                hint1 = COALESCE($7, hint1),
                hint2 = COALESCE($8, hint2),
                hint3 = COALESCE($9, hint3),
                explanation = COALESCE($10, explanation),
                variables = COALESCE($11, variables)
            WHERE id = $1
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.content)
        .bind(update.question_type)
        .bind(update.difficulty)
        .bind(update.points)
        .bind(&update.image_url)
        .bind(&update.hint1)
        .bind(&update.hint2)
        .bind(&update.hint3)
        .bind(&update.explanation)
        .bind(update.variables.as_ref().map(Json))
        .fetch_one(&mut **tx)
        .await?;

        if let Some(inputs) = &update.answers {
            let kept: Vec<i32> = inputs.iter().filter_map(|input| input.id).collect();

            sqlx::query(
                r#"
                UPDATE student_answers SET answer_id = NULL
                WHERE answer_id IN (
                    SELECT id FROM answers WHERE question_id = $1 AND NOT (id = ANY($2))
                )
                "#,
            )
            .bind(id)
            .bind(&kept)
            .execute(&mut **tx)
            .await?;

            sqlx::query("DELETE FROM answers WHERE question_id = $1 AND NOT (id = ANY($2))")
                .bind(id)
                .bind(&kept)
                .execute(&mut **tx)
                .await?;

            for input in inputs {
                match input.id {
                    Some(answer_id) => {
                        sqlx::query(
                            r#"
                            UPDATE answers SET content = $3, is_correct = $4, explanation = $5
                            WHERE id = $1 AND question_id = $2
                            "#,
                        )
                        .bind(answer_id)
                        .bind(id)
                        .bind(&input.content)
                        .bind(input.is_correct)
                        .bind(&input.explanation)
                        .execute(&mut **tx)
                        .await?;
                    }
                    None => {
                        insert_answer(tx, id, input).await?;
                    }
                }
            }
        }

        let answers = sqlx::query_as::<_, Answer>(&format!(
            "SELECT {ANSWER_COLUMNS} FROM answers WHERE question_id = $1 ORDER BY id"
        ))
        .bind(id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(QuestionWithAnswers { question, answers })
    }

    pub async fn delete_question(
        tx: &mut Transaction<'_, Postgres>,
        id: i32,
    ) -> Result<bool, Error> {
        sqlx::query("DELETE FROM student_answers WHERE question_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM answers WHERE question_id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        let quiz_id: Option<(i32,)> =
            sqlx::query_as("DELETE FROM questions WHERE id = $1 RETURNING quiz_id")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;

        match quiz_id {
            Some((quiz_id,)) => {
                recount_questions(tx, quiz_id).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn assign_quiz(pool: &PgPool, user_id: i32, quiz_id: i32) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO user_quizzes (user_id, quiz_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(quiz_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn unassign_quiz(pool: &PgPool, user_id: i32, quiz_id: i32) -> Result<bool, Error> {
        let result = sqlx::query("DELETE FROM user_quizzes WHERE user_id = $1 AND quiz_id = $2")
            .bind(user_id)
            .bind(quiz_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn users_assigned_to_quiz(pool: &PgPool, quiz_id: i32) -> Result<Vec<User>, Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.password_hash, u.name, u.email, u.role,
                   u.subscription_status, u.created_at
            FROM user_quizzes uq
            JOIN users u ON u.id = uq.user_id
            WHERE uq.quiz_id = $1
            ORDER BY u.name
            "#,
        )
        .bind(quiz_id)
        .fetch_all(pool)
        .await
    }

    /// Quizzes the student was assigned or has started.
    pub async fn assigned_quizzes(pool: &PgPool, user_id: i32) -> Result<Vec<AssignedQuiz>, Error> {
        sqlx::query_as::<_, AssignedQuiz>(
            r#"
            SELECT q.id, q.title, q.description, q.category_id, q.subcategory_id, q.difficulty,
                   q.time_limit, q.total_questions,
                   sp.status, sp.score, sp.id AS progress_id,
                   (SELECT COUNT(DISTINCT sa.question_id)::int4
                      FROM student_answers sa WHERE sa.progress_id = sp.id) AS completed_questions,
                   sp.time_spent, sp.completed_at,
                   qs.reviewed, qf.feedback
            FROM quizzes q
            LEFT JOIN user_quizzes uq ON uq.quiz_id = q.id AND uq.user_id = $1
            LEFT JOIN student_progress sp ON sp.quiz_id = q.id AND sp.user_id = $1
            LEFT JOIN quiz_submissions qs ON qs.progress_id = sp.id
            LEFT JOIN quiz_feedback qf ON qf.progress_id = sp.id
            WHERE uq.quiz_id IS NOT NULL OR sp.id IS NOT NULL
            ORDER BY q.id
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}

fn quiz_progress_select() -> String {
    format!(
        r#"
        SELECT {QUIZ_COLUMNS},
               sp.status AS progress_status,
               (uq.quiz_id IS NOT NULL) AS assigned,
               sp.score, sp.time_spent, sp.completed_at, sp.id AS progress_id
        FROM quizzes q
        LEFT JOIN student_progress sp ON sp.quiz_id = q.id AND sp.user_id = $1
        LEFT JOIN user_quizzes uq ON uq.quiz_id = q.id AND uq.user_id = $1
        "#
    )
}

async fn insert_answer(
    tx: &mut Transaction<'_, Postgres>,
    question_id: i32,
    input: &AnswerInput,
) -> Result<Answer, Error> {
    sqlx::query_as::<_, Answer>(&format!(
        r#"
        INSERT INTO answers (question_id, content, is_correct, explanation)
        VALUES ($1, $2, $3, $4)
        RETURNING {ANSWER_COLUMNS}
        "#
    ))
    .bind(question_id)
    .bind(&input.content)
    .bind(input.is_correct)
    .bind(&input.explanation)
    .fetch_one(&mut **tx)
    .await
}

async fn recount_questions(tx: &mut Transaction<'_, Postgres>, quiz_id: i32) -> Result<(), Error> {
    sqlx::query(
        r#"
        UPDATE quizzes
        SET total_questions = (SELECT COUNT(*) FROM questions WHERE quiz_id = $1)
        WHERE id = $1
        "#,
    )
    .bind(quiz_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Groups options under their question, preserving question order.
pub fn attach_answers(questions: Vec<Question>, answers: Vec<Answer>) -> Vec<QuestionWithAnswers> {
    let mut by_question: HashMap<i32, Vec<Answer>> = HashMap::new();
    for answer in answers {
        by_question.entry(answer.question_id).or_default().push(answer);
    }
    questions
        .into_iter()
        .map(|question| QuestionWithAnswers {
            answers: by_question.remove(&question.id).unwrap_or_default(),
            question,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::QuestionType;

    fn question(id: i32) -> Question {
        Question {
            id,
            quiz_id: 1,
            content: format!("q{id}"),
            question_type: QuestionType::Text,
            difficulty: 1,
            points: 5,
            image_url: None,
            hint1: None,
            hint2: None,
            hint3: None,
            explanation: None,
            variables: None,
        }
    }

    fn answer(id: i32, question_id: i32) -> Answer {
        Answer {
            id,
            question_id,
            content: format!("a{id}"),
            is_correct: false,
            explanation: None,
        }
    }

    #[test]
    fn answers_land_under_their_question() {
        let grouped = attach_answers(
            vec![question(2), question(1), question(3)],
            vec![answer(10, 1), answer(11, 2), answer(12, 1)],
        );

        let ids: Vec<(i32, Vec<i32>)> = grouped
            .iter()
            .map(|q| (q.question.id, q.answers.iter().map(|a| a.id).collect()))
            .collect();
        assert_eq!(ids, vec![(2, vec![11]), (1, vec![10, 12]), (3, vec![])]);
    }
}
