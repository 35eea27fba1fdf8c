use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use validator::{Validate, ValidationError};

use super::ProgressStatus;
use crate::quiz::VariableRange;

pub type VariableRanges = BTreeMap<String, VariableRange>;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub category_id: i32,
    pub subcategory_id: Option<i32>,
    /// Minutes; zero means the default limit applies.
    pub time_limit: i32,
    pub difficulty: String,
    pub total_questions: i32,
    pub is_public: bool,
}

/// Quiz row joined with its category and subcategory names.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub quiz: Quiz,
    pub category_name: Option<String>,
    pub subcategory_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewQuiz {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category_id: i32,
    pub subcategory_id: Option<i32>,
    #[validate(range(min = 0, max = 600))]
    pub time_limit: i32,
    #[validate(length(min = 1, max = 32))]
    pub difficulty: String,
    #[validate(range(min = 0))]
    #[serde(default)]
    pub total_questions: i32,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuiz {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<i32>,
    /// Absent leaves the subcategory alone; `null` detaches the quiz from it.
    #[serde(default, deserialize_with = "present_or_null")]
    pub subcategory_id: Option<Option<i32>>,
    #[validate(range(min = 0, max = 600))]
    pub time_limit: Option<i32>,
    #[validate(length(min = 1, max = 32))]
    pub difficulty: Option<String>,
    #[validate(range(min = 0))]
    pub total_questions: Option<i32>,
    pub is_public: Option<bool>,
}

/// Tells a field sent as `null` apart from one left out.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "question_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    Text,
    Formula,
    /// Linear equation `a·x + b = c` whose answers are derived from the drawn variables.
    Equation,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i32,
    pub quiz_id: i32,
    pub content: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub question_type: QuestionType,
    pub difficulty: i32,
    pub points: i32,
    pub image_url: Option<String>,
    pub hint1: Option<String>,
    pub hint2: Option<String>,
    pub hint3: Option<String>,
    pub explanation: Option<String>,
    pub variables: Option<Json<VariableRanges>>,
}

impl Question {
    pub fn hints(&self) -> Vec<String> {
        [&self.hint1, &self.hint2, &self.hint3]
            .into_iter()
            .flatten()
            .filter(|hint| !hint.trim().is_empty())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: i32,
    pub question_id: i32,
    pub content: String,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionWithAnswers {
    #[serde(flatten)]
    pub question: Question,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    /// Present when an existing answer is edited in place.
    pub id: Option<i32>,
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(default)]
    pub is_correct: bool,
    pub explanation: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_new_question"))]
pub struct NewQuestion {
    pub quiz_id: i32,
    #[validate(length(min = 1))]
    pub content: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[validate(range(min = 1, max = 5))]
    pub difficulty: i32,
    #[validate(range(min = 0, max = 100))]
    #[serde(default = "default_points")]
    pub points: i32,
    pub image_url: Option<String>,
    pub hint1: Option<String>,
    pub hint2: Option<String>,
    pub hint3: Option<String>,
    pub explanation: Option<String>,
    pub variables: Option<VariableRanges>,
    #[validate(nested)]
    #[serde(default)]
    pub answers: Vec<AnswerInput>,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_update_question"))]
pub struct UpdateQuestion {
    #[validate(length(min = 1))]
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub question_type: Option<QuestionType>,
    #[validate(range(min = 1, max = 5))]
    pub difficulty: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub points: Option<i32>,
    pub image_url: Option<String>,
    pub hint1: Option<String>,
    pub hint2: Option<String>,
    pub hint3: Option<String>,
    pub explanation: Option<String>,
    pub variables: Option<VariableRanges>,
    /// When present, replaces the full answer set of the question.
    #[validate(nested)]
    pub answers: Option<Vec<AnswerInput>>,
}

fn default_points() -> i32 {
    5
}

fn validate_new_question(question: &NewQuestion) -> Result<(), ValidationError> {
    validate_answer_set(question.question_type, &question.answers)?;
    validate_variable_ranges(question.variables.as_ref())
}

fn validate_update_question(question: &UpdateQuestion) -> Result<(), ValidationError> {
    if let Some(answers) = &question.answers {
        let question_type = question.question_type.unwrap_or(QuestionType::MultipleChoice);
        validate_answer_set(question_type, answers)?;
    }
    validate_variable_ranges(question.variables.as_ref())
}

/// Multiple-choice questions need options and at most one of them may be correct.
pub fn validate_answer_set(
    question_type: QuestionType,
    answers: &[AnswerInput],
) -> Result<(), ValidationError> {
    let correct = answers.iter().filter(|answer| answer.is_correct).count();
    if correct > 1 {
        return Err(ValidationError::new("multiple_correct_answers"));
    }
    if question_type == QuestionType::MultipleChoice && answers.len() < 2 {
        return Err(ValidationError::new("too_few_options"));
    }
    Ok(())
}

fn validate_variable_ranges(variables: Option<&VariableRanges>) -> Result<(), ValidationError> {
    match variables {
        Some(ranges) if ranges.values().any(|range| range.min > range.max) => {
            Err(ValidationError::new("inverted_variable_range"))
        }
        _ => Ok(()),
    }
}

/// A quiz assigned to or attempted by a student, with the student's progress on it.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedQuiz {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub category_id: i32,
    pub subcategory_id: Option<i32>,
    pub difficulty: String,
    pub time_limit: i32,
    pub total_questions: i32,
    pub status: Option<ProgressStatus>,
    pub score: Option<i32>,
    pub progress_id: Option<i32>,
    pub completed_questions: Option<i32>,
    pub time_spent: Option<i32>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    pub reviewed: Option<bool>,
    pub feedback: Option<String>,
}

/// Where a quiz stands for one student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserQuizStatus {
    Completed,
    /// Assigned and not completed yet.
    Pending,
    /// Neither assigned nor completed.
    Optional,
}

impl UserQuizStatus {
    pub fn derive(progress: Option<ProgressStatus>, assigned: bool) -> Self {
        match progress {
            Some(ProgressStatus::Completed) => UserQuizStatus::Completed,
            _ if assigned => UserQuizStatus::Pending,
            _ => UserQuizStatus::Optional,
        }
    }
}

/// Quiz listing row enriched with the viewer's progress.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QuizProgressRow {
    #[sqlx(flatten)]
    pub quiz: Quiz,
    pub progress_status: Option<ProgressStatus>,
    pub assigned: bool,
    pub score: Option<i32>,
    pub time_spent: Option<i32>,
    pub completed_at: Option<OffsetDateTime>,
    pub progress_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizForUser {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub user_status: UserQuizStatus,
    pub score: Option<i32>,
    pub time_spent: Option<i32>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    pub progress_id: Option<i32>,
}

impl From<QuizProgressRow> for QuizForUser {
    fn from(row: QuizProgressRow) -> Self {
        Self {
            user_status: UserQuizStatus::derive(row.progress_status, row.assigned),
            quiz: row.quiz,
            score: row.score,
            time_spent: row.time_spent,
            completed_at: row.completed_at,
            progress_id: row.progress_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAssignment {
    pub user_id: i32,
    pub quiz_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(content: &str, is_correct: bool) -> AnswerInput {
        AnswerInput {
            id: None,
            content: content.to_string(),
            is_correct,
            explanation: None,
        }
    }

    #[test]
    fn quiz_update_distinguishes_null_from_missing_subcategory() {
        let untouched: UpdateQuiz =
            serde_json::from_value(serde_json::json!({"title": "Fracciones"})).unwrap();
        assert_eq!(untouched.subcategory_id, None);

        let detached: UpdateQuiz =
            serde_json::from_value(serde_json::json!({"subcategoryId": null})).unwrap();
        assert_eq!(detached.subcategory_id, Some(None));

        let moved: UpdateQuiz =
            serde_json::from_value(serde_json::json!({"subcategoryId": 7})).unwrap();
        assert_eq!(moved.subcategory_id, Some(Some(7)));
    }

    #[test]
    fn two_correct_options_are_rejected() {
        let answers = vec![option("1", true), option("2", true), option("3", false)];
        let err = validate_answer_set(QuestionType::MultipleChoice, &answers).unwrap_err();
        assert_eq!(err.code, "multiple_correct_answers");
    }

    #[test]
    fn multiple_choice_needs_two_options() {
        let err = validate_answer_set(QuestionType::MultipleChoice, &[option("4", true)])
            .unwrap_err();
        assert_eq!(err.code, "too_few_options");

        assert!(validate_answer_set(QuestionType::Text, &[]).is_ok());
    }

    #[test]
    fn new_question_deserializes_with_default_points() {
        let question: NewQuestion = serde_json::from_value(serde_json::json!({
            "quizId": 4,
            "content": "Solve {a}x + {b} = {c}",
            "type": "equation",
            "difficulty": 2,
            "variables": {"a": {"min": 1, "max": 9}},
            "answers": [
                {"content": "{answer}", "isCorrect": true},
                {"content": "{wrongAnswer1}"}
            ]
        }))
        .unwrap();

        assert_eq!(question.points, 5);
        assert_eq!(question.question_type, QuestionType::Equation);
        assert!(question.validate().is_ok());
    }

    #[test]
    fn inverted_ranges_fail_validation() {
        let question: NewQuestion = serde_json::from_value(serde_json::json!({
            "quizId": 4,
            "content": "{a} + 1",
            "type": "formula",
            "difficulty": 1,
            "variables": {"a": {"min": 9, "max": 1}}
        }))
        .unwrap();

        assert!(question.validate().is_err());
    }

    #[test]
    fn user_status_prefers_completion_over_assignment() {
        assert_eq!(
            UserQuizStatus::derive(Some(ProgressStatus::Completed), true),
            UserQuizStatus::Completed
        );
        assert_eq!(
            UserQuizStatus::derive(Some(ProgressStatus::InProgress), true),
            UserQuizStatus::Pending
        );
        assert_eq!(UserQuizStatus::derive(None, false), UserQuizStatus::Optional);
    }

    #[test]
    fn hints_skip_blank_entries() {
        let question = Question {
            id: 1,
            quiz_id: 1,
            content: "2 + 2".into(),
            question_type: QuestionType::MultipleChoice,
            difficulty: 1,
            points: 5,
            image_url: None,
            hint1: Some("Count".into()),
            hint2: Some("  ".into()),
            hint3: None,
            explanation: None,
            variables: None,
        };
        assert_eq!(question.hints(), vec!["Count".to_string()]);
    }
}
