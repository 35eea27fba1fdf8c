use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::{Answer, Question, QuestionType};

/// Inclusive integer range a placeholder is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRange {
    pub min: i64,
    pub max: i64,
}

impl VariableRange {
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        if self.min >= self.max {
            return self.min;
        }
        rng.random_range(self.min..=self.max)
    }
}

/// A question as shown to one student, placeholders already filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionInstance {
    pub id: i32,
    pub quiz_id: i32,
    pub content: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub difficulty: i32,
    pub points: i32,
    pub image_url: Option<String>,
    pub hints: Vec<String>,
    pub explanation: Option<String>,
    pub answers: Vec<AnswerInstance>,
    /// Drawn values, recorded with the student's answer.
    pub variables: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInstance {
    pub id: i32,
    pub content: String,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

/// Draws a value for every declared variable and substitutes `{name}`
/// placeholders in the question and its answers.
///
/// Equation questions (`a·x + b = c`) additionally compute `{answer}` on the
/// correct option. Wrong options may use `{wrongAnswer1}` (correct plus 1 or
/// 2), `{wrongAnswer2}` (`(c + b) / a`) and `{wrongAnswer3}` (`|(b - c) / a|`).
pub fn instantiate<R: Rng + ?Sized>(
    question: &Question,
    answers: &[Answer],
    rng: &mut R,
) -> QuestionInstance {
    let values: BTreeMap<String, i64> = question
        .variables
        .as_ref()
        .map(|ranges| {
            ranges
                .iter()
                .map(|(name, range)| (name.clone(), range.draw(rng)))
                .collect()
        })
        .unwrap_or_default();

    let has_variables = question.variables.is_some();
    let equation = Equation::from_values(&values);

    let answers = answers
        .iter()
        .map(|answer| {
            let mut content = answer.content.clone();
            let mut explanation = answer.explanation.clone();

            if has_variables {
                if answer.is_correct && question.question_type == QuestionType::Equation {
                    content = content.replacen("{answer}", &format_number(equation.solution()), 1);
                }
                if !answer.is_correct {
                    content = fill_wrong_answers(content, &equation, rng);
                }
                content = substitute(&content, &values);
                explanation = explanation.map(|text| substitute(&text, &values));
            }

            AnswerInstance {
                id: answer.id,
                content,
                is_correct: answer.is_correct,
                explanation,
            }
        })
        .collect();

    QuestionInstance {
        id: question.id,
        quiz_id: question.quiz_id,
        content: substitute(&question.content, &values),
        question_type: question.question_type,
        difficulty: question.difficulty,
        points: question.points,
        image_url: question.image_url.clone(),
        hints: question
            .hints()
            .into_iter()
            .map(|hint| substitute(&hint, &values))
            .collect(),
        explanation: question
            .explanation
            .as_ref()
            .map(|text| substitute(text, &values)),
        answers,
        variables: values,
    }
}

/// Coefficients of `a·x + b = c`. A missing or zero `a` counts as 1.
#[derive(Debug, Clone, Copy)]
struct Equation {
    a: f64,
    b: f64,
    c: f64,
}

impl Equation {
    fn from_values(values: &BTreeMap<String, i64>) -> Self {
        let coefficient = |name: &str| values.get(name).copied().unwrap_or(0) as f64;
        let a = coefficient("a");
        Self {
            a: if a == 0.0 { 1.0 } else { a },
            b: coefficient("b"),
            c: coefficient("c"),
        }
    }

    fn solution(&self) -> f64 {
        (self.c - self.b) / self.a
    }
}

fn fill_wrong_answers<R: Rng + ?Sized>(mut content: String, eq: &Equation, rng: &mut R) -> String {
    if content.contains("{wrongAnswer1}") {
        let offset = if rng.random_bool(0.5) { 1.0 } else { 2.0 };
        content = content.replacen("{wrongAnswer1}", &format_number(eq.solution() + offset), 1);
    }
    if content.contains("{wrongAnswer2}") {
        let value = (eq.c + eq.b) / eq.a;
        content = content.replacen("{wrongAnswer2}", &format_number(value), 1);
    }
    if content.contains("{wrongAnswer3}") {
        let value = ((eq.b - eq.c) / eq.a).abs();
        content = content.replacen("{wrongAnswer3}", &format_number(value), 1);
    }
    content
}

fn substitute(text: &str, values: &BTreeMap<String, i64>) -> String {
    values.iter().fold(text.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{name}}}"), &value.to_string())
    })
}

fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use sqlx::types::Json;

    fn equation_question(ranges: &[(&str, i64, i64)]) -> Question {
        Question {
            id: 11,
            quiz_id: 2,
            content: "Solve {a}x + {b} = {c}".into(),
            question_type: QuestionType::Equation,
            difficulty: 2,
            points: 5,
            image_url: None,
            hint1: Some("Move {b} to the right".into()),
            hint2: None,
            hint3: None,
            explanation: None,
            variables: Some(Json(
                ranges
                    .iter()
                    .map(|(name, min, max)| {
                        (name.to_string(), VariableRange { min: *min, max: *max })
                    })
                    .collect(),
            )),
        }
    }

    fn option(id: i32, content: &str, is_correct: bool) -> Answer {
        Answer {
            id,
            question_id: 11,
            content: content.into(),
            is_correct,
            explanation: Some("x = ({c} - {b}) / {a}".into()),
        }
    }

    #[test]
    fn fixed_ranges_produce_known_answers() {
        let question = equation_question(&[("a", 2, 2), ("b", 3, 3), ("c", 11, 11)]);
        let answers = [
            option(1, "x = {answer}", true),
            option(2, "x = {wrongAnswer2}", false),
            option(3, "x = {wrongAnswer3}", false),
        ];

        let instance = instantiate(&question, &answers, &mut StdRng::seed_from_u64(3));

        assert_eq!(instance.content, "Solve 2x + 3 = 11");
        assert_eq!(instance.hints, vec!["Move 3 to the right".to_string()]);
        assert_eq!(instance.answers[0].content, "x = 4");
        assert_eq!(instance.answers[1].content, "x = 7");
        assert_eq!(instance.answers[2].content, "x = 4");
        assert_eq!(
            instance.answers[0].explanation.as_deref(),
            Some("x = (11 - 3) / 2")
        );
        assert_eq!(instance.variables.get("a"), Some(&2));
    }

    #[test]
    fn first_wrong_answer_is_one_or_two_above() {
        let question = equation_question(&[("a", 1, 1), ("b", 0, 0), ("c", 5, 5)]);
        let answers = [option(1, "{wrongAnswer1}", false)];

        for seed in 0..20 {
            let instance = instantiate(&question, &answers, &mut StdRng::seed_from_u64(seed));
            let content = instance.answers[0].content.as_str();
            assert!(content == "6" || content == "7", "unexpected {content}");
        }
    }

    #[test]
    fn fractional_solutions_keep_decimals() {
        let question = equation_question(&[("a", 4, 4), ("b", 0, 0), ("c", 2, 2)]);
        let instance = instantiate(
            &question,
            &[option(1, "{answer}", true)],
            &mut StdRng::seed_from_u64(0),
        );
        assert_eq!(instance.answers[0].content, "0.5");
    }

    #[test]
    fn drawn_values_stay_in_range() {
        let question = equation_question(&[("a", 1, 9), ("b", -5, 5), ("c", 10, 20)]);
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..50 {
            let instance = instantiate(&question, &[], &mut rng);
            let a = instance.variables["a"];
            let b = instance.variables["b"];
            let c = instance.variables["c"];
            assert!((1..=9).contains(&a));
            assert!((-5..=5).contains(&b));
            assert!((10..=20).contains(&c));
        }
    }

    #[test]
    fn questions_without_variables_pass_through() {
        let mut question = equation_question(&[]);
        question.variables = None;
        question.content = "What is {x}?".into();
        let instance = instantiate(
            &question,
            &[option(1, "{answer}", true)],
            &mut StdRng::seed_from_u64(0),
        );
        assert_eq!(instance.content, "What is {x}?");
        assert_eq!(instance.answers[0].content, "{answer}");
    }
}
