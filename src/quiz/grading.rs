use serde::Serialize;
use std::collections::HashMap;

/// Scoring weight of one question in an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradedQuestion {
    pub question_id: i32,
    pub points: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedAnswer {
    pub question_id: i32,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    /// Points earned.
    pub score: i32,
    pub total_points: i32,
    pub percentage: i32,
    /// 0..10, the value stored on the progress row.
    pub grade: i32,
    pub correct_answers: usize,
    pub total_questions: usize,
}

/// Sums the points of correctly answered questions.
///
/// Answers for questions outside `questions` are ignored, and a question with
/// several recorded answers counts once using the last one.
pub fn grade(questions: &[GradedQuestion], answers: &[RecordedAnswer]) -> QuizResult {
    let by_question: HashMap<i32, bool> = answers
        .iter()
        .map(|answer| (answer.question_id, answer.is_correct))
        .collect();

    let total_points: i32 = questions.iter().map(|q| q.points).sum();
    let (score, correct_answers) = questions
        .iter()
        .filter(|q| by_question.get(&q.question_id).copied().unwrap_or(false))
        .fold((0, 0), |(score, count), q| (score + q.points, count + 1));

    QuizResult {
        score,
        total_points,
        percentage: scaled(score, total_points, 100.0),
        grade: scaled(score, total_points, 10.0),
        correct_answers,
        total_questions: questions.len(),
    }
}

/// Grade of an anonymous attempt at a public quiz: unweighted and unrounded.
pub fn public_grade(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    correct as f64 / total as f64 * 10.0
}

fn scaled(score: i32, total: i32, scale: f64) -> i32 {
    if total <= 0 {
        return 0;
    }
    (f64::from(score) / f64::from(total) * scale).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(question_id: i32, points: i32) -> GradedQuestion {
        GradedQuestion {
            question_id,
            points,
        }
    }

    fn answer(question_id: i32, is_correct: bool) -> RecordedAnswer {
        RecordedAnswer {
            question_id,
            is_correct,
        }
    }

    #[test]
    fn score_is_sum_of_correct_points() {
        let questions = [question(1, 5), question(2, 3), question(3, 2)];
        let answers = [answer(1, true), answer(2, false), answer(3, true)];

        let result = grade(&questions, &answers);
        assert_eq!(result.score, 7);
        assert_eq!(result.total_points, 10);
        assert_eq!(result.percentage, 70);
        assert_eq!(result.grade, 7);
        assert_eq!(result.correct_answers, 2);
        assert_eq!(result.total_questions, 3);
    }

    #[test]
    fn percentage_rounds_half_up() {
        // 5 of 8 points = 62.5%
        let questions = [question(1, 5), question(2, 3)];
        let result = grade(&questions, &[answer(1, true)]);
        assert_eq!(result.percentage, 63);
        assert_eq!(result.grade, 6);
    }

    #[test]
    fn unanswered_questions_score_nothing() {
        let questions = [question(1, 5), question(2, 5)];
        let result = grade(&questions, &[]);
        assert_eq!(result.score, 0);
        assert_eq!(result.percentage, 0);
    }

    #[test]
    fn zero_point_quiz_does_not_divide_by_zero() {
        let result = grade(&[question(1, 0)], &[answer(1, true)]);
        assert_eq!(result.percentage, 0);
        assert_eq!(result.grade, 0);
    }

    #[test]
    fn public_grade_is_unweighted() {
        assert!((public_grade(2, 3) - 6.666_666).abs() < 1e-3);
        assert_eq!(public_grade(0, 0), 0.0);
    }
}
