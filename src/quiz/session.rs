use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

use super::grading::{grade, GradedQuestion, QuizResult, RecordedAnswer};
use super::timer::{Clock, QuizTimer, SystemClock};
use super::variables::QuestionInstance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionState {
    Loading,
    PresentingQuestion { index: usize },
    ShowingFeedback { index: usize, correct: bool },
    Completed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("quiz has no questions")]
    NoQuestions,

    #[error("question {question_id} was already answered")]
    AlreadyAnswered { question_id: i32 },

    #[error("answer {answer_id} does not belong to the current question")]
    UnknownAnswer { answer_id: i32 },

    #[error("invalid transition: {0}")]
    InvalidTransition(&'static str),

    #[error("quiz is already finished")]
    Finished,
}

/// The option a student picked for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub question_id: i32,
    pub answer_id: i32,
    pub is_correct: bool,
    /// Seconds between the question being shown and the pick.
    pub time_spent: u64,
}

/// An answer stored by an earlier visit to the same attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredPick {
    pub question_id: i32,
    pub answer_id: i32,
    pub time_spent: u64,
}

/// One attempt at a quiz.
///
/// Questions are walked linearly. Each question takes exactly one answer,
/// and moving back never unlocks it. The session completes after the last
/// question, on `finish`, or when `check_timer` finds the time limit spent.
#[derive(Debug)]
pub struct QuizSession<C: Clock = SystemClock> {
    questions: Vec<QuestionInstance>,
    selections: HashMap<i32, Selection>,
    state: SessionState,
    timer: QuizTimer<C>,
    shown_at_secs: u64,
    result: Option<QuizResult>,
}

impl<C: Clock> QuizSession<C> {
    pub fn new(timer: QuizTimer<C>) -> Self {
        Self {
            questions: Vec::new(),
            selections: HashMap::new(),
            state: SessionState::Loading,
            timer,
            shown_at_secs: 0,
            result: None,
        }
    }

    pub fn load(&mut self, questions: Vec<QuestionInstance>) -> Result<(), SessionError> {
        if self.state != SessionState::Loading {
            return Err(SessionError::InvalidTransition("questions already loaded"));
        }
        if questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }
        self.questions = questions;
        self.timer.start();
        self.present(0);
        Ok(())
    }

    /// Continues a stored attempt at question `completed_questions` with
    /// `time_spent_secs` already on the clock. Stored picks come back locked;
    /// their correctness is judged against the loaded questions, and picks
    /// whose question or option no longer exists are dropped.
    pub fn resume(
        &mut self,
        completed_questions: usize,
        time_spent_secs: u64,
        picks: &[StoredPick],
    ) -> Result<(), SessionError> {
        if self.state != (SessionState::PresentingQuestion { index: 0 }) || !self.selections.is_empty() {
            return Err(SessionError::InvalidTransition("resume only applies to a fresh session"));
        }
        for pick in picks {
            let Some(answer) = self
                .questions
                .iter()
                .find(|question| question.id == pick.question_id)
                .and_then(|question| question.answers.iter().find(|a| a.id == pick.answer_id))
            else {
                continue;
            };
            self.selections.insert(
                pick.question_id,
                Selection {
                    question_id: pick.question_id,
                    answer_id: pick.answer_id,
                    is_correct: answer.is_correct,
                    time_spent: pick.time_spent,
                },
            );
        }
        self.timer.resume_from(time_spent_secs);
        let index = completed_questions.min(self.questions.len() - 1);
        self.present(index);
        Ok(())
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state == SessionState::Completed
    }

    pub fn current_index(&self) -> Option<usize> {
        match self.state {
            SessionState::PresentingQuestion { index }
            | SessionState::ShowingFeedback { index, .. } => Some(index),
            SessionState::Loading | SessionState::Completed => None,
        }
    }

    pub fn current_question(&self) -> Option<&QuestionInstance> {
        self.current_index().and_then(|index| self.questions.get(index))
    }

    pub fn questions(&self) -> &[QuestionInstance] {
        &self.questions
    }

    pub fn timer(&self) -> &QuizTimer<C> {
        &self.timer
    }

    /// Records the pick for the current question and reports whether it was correct.
    pub fn select_answer(&mut self, answer_id: i32) -> Result<bool, SessionError> {
        if self.check_timer() {
            return Err(SessionError::Finished);
        }

        let index = match self.state {
            SessionState::PresentingQuestion { index } => index,
            SessionState::ShowingFeedback { index, .. } => {
                return Err(SessionError::AlreadyAnswered {
                    question_id: self.questions[index].id,
                })
            }
            SessionState::Completed => return Err(SessionError::Finished),
            SessionState::Loading => {
                return Err(SessionError::InvalidTransition("no question is shown"))
            }
        };

        let question = &self.questions[index];
        if self.selections.contains_key(&question.id) {
            return Err(SessionError::AlreadyAnswered {
                question_id: question.id,
            });
        }

        let answer = question
            .answers
            .iter()
            .find(|answer| answer.id == answer_id)
            .ok_or(SessionError::UnknownAnswer { answer_id })?;

        let selection = Selection {
            question_id: question.id,
            answer_id,
            is_correct: answer.is_correct,
            time_spent: self.timer.elapsed_secs().saturating_sub(self.shown_at_secs),
        };
        self.selections.insert(question.id, selection);
        self.state = SessionState::ShowingFeedback {
            index,
            correct: selection.is_correct,
        };

        Ok(selection.is_correct)
    }

    /// Advances to the next question, completing the attempt after the last one.
    pub fn next(&mut self) -> Result<SessionState, SessionError> {
        if self.check_timer() {
            return Ok(self.state);
        }
        let index = self.navigable_index()?;
        if index + 1 < self.questions.len() {
            self.present(index + 1);
        } else {
            self.complete();
        }
        Ok(self.state)
    }

    pub fn previous(&mut self) -> Result<SessionState, SessionError> {
        if self.check_timer() {
            return Ok(self.state);
        }
        let index = self.navigable_index()?;
        if index == 0 {
            return Err(SessionError::InvalidTransition("already at the first question"));
        }
        self.present(index - 1);
        Ok(self.state)
    }

    /// Completes the attempt when the time limit is spent. Returns whether
    /// that happened on this call.
    pub fn check_timer(&mut self) -> bool {
        if matches!(self.state, SessionState::Loading | SessionState::Completed) {
            return false;
        }
        if self.timer.is_expired() {
            self.complete();
            return true;
        }
        false
    }

    /// Completes the attempt if needed and returns its result.
    pub fn finish(&mut self) -> Result<QuizResult, SessionError> {
        if self.state == SessionState::Loading {
            return Err(SessionError::InvalidTransition("nothing to finish"));
        }
        if !self.is_completed() {
            self.complete();
        }
        self.result
            .ok_or(SessionError::InvalidTransition("completed without a result"))
    }

    pub fn result(&self) -> Option<&QuizResult> {
        self.result.as_ref()
    }

    /// Picks made so far, in question order.
    pub fn selections(&self) -> Vec<Selection> {
        self.questions
            .iter()
            .filter_map(|question| self.selections.get(&question.id).copied())
            .collect()
    }

    /// Points earned so far.
    pub fn running_score(&self) -> i32 {
        self.questions
            .iter()
            .filter(|q| self.selections.get(&q.id).is_some_and(|s| s.is_correct))
            .map(|q| q.points)
            .sum()
    }

    pub fn view(&self) -> SessionView {
        let question = self.current_question().map(|question| {
            let selection = self.selections.get(&question.id);
            QuestionView {
                id: question.id,
                content: question.content.clone(),
                question_type: question.question_type,
                points: question.points,
                image_url: question.image_url.clone(),
                hints: question.hints.clone(),
                answers: question
                    .answers
                    .iter()
                    .map(|answer| OptionView {
                        id: answer.id,
                        content: answer.content.clone(),
                        is_correct: selection.map(|_| answer.is_correct),
                    })
                    .collect(),
                selected_answer_id: selection.map(|s| s.answer_id),
                correct: selection.map(|s| s.is_correct),
                explanation: selection.and(question.explanation.clone()),
            }
        });

        SessionView {
            state: self.state,
            current_index: self.current_index(),
            total_questions: self.questions.len(),
            answered: self.selections.len(),
            running_score: self.running_score(),
            remaining_secs: self.timer.remaining_secs(),
            remaining: self.timer.formatted(),
            question,
            result: self.result,
        }
    }

    fn navigable_index(&self) -> Result<usize, SessionError> {
        match self.state {
            SessionState::PresentingQuestion { index }
            | SessionState::ShowingFeedback { index, .. } => Ok(index),
            SessionState::Completed => Err(SessionError::Finished),
            SessionState::Loading => Err(SessionError::InvalidTransition("no question is shown")),
        }
    }

    fn present(&mut self, index: usize) {
        let question_id = self.questions[index].id;
        self.state = match self.selections.get(&question_id) {
            Some(selection) => SessionState::ShowingFeedback {
                index,
                correct: selection.is_correct,
            },
            None => SessionState::PresentingQuestion { index },
        };
        self.shown_at_secs = self.timer.elapsed_secs();
    }

    fn complete(&mut self) {
        self.timer.pause();
        let questions: Vec<GradedQuestion> = self
            .questions
            .iter()
            .map(|q| GradedQuestion {
                question_id: q.id,
                points: q.points,
            })
            .collect();
        let answers: Vec<RecordedAnswer> = self
            .selections
            .values()
            .map(|s| RecordedAnswer {
                question_id: s.question_id,
                is_correct: s.is_correct,
            })
            .collect();
        self.result = Some(grade(&questions, &answers));
        self.state = SessionState::Completed;
    }
}

/// Client-facing snapshot. Correctness of options stays hidden until the
/// question is answered.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub state: SessionState,
    pub current_index: Option<usize>,
    pub total_questions: usize,
    pub answered: usize,
    pub running_score: i32,
    pub remaining_secs: u64,
    pub remaining: String,
    pub question: Option<QuestionView>,
    pub result: Option<QuizResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: i32,
    pub content: String,
    #[serde(rename = "type")]
    pub question_type: crate::db::QuestionType,
    pub points: i32,
    pub image_url: Option<String>,
    pub hints: Vec<String>,
    pub answers: Vec<OptionView>,
    pub selected_answer_id: Option<i32>,
    pub correct: Option<bool>,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionView {
    pub id: i32,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}
