//! Quiz-taking domain: grading, the count-down timer, the per-attempt state
//! machine, answer shuffling, variable substitution and the survey heuristic.
//!
//! Nothing in here touches the database or HTTP.

pub mod grading;
pub mod prediction;
pub mod session;
pub mod shuffle;
pub mod timer;
pub mod variables;

pub use grading::{grade, public_grade, GradedQuestion, QuizResult, RecordedAnswer};
pub use session::{QuizSession, Selection, SessionError, SessionState, SessionView, StoredPick};
pub use shuffle::{prepare_attempt, shuffle_answers};
pub use timer::{Clock, QuizTimer, SystemClock, DEFAULT_TIME_LIMIT_SECS};
pub use variables::{instantiate, AnswerInstance, QuestionInstance, VariableRange};
