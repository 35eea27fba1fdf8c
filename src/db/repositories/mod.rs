mod auth_session_repository;
mod category_repository;
mod progress_repository;
mod quiz_repository;
mod submission_repository;
mod user_repository;

pub use auth_session_repository::AuthSessionRepository;
pub use category_repository::CategoryRepository;
pub use progress_repository::ProgressRepository;
pub use quiz_repository::QuizRepository;
pub use submission_repository::SubmissionRepository;
pub use user_repository::UserRepository;
