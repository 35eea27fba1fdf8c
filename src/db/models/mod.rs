mod auth_session;
mod category;
mod progress;
mod quiz;
mod submission;
mod user;

pub use auth_session::*;
pub use category::*;
pub use progress::*;
pub use quiz::*;
pub use submission::*;
pub use user::*;
