pub mod catalog;
pub mod grading;
pub mod users;
