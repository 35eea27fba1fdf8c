pub mod handlers;
pub mod routes;

pub use routes::quiz_session_routes;
