pub mod handlers;
pub mod routes;

pub use routes::survey_routes;
