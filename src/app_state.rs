use sqlx::PgPool;
use std::sync::Arc;

use crate::config;
use crate::feedback::FeedbackClient;
use crate::sessions::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub env: config::Config,
    pub sessions: SessionRegistry,
    /// `None` when no feedback API key is configured.
    pub feedback: Option<Arc<dyn FeedbackClient>>,
}

impl AppState {
    pub fn new(
        db: PgPool,
        env: config::Config,
        feedback: Option<Arc<dyn FeedbackClient>>,
    ) -> Self {
        Self {
            db,
            env,
            sessions: SessionRegistry::new(),
            feedback,
        }
    }
}
