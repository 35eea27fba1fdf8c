use anyhow::Context;
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{info, warn};

use alanmath_backend::{
    app::create_router,
    app_state::AppState,
    config,
    db,
    feedback::{ChatCompletionsClient, FeedbackClient},
    sessions::spawn_sweeper,
    telemetry::init_telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let telemetry = init_telemetry(None)
        .await
        .context("Failed to initialize telemetry")?;

    let config = config::init().context("Failed to load configuration")?;
    let pool = db::init_pool(config).await?;

    let feedback: Option<Arc<dyn FeedbackClient>> = match &config.feedback {
        Some(feedback_config) => {
            let client = ChatCompletionsClient::new(feedback_config)
                .context("Failed to build feedback client")?;
            info!(model = %feedback_config.model, "AI feedback enabled");
            Some(Arc::new(client))
        }
        None => {
            warn!("FEEDBACK_API_KEY not set, AI feedback disabled");
            None
        }
    };

    let state = AppState::new(pool, config.clone(), feedback);
    let sweeper = spawn_sweeper(state.clone());
    let app = create_router(state);

    let addr = config.server_addr();
    info!("{} listening on {}", config.app.name, addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Failed to serve application")?;

    sweeper.abort();
    telemetry.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
