//! TrustedBot - a single-page chat assistant
//!
//! Every browser session owns a conversation log that starts with a fixed
//! reasoning prompt. Each submission replays the whole log to an
//! OpenAI-compatible completion endpoint.

mod api;
mod config;
mod llm;
mod runtime;
mod state_machine;
mod system_prompt;
mod transcript;

use api::{create_router, AppState};
use config::AppConfig;
use llm::{LlmService, LoggingService, OpenAIService};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine; the variables may come from the environment
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trustedbot=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = AppConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;

    // Completion client
    let openai: Arc<dyn LlmService> = Arc::new(OpenAIService::new(&config.llm)?);
    let llm_client: Arc<dyn LlmService> = Arc::new(LoggingService::new(openai));
    tracing::info!(
        model = %llm_client.model_id(),
        base_url = %config.llm.base_url,
        temperature = config.llm.temperature,
        "Completion client initialized"
    );

    // Create application state
    let state = AppState::new(llm_client);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("TrustedBot server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
