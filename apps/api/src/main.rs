mod cli;
mod config;
mod errors;
mod extract;
mod generation;
mod llm_client;
mod models;
mod routes;
mod state;
mod store;
mod templates;

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Cli, Command};
use crate::config::Config;
use crate::llm_client::GeminiClient;
use crate::routes::build_router;
use crate::state::AppState;
use crate::templates::TemplateStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        None => serve(config).await,
        Some(Command::Serve { port }) => {
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await
        }
        Some(command) => cli::handle_command(command, config).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    let templates = TemplateStore::load(config.template_dir.as_deref());

    let generator = GeminiClient::new(&config)?;
    info!("Generation client initialized (model: {})", config.genai_model);

    let state = AppState::new(config.clone(), Arc::new(generator), templates);
    if state.mock_mode() {
        info!("GENAI_API_KEY not set; requests without their own key get mock output");
    }
    if config.passcode.is_none() {
        warn!("APP_PASSCODE not set; the API is open to anyone who can reach it");
    }

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
