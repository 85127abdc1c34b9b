//! SOP Creator Server
//!
//! Serves the SOP Creator form over HTTP. Each browser session gets its own
//! form state; the server provides REST endpoints for:
//!
//! - Editing the seven SOP fields
//! - Requesting, accepting and declining an AI-drafted Actions section
//! - Generating the SOP from the DOCX template and downloading it
//!
//! ## Configuration
//!
//! - `PERPLEXITY_API_KEY` enables AI suggestions (read from the environment
//!   or `.env`). Without it the server still runs and suggestion requests
//!   fail with a configuration error.
//! - `SOP_COMPLETION_BASE_URL` / `SOP_COMPLETION_MODEL` override the
//!   completion endpoint and model.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, patch, post},
    Router,
};
use clap::Parser;
use sop_engine::{CompletionClient, SuggestionService, TemplateSource, WorkflowController};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;
mod state;

use api::{
    handle_accept_suggestion, handle_create_session, handle_decline_suggestion,
    handle_delete_session, handle_download_document, handle_form, handle_generate_document,
    handle_get_session, handle_health, handle_request_suggestion, handle_update_fields,
};
use state::AppState;

/// Command-line arguments for the SOP server
#[derive(Parser, Debug)]
#[command(name = "sop-server")]
#[command(about = "SOP Creator server for DOCX generation with AI-drafted actions")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// DOCX template with {{KEY}} placeholders
    #[arg(short, long, default_value = "assets/TEMPLATE.docx")]
    template: PathBuf,

    /// Drop sessions idle for this many seconds
    #[arg(long, env = "SOP_SESSION_TTL_SECS", default_value_t = state::DEFAULT_SESSION_TTL.as_secs())]
    session_ttl_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Build the API router around `state`
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handle_health))
        // Form layout
        .route("/api/form", get(handle_form))
        // Sessions
        .route("/api/sessions", post(handle_create_session))
        .route(
            "/api/sessions/:id",
            get(handle_get_session).delete(handle_delete_session),
        )
        .route("/api/sessions/:id/fields", patch(handle_update_fields))
        // Suggestions
        .route("/api/sessions/:id/suggestion", post(handle_request_suggestion))
        .route(
            "/api/sessions/:id/suggestion/accept",
            post(handle_accept_suggestion),
        )
        .route(
            "/api/sessions/:id/suggestion/decline",
            post(handle_decline_suggestion),
        )
        // Documents
        .route(
            "/api/sessions/:id/document",
            post(handle_generate_document).get(handle_download_document),
        )
        // Apply middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn suggestion_service() -> Option<Arc<dyn SuggestionService>> {
    match CompletionClient::from_env() {
        Ok(client) => {
            info!("AI suggestions enabled (model {})", client.model());
            let service: Arc<dyn SuggestionService> = Arc::new(client);
            Some(service)
        }
        Err(e) => {
            warn!("AI suggestions disabled: {}", e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting SOP server on {}:{}", args.host, args.port);

    if !args.template.is_file() {
        warn!(
            "Template {} not found; document generation will fail until it exists",
            args.template.display()
        );
    }

    let workflow = WorkflowController::new(
        suggestion_service(),
        TemplateSource::File(args.template.clone()),
    );
    let state = AppState::new(workflow);

    let ttl = Duration::from_secs(args.session_ttl_secs.max(1));
    let sweep = (ttl / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));
    let _eviction = state.sessions.spawn_eviction_loop(ttl, sweep);
    info!("Idle sessions expire after {:?}", ttl);

    let app = build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Template: {}", args.template.display());

    axum::serve(listener, app).await?;

    Ok(())
}
