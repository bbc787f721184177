//! Role chat HTTP server library logic.

pub mod api;
pub mod api_chat;
pub mod api_roles;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use config::{ChatConfig, Config};
use rolechat_persona::{PromptComposer, RoleCatalog};
use rolechat_relay::{RelayError, StreamRelay};
use rolechat_voice::{SttService, TtsService, VoiceError};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Built-in personas.
    pub catalog: Arc<RoleCatalog>,
    /// Guideline rules applied to every persona.
    pub composer: PromptComposer,
    /// Upstream chat-completion relay (owns the pooled HTTP client).
    pub relay: Arc<StreamRelay>,
    /// Speech recognition backend.
    pub stt: Arc<SttService>,
    /// Speech synthesis backend.
    pub tts: Arc<TtsService>,
    /// Per-stream limits.
    pub chat: ChatConfig,
}

/// Errors raised while wiring the services together at startup.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to initialize chat relay: {0}")]
    Relay(#[from] RelayError),
    #[error("failed to initialize voice services: {0}")]
    Voice(#[from] VoiceError),
}

impl AppState {
    /// Builds every service from configuration.
    pub fn from_config(config: &Config) -> Result<Self, InitError> {
        let relay = StreamRelay::new(config.llm.clone())?;
        let stt = SttService::from_config(&config.asr);
        let tts = TtsService::from_config(&config.tts)?;

        tracing::info!(
            llm_url = relay.completions_url(),
            model = %config.llm.model,
            asr = ?stt.provider(),
            tts = ?tts.provider(),
            "services initialized"
        );

        Ok(Self {
            catalog: Arc::new(RoleCatalog::builtin()),
            composer: PromptComposer,
            relay: Arc::new(relay),
            stt: Arc::new(stt),
            tts: Arc::new(tts),
            chat: config.chat.clone(),
        })
    }
}

/// Maximum request body size (16 MiB). Base64 audio uploads are the largest payloads.
const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
///
/// When `static_dir` holds an `index.html`, unmatched paths are served
/// from it so the browser client can be hosted alongside the API.
pub fn app(state: AppState, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route(
            "/api/roles/search",
            get(api_roles::search_roles_handler),
        )
        .route(
            "/api/chat/stream",
            post(api_chat::chat_stream_handler),
        )
        .route("/api/chat/asr", post(api_chat::asr_handler))
        .route("/api/chat/tts", post(api_chat::tts_handler));

    let router = match static_dir {
        Some(dir) if dir.join("index.html").exists() => {
            tracing::info!(path = %dir.display(), "serving client static files");
            router.fallback_service(
                ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
            )
        }
        Some(dir) => {
            tracing::warn!(path = %dir.display(), "static directory has no index.html, skipping static file serving");
            router
        }
        None => router,
    };

    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
