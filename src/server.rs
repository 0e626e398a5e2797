use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::config::constants::SERVER_REQUEST_TIMEOUT;
use crate::config::{Config, Voice};
use crate::dispatcher::{DispatchStats, Dispatcher};
use crate::error::{Result, TtsError};
use crate::models::{ConvertRequest, ConvertResponse, HealthResponse, VoiceInfo, VoicesResponse};
use crate::session::{RunReport, Session};
use crate::synthesis::{HttpSynthesizer, Synthesizer};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub synthesizer: Arc<dyn Synthesizer>,
    /// One dispatcher for every request, so `max_workers` bounds the whole server
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let synthesizer = Arc::new(HttpSynthesizer::new(&config)?);
        Self::with_synthesizer(config, synthesizer)
    }

    pub fn with_synthesizer(config: Config, synthesizer: Arc<dyn Synthesizer>) -> Result<Self> {
        let dispatcher = Arc::new(Dispatcher::new(config.max_workers)?);
        Ok(Self {
            config: Arc::new(config),
            synthesizer,
            dispatcher,
        })
    }

    fn session(&self) -> Result<Session> {
        Session::with_dispatcher(
            (*self.config).clone(),
            self.synthesizer.clone(),
            self.dispatcher.clone(),
        )
    }

    async fn run(&self, req: &ConvertRequest) -> Result<RunReport> {
        let voice = req.validate(self.config.voice)?;
        tracing::debug!(
            "Convert request - text_len={}, voice='{}'",
            req.text.chars().count(),
            voice
        );

        let report = self.session()?.synthesize(&req.text, voice).await?;

        // Nothing playable at all is an upstream failure, not a partial result
        if report.sequence.succeeded() == 0 {
            if let Err(failure) = report.report() {
                return Err(TtsError::Aggregate(failure));
            }
        }
        Ok(report)
    }
}

// HTTP Handlers

/// Convert text and return every chunk as base64, failures listed alongside
async fn convert(
    State(state): State<AppState>,
    Json(req): Json<ConvertRequest>,
) -> Result<Json<ConvertResponse>> {
    let report = state.run(&req).await?;
    Ok(Json(ConvertResponse::from_report(
        &report,
        state.config.response_format,
    )))
}

/// Convert text and return the joined audio; any failed chunk fails the request
async fn convert_audio(
    State(state): State<AppState>,
    Json(req): Json<ConvertRequest>,
) -> Result<Response> {
    let report = state.run(&req).await?;
    report.report()?;

    let format = state.config.response_format;
    let audio = report.sequence.concatenate(format)?;

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"speech.{}\"", format.extension()),
            ),
        ],
        audio,
    )
        .into_response())
}

/// List all available voices
async fn list_voices(State(state): State<AppState>) -> Json<VoicesResponse> {
    Json(VoicesResponse {
        voices: Voice::all().into_iter().map(VoiceInfo::from).collect(),
        default: state.config.voice.to_string(),
    })
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Dispatcher statistics endpoint
async fn dispatch_stats(State(state): State<AppState>) -> Json<DispatchStats> {
    Json(state.dispatcher.stats())
}

/// Create and configure the HTTP server router
pub fn create_router(state: AppState) -> Router<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/convert", post(convert))
        .route("/api/convert/audio", post(convert_audio))
        .route("/voices", get(list_voices))
        .route("/health", get(health_check))
        .route("/stats", get(dispatch_stats))
        .with_state(state)
        .layer(TimeoutLayer::new(SERVER_REQUEST_TIMEOUT))
        .layer(cors)
}
