//! dblplink-api - HTTP API server for DBLP entity linking

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use dblplink_core::{defaults, CandidateRetriever, SpanDetector};
use dblplink_graph::SparqlNeighborhoodFetcher;
use dblplink_inference::{
    CandleLogitsBackend, HfTokenizer, LlmSpanDetector, ModelFiles, OllamaBackend, ScorerConfig,
    YesScorer,
};
use dblplink_search::{ElasticCandidateRetriever, SpanReranker};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Shared, read-only pipeline components.
#[derive(Clone)]
struct AppState {
    span_detector: Arc<dyn SpanDetector>,
    retriever: Arc<dyn CandidateRetriever>,
    reranker: Arc<SpanReranker>,
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/get_spans", post(handlers::get_spans))
        .route("/get_candidates", post(handlers::get_candidates))
        .route("/get_final_result", post(handlers::get_final_result))
        .route("/link_entities", post(handlers::link_entities))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
                .max_age(std::time::Duration::from_secs(3600)),
        )
        .layer(RequestBodyLimitLayer::new(defaults::MAX_BODY_SIZE_BYTES))
        .with_state(state)
}

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "dblplink_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "dblplink_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("dblplink-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let _file_guard = init_tracing();

    // Graph neighborhoods
    let fetcher = SparqlNeighborhoodFetcher::from_env()?;

    // Scoring model: tokenizer and weights are loaded once and shared
    let scorer_config = ScorerConfig::from_env();
    let (tokenizer, logits) = {
        let config = scorer_config.clone();
        tokio::task::spawn_blocking(move || -> dblplink_core::Result<_> {
            let files = ModelFiles::resolve(&config)?;
            let tokenizer = HfTokenizer::from_file(&files.tokenizer, &config.pad_token)?;
            let logits = CandleLogitsBackend::from_config(&config, &files)?;
            Ok((tokenizer, logits))
        })
        .await??
    };
    let scorer = YesScorer::new(Arc::new(tokenizer), Arc::new(logits), scorer_config.max_tokens)?;

    // Span detection and candidate retrieval
    let ollama = OllamaBackend::from_env()?;
    if !ollama.health_check().await? {
        warn!("Ollama is not reachable; span detection will fail until it is");
    }
    let span_detector = LlmSpanDetector::new(Arc::new(ollama));
    let retriever = ElasticCandidateRetriever::from_env()?;

    let state = AppState {
        span_detector: Arc::new(span_detector),
        retriever: Arc::new(retriever),
        reranker: Arc::new(SpanReranker::new(Arc::new(fetcher), Arc::new(scorer))),
    };
    let app = build_router(state);

    // Start server
    let host = std::env::var("HOST").unwrap_or_else(|_| defaults::SERVER_HOST.to_string());
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(defaults::SERVER_PORT);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// HEALTH CHECK
// =============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Upstream(String),
    Internal(String),
}

impl From<dblplink_core::Error> for ApiError {
    fn from(err: dblplink_core::Error) -> Self {
        error!(error = %err, "Request failed");
        match err {
            dblplink_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            err if err.is_upstream() => ApiError::Upstream(err.to_string()),
            err => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
