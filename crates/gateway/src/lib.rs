//! HTTP API gateway for TailorTalk.
//!
//! Two routes:
//! - `GET /`: liveness probe
//! - `POST /chat`: run one agent session for `{query}` and return `{response}`
//!
//! Each request gets its own conversation; the agent itself is shared
//! read-only. Failures are always answered with a JSON body, never a bare
//! error. A request that outlives the configured deadline is answered with
//! 408 and its in-flight run is dropped.

use axum::extract::DefaultBodyLimit;
use axum::extract::rejection::JsonRejection;
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

use tailortalk_agent::{AgentLoop, run_session};
use tailortalk_config::{AppConfig, GatewayConfig};
use tailortalk_core::error::Error;
use tailortalk_core::event::EventBus;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub agent: Arc<AgentLoop>,
}

type SharedState = Arc<GatewayState>;

/// Router-internal state: the shared agent plus per-route settings.
struct RouteState {
    gateway: SharedState,
    request_timeout: Duration,
}

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - HTTP trace logging
/// - CORS for the configured origins only
/// - Request body size limit (1 MB)
///
/// `/chat` runs each session under `request_timeout_secs` and answers 408
/// with a JSON body when the deadline passes.
pub fn build_router(state: SharedState, config: &GatewayConfig) -> Router {
    let state = Arc::new(RouteState {
        gateway: state,
        request_timeout: Duration::from_secs(config.request_timeout_secs),
    });

    Router::new()
        .route("/", get(root_handler))
        .route("/chat", post(chat_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors_layer(&config.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
///
/// Builds the provider, calendar client, and tool registry once and shares
/// them across all requests.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let event_bus = Arc::new(EventBus::default());
    let agent = Arc::new(AgentLoop::from_config(&config, event_bus)?);
    let app = build_router(Arc::new(GatewayState { agent }), &config.gateway);

    info!(addr = %addr, model = %config.provider_model(), "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
}

async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        message: "TailorTalk Agent is running.",
    })
}

#[derive(Deserialize)]
struct ChatRequest {
    query: String,
    /// Accepted for compatibility; every request starts a fresh conversation.
    #[serde(default)]
    history: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

async fn chat_handler(
    State(state): State<Arc<RouteState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> (StatusCode, Json<ChatResponse>) {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected chat request body");
            return error_response(rejection.status(), rejection.body_text());
        }
    };

    if !payload.history.is_empty() {
        debug!(entries = payload.history.len(), "Ignoring client-supplied history");
    }

    let run = run_session(&state.gateway.agent, &payload.query);
    match tokio::time::timeout(state.request_timeout, run).await {
        Ok(Ok(outcome)) => (
            StatusCode::OK,
            Json(ChatResponse {
                response: outcome.answer,
            }),
        ),
        Ok(Err(e)) => error_response(failure_status(&e), e.to_string()),
        Err(_) => {
            warn!(
                timeout_secs = state.request_timeout.as_secs(),
                "Chat request timed out"
            );
            error_response(
                StatusCode::REQUEST_TIMEOUT,
                format!(
                    "request timed out after {}s",
                    state.request_timeout.as_secs()
                ),
            )
        }
    }
}

fn error_response(status: StatusCode, message: String) -> (StatusCode, Json<ChatResponse>) {
    (
        status,
        Json(ChatResponse {
            response: format!("An error occurred: {message}"),
        }),
    )
}

fn failure_status(error: &Error) -> StatusCode {
    match error {
        Error::Provider(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
