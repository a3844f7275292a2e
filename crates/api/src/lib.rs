//! Weapon Detection Alert API Server
//!
//! HTTP surface over a [`DetectionService`]: state inspection, polling
//! control, alert dismissal and Prometheus metrics.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use detection_protocol::HttpDetectionClient;
use detection_service::{
    AggregateState, AlertNotifier, DetectionService, ServiceError, SilentNotifier,
    TerminalNotifier,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub mod config;

pub use crate::config::{AppConfig, LoggingConfig, ServerConfig};

/// Application state shared across handlers
pub struct AppState {
    pub service: DetectionService,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
    pub metrics: PrometheusHandle,
}

impl AppState {
    pub fn new(service: DetectionService, metrics: PrometheusHandle) -> Self {
        Self {
            service,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            metrics,
        }
    }
}

/// Handler errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Service(ServiceError::MissingCredential) => StatusCode::BAD_REQUEST,
            ApiError::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub polling: bool,
    pub poll_interval_ms: u64,
    pub connected: bool,
    pub listeners: usize,
}

/// Body of `POST /api/v1/polling/start`
#[derive(Debug, Deserialize)]
pub struct StartPollingRequest {
    pub token: String,
}

/// Result of a start/stop request
#[derive(Debug, Serialize)]
pub struct PollingResponse {
    /// Whether the call changed the polling state
    pub changed: bool,
    pub polling: bool,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/state", get(state_handler))
        .route("/api/v1/alert/dismiss", post(dismiss_handler))
        .route("/api/v1/polling/start", post(start_polling_handler))
        .route("/api/v1/polling/stop", post(stop_polling_handler))
        .route("/api/v1/reset", post(reset_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        polling: state.service.is_polling(),
        poll_interval_ms: state.service.config().poll_interval_ms,
        connected: state.service.get_state().is_connected,
        listeners: state.service.listener_count(),
    })
}

async fn state_handler(State(state): State<Arc<AppState>>) -> Json<AggregateState> {
    Json(state.service.get_state())
}

async fn dismiss_handler(State(state): State<Arc<AppState>>) -> Json<AggregateState> {
    state.service.dismiss_alert();
    Json(state.service.get_state())
}

async fn start_polling_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartPollingRequest>,
) -> Result<Json<PollingResponse>, ApiError> {
    let changed = state.service.start_polling(&request.token)?;
    Ok(Json(PollingResponse {
        changed,
        polling: state.service.is_polling(),
    }))
}

async fn stop_polling_handler(State(state): State<Arc<AppState>>) -> Json<PollingResponse> {
    let changed = state.service.stop_polling();
    Json(PollingResponse {
        changed,
        polling: state.service.is_polling(),
    })
}

async fn reset_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.service.reset();
    StatusCode::NO_CONTENT
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Build the service from configuration and serve until ctrl-c
pub async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    let metrics = PrometheusBuilder::new().install_recorder()?;

    let client = HttpDetectionClient::new(&config.source)?;
    info!("Detection backend at {}", client.base_url());

    let notifier: Arc<dyn AlertNotifier> = if config.notifications {
        Arc::new(TerminalNotifier)
    } else {
        Arc::new(SilentNotifier)
    };
    let service = DetectionService::new(Arc::new(client), notifier, config.service.clone());

    match config.credential.as_deref() {
        Some(credential) => {
            service.start_polling(credential)?;
        }
        None => info!("No credential configured; waiting for POST /api/v1/polling/start"),
    }

    let app = create_router(Arc::new(AppState::new(service.clone(), metrics)));

    info!("Starting API server on {}", config.server.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    service.stop_polling();
    info!("API server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use detection_protocol::{MockDetectionApi, ObjectStats, Sample};
    use detection_service::ServiceConfig;
    use tower::ServiceExt;

    fn app(api: Arc<MockDetectionApi>) -> (Router, DetectionService) {
        let service = DetectionService::new(api, Arc::new(SilentNotifier), ServiceConfig::default());
        let metrics = PrometheusBuilder::new().build_recorder().handle();
        let router = create_router(Arc::new(AppState::new(service.clone(), metrics)));
        (router, service)
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = app(Arc::new(MockDetectionApi::new()));

        let response = router
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["polling"], false);
        assert_eq!(body["poll_interval_ms"], 2000);
    }

    #[tokio::test]
    async fn test_state_reflects_poll() {
        let api = Arc::new(MockDetectionApi::new());
        api.set_status(Sample::detecting(
            [("gun".to_string(), ObjectStats::new(1, vec![0.9]))],
            "t1",
        ));
        let (router, service) = app(api);
        service.poll_once().await;

        let response = router
            .oneshot(Request::get("/api/v1/state").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = json_body(response).await;
        assert_eq!(body["is_connected"], true);
        assert_eq!(body["history"].as_array().map(Vec::len), Some(1));
        assert!(body["active_alert"].is_null());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop_polling() {
        let (router, service) = app(Arc::new(MockDetectionApi::new()));

        let response = router
            .clone()
            .oneshot(post_json("/api/v1/polling/start", r#"{"token":"abc"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["changed"], true);
        assert!(service.is_polling());

        let response = router
            .clone()
            .oneshot(post_json("/api/v1/polling/start", r#"{"token":"abc"}"#))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["changed"], false);

        let response = router
            .oneshot(Request::post("/api/v1/polling/stop").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["changed"], true);
        assert_eq!(body["polling"], false);
    }

    #[tokio::test]
    async fn test_start_without_token_is_bad_request() {
        let (router, service) = app(Arc::new(MockDetectionApi::new()));

        let response = router
            .oneshot(post_json("/api/v1/polling/start", r#"{"token":""}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
        assert!(!service.is_polling());
    }

    #[tokio::test]
    async fn test_dismiss_and_reset() {
        let (router, service) = app(Arc::new(MockDetectionApi::new()));
        service.poll_once().await;

        let response = router
            .clone()
            .oneshot(Request::post("/api/v1/alert/dismiss").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(json_body(response).await["active_alert"].is_null());

        let response = router
            .oneshot(Request::post("/api/v1/reset").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(service.get_state(), AggregateState::default());
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (router, _) = app(Arc::new(MockDetectionApi::new()));

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
    }
}
