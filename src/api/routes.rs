//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use super::types::*;
use crate::budget::UsageSnapshot;
use crate::config::Config;
use crate::orchestrator::{AgentError, AgentResult, Orchestrator, GENERIC_FAILURE_MESSAGE};

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Shared application state.
pub struct AppState {
    pub orchestrator: Orchestrator,
}

fn error_response(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn agent_error_response(err: &AgentError) -> ApiError {
    let status = match err {
        AgentError::BudgetExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        AgentError::UsageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.user_message())
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/usage", get(usage))
        .route("/api/ask", post(ask))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        orchestrator: Orchestrator::from_config(&config),
    });
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining in-flight requests");
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Current spend, for the budget gauge.
async fn usage(State(state): State<Arc<AppState>>) -> Result<Json<UsageSnapshot>, ApiError> {
    state
        .orchestrator
        .usage()
        .await
        .map(Json)
        .map_err(|e| agent_error_response(&e))
}

/// Answer one question.
///
/// The orchestration runs on its own task so that a disconnecting client
/// cancels it through the drop guard instead of dropping it mid-call; the
/// task still deletes its agent before finishing.
async fn ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AgentResult>, ApiError> {
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "Please enter a question.",
        ));
    }

    let request_id = Uuid::new_v4();
    let cancel = CancellationToken::new();
    let _cancel_on_disconnect = cancel.clone().drop_guard();

    let orchestrator = state.orchestrator.clone();
    let span = tracing::info_span!("ask", %request_id);
    let task = tokio::spawn(
        async move { orchestrator.process_user_input(&text, &cancel).await }.instrument(span),
    );

    match task.await {
        Ok(Ok(result)) => Ok(Json(result)),
        Ok(Err(e)) => {
            tracing::warn!(%request_id, "Request failed: {}", e);
            Err(agent_error_response(&e))
        }
        Err(e) => {
            tracing::error!(%request_id, "Orchestration task panicked: {}", e);
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                GENERIC_FAILURE_MESSAGE,
            ))
        }
    }
}
