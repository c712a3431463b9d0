//! HTTP surface: the Prometheus exposition endpoint and the manual trigger.

use crate::runner::Runner;
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct AppState {
    pub runner: Arc<Runner>,
}

pub fn router(state: AppState, metrics_path: &str, trigger_path: Option<&str>) -> Router {
    let mut router = Router::new().route(metrics_path, get(metrics));
    if let Some(trigger_path) = trigger_path {
        router = router.route(trigger_path, any(trigger));
    }
    router.with_state(state)
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.runner.metrics().encode_text() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(error) => {
            tracing::error!(%error, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
        }
    }
}

/// Starts a backup run in the background and answers right away.
async fn trigger(State(state): State<AppState>, method: Method) -> StatusCode {
    if method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED;
    }
    tracing::info!("backup triggered manually");
    let runner = state.runner.clone();
    tokio::spawn(async move {
        runner.run().await;
    });
    StatusCode::NO_CONTENT
}

/// Expands a host-less address like `:8080` to one that listens on all interfaces.
pub fn listen_address(address: &str) -> String {
    if address.starts_with(':') {
        format!("0.0.0.0{}", address)
    } else {
        address.to_owned()
    }
}

pub async fn bind(address: &str) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(listen_address(address)).await?;
    tracing::info!(address = %listener.local_addr()?, "listening for HTTP requests");
    Ok(listener)
}

pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    axum::serve(listener, router).await
}
