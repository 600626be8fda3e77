// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! HTTP/JSON transport for the tools and discovery resources.
//!
//! # Routes
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `POST` | `/tools/{name}` | Invoke a tool with a JSON argument object |
//! | `GET` | `/resources/instances` | Configured instances |
//! | `GET` | `/resources/tools` | Tool categories |
//! | `GET` | `/resources/tools/{category}` | Tools in one category |
//! | `GET` | `/resources/guide` | Usage guide for agents (Markdown) |
//! | `GET` | `/resources/version` | Server version |
//! | `GET` | `/metrics` | Prometheus metrics |
//! | `GET` | `/healthz` | Liveness |
//!
//! Errors are returned as `{"error": <message>, "reason": <code>}`.

use crate::discovery;
use crate::errors::ToolError;
use crate::metrics::gather_metrics;
use crate::tools::DnsTools;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

/// Shared handler state.
#[derive(Clone)]
struct AppState {
    tools: Arc<DnsTools>,
}

/// A [`ToolError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ToolError);

impl From<ToolError> for ApiError {
    fn from(error: ToolError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = Json(json!({
            "error": self.0.to_string(),
            "reason": self.0.reason(),
        }));
        (status, body).into_response()
    }
}

/// HTTP status for a tool error.
#[must_use]
pub const fn status_for(error: &ToolError) -> StatusCode {
    match error {
        ToolError::UnknownInstance { .. }
        | ToolError::UnknownTool { .. }
        | ToolError::UnknownCategory { .. } => StatusCode::NOT_FOUND,
        ToolError::NoPendingDeletion { .. } | ToolError::TokenMismatch { .. } => {
            StatusCode::CONFLICT
        }
        ToolError::NoMatchingRecords { .. } | ToolError::InvalidArgument { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ToolError::LookupFailed { .. } => StatusCode::BAD_GATEWAY,
        ToolError::MalformedArguments { .. } => StatusCode::BAD_REQUEST,
        ToolError::Encoding { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Build the router.
pub fn router(tools: Arc<DnsTools>) -> Router {
    Router::new()
        .route("/tools/{name}", post(call_tool))
        .route("/resources/instances", get(list_instances))
        .route("/resources/tools", get(list_categories))
        .route("/resources/tools/{category}", get(list_tools))
        .route("/resources/guide", get(guide))
        .route("/resources/version", get(version))
        .route("/metrics", get(metrics))
        .route("/healthz", get(healthz))
        .with_state(AppState { tools })
}

/// Resolve when SIGINT or SIGTERM is received.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let args = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(|e| ToolError::MalformedArguments {
            tool: name.clone(),
            reason: e.to_string(),
        })?
    };

    Ok(Json(state.tools.call(&name, args).await?))
}

async fn list_instances(State(state): State<AppState>) -> Json<Vec<discovery::InstanceSummary>> {
    Json(discovery::instances(state.tools.registry()))
}

async fn list_categories() -> Json<Vec<discovery::CategorySummary>> {
    Json(discovery::categories())
}

async fn list_tools(
    Path(category): Path<String>,
) -> Result<Json<Vec<discovery::ToolDescriptor>>, ApiError> {
    Ok(Json(discovery::tools(&category)?))
}

async fn guide() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        discovery::guide(),
    )
}

async fn version() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": discovery::version(),
    }))
}

async fn metrics() -> Response {
    match gather_metrics() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;
