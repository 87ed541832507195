//! HTTP shell: Telegram webhook, health and metrics endpoints.
//!
//! The webhook always answers `200 OK` once the secret matches, so Telegram
//! never redelivers an update the desk already saw. Failures are logged.

use crate::command::Inbound;
use crate::dispatcher::Dispatcher;
use crate::telegram::{BotApi, Content, Update};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use boxoffice_core::ports::QrCodec;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Header carrying the secret registered with `setWebhook`
pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    /// Update router
    pub dispatcher: Arc<Dispatcher>,
    /// Photo downloads and callback acknowledgements
    pub bot: Arc<dyn BotApi>,
    /// Decodes downloaded photos
    pub qr: Arc<dyn QrCodec>,
    /// Expected webhook secret
    pub webhook_secret: Option<Arc<str>>,
    /// Prometheus exporter, when installed
    pub metrics: Option<PrometheusHandle>,
}

/// Build the router with all endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/telegram/webhook", post(webhook))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[allow(clippy::unused_async)]
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[allow(clippy::unused_async)]
async fn metrics(State(state): State<AppState>) -> (StatusCode, String) {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics exporter not installed".to_string()),
    }
}

async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    if let Some(expected) = &state.webhook_secret {
        let presented = headers
            .get(SECRET_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        if !constant_time_eq::constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
            tracing::warn!("Webhook call with a wrong secret");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(error) => {
            tracing::warn!(%error, "Undecodable webhook payload");
            return StatusCode::OK;
        },
    };
    let update_id = update.update_id;
    let Some(incoming) = update.incoming() else {
        tracing::debug!(update_id, "Update kind not handled");
        return StatusCode::OK;
    };

    if let Some(callback_id) = incoming.callback_id {
        let bot = Arc::clone(&state.bot);
        tokio::spawn(async move {
            if let Err(error) = bot.answer_callback(callback_id).await {
                tracing::debug!(%error, "Callback acknowledgement failed");
            }
        });
    }

    let inbound = match incoming.content {
        Content::Ready(inbound) => inbound,
        Content::Photo { file_id } => match state.bot.download(file_id).await {
            Ok(bytes) => {
                let qr = Arc::clone(&state.qr);
                match tokio::task::spawn_blocking(move || qr.decode(&bytes)).await {
                    Ok(payload) => Inbound::Scan(payload),
                    Err(error) => {
                        tracing::error!(chat = %incoming.from, %error, "QR decoding task failed");
                        Inbound::Scan(None)
                    },
                }
            },
            Err(error) => {
                tracing::warn!(chat = %incoming.from, %error, "Photo download failed");
                Inbound::Scan(None)
            },
        },
        Content::Unsupported(reason) => {
            tracing::debug!(update_id, chat = %incoming.from, reason, "Update ignored");
            return StatusCode::OK;
        },
    };

    state
        .dispatcher
        .dispatch(incoming.from, &incoming.first_name, inbound)
        .await;
    StatusCode::OK
}
