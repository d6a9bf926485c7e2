//! HTTP / WebSocket surface
//!
//! - `GET  /health`          liveness
//! - `GET  /api/hype`        current level, score and history snapshot
//! - `POST /api/hype/boost`  local participant emission
//! - `GET  /ws/hype`         relay between remote participants and the channel
//!
//! The relay only publishes to and forwards from the channel hub. It never
//! touches gauge state; relayed readings reach the gauge through ingestion.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info};

use crate::channel::{LocalChannelHub, PublishOptions, RealtimeChannel};
use crate::emit::{EmitOutcome, Emitter};
use crate::gauge::HypeGauge;

/// Shared handles for request handlers
#[derive(Clone)]
pub struct AppState {
    pub gauge: Arc<HypeGauge>,
    pub emitter: Arc<Emitter<LocalChannelHub>>,
    pub hub: Arc<LocalChannelHub>,
}

impl AppState {
    pub fn channel_name(&self) -> &str {
        &self.gauge.config().channel_name
    }
}

pub fn build_router(state: AppState, cors_any: bool) -> Router {
    let cors = if cors_any {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new().allow_methods(Any)
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/hype", get(hype_snapshot))
        .route("/api/hype/boost", post(hype_boost))
        .route("/ws/hype", get(hype_ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

pub async fn health() -> Json<Value> {
    Json(serde_json::json!({ "ok": true }))
}

pub async fn hype_snapshot(State(state): State<AppState>) -> Json<Value> {
    let snap = state.gauge.snapshot();
    Json(serde_json::json!({
        "level": snap.level,
        "score": snap.score(),
        "capacity": snap.capacity,
        "updated_at": snap.updated_at,
        "history": &*snap.history,
        "ingest": state.gauge.ingest_counts(),
    }))
}

pub async fn hype_boost(State(state): State<AppState>) -> (StatusCode, Json<EmitOutcome>) {
    let outcome = state.emitter.trigger().await;
    let status = match outcome {
        EmitOutcome::Published { .. } => StatusCode::ACCEPTED,
        EmitOutcome::InFlight => StatusCode::TOO_MANY_REQUESTS,
        EmitOutcome::Failed => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(outcome))
}

/// WebSocket handler
pub async fn hype_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let user_id = params
        .get("user_id")
        .cloned()
        .unwrap_or_else(|| crate::sample::ANONYMOUS_SOURCE.to_string());

    debug!("WebSocket relay requested by {}", user_id);

    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

/// Split a relayed frame into its payload and publish flags.
///
/// A top-level `"persist": true` asks for durable storage and is stripped
/// from the payload. Frames that are not JSON yield `None`.
pub fn relay_frame(text: &str) -> Option<(Value, PublishOptions)> {
    let mut value: Value = serde_json::from_str(text).ok()?;
    let persist = value
        .as_object_mut()
        .and_then(|obj| obj.remove("persist"))
        .and_then(|flag| flag.as_bool())
        .unwrap_or(false);
    Some((value, PublishOptions { persist }))
}

/// Bridge one WebSocket onto the channel
async fn handle_socket(socket: WebSocket, state: AppState, user_id: String) {
    let channel_name = state.channel_name().to_string();

    let mut rx = match state.hub.subscribe(&channel_name) {
        Ok(rx) => rx,
        Err(e) => {
            error!("WebSocket relay could not subscribe: {}", e);
            return;
        }
    };

    info!("WebSocket relay connected: user={}", user_id);

    let (mut sender, mut receiver) = socket.split();

    // Late joiners first get what the channel persisted
    let replay = state.hub.replay(&channel_name);

    let user_id_clone = user_id.clone();
    let mut send_task = tokio::spawn(async move {
        for message in replay {
            if sender
                .send(Message::Text(message.data.to_string()))
                .await
                .is_err()
            {
                return;
            }
        }

        loop {
            match rx.recv().await {
                Ok(message) => {
                    if sender
                        .send(Message::Text(message.data.to_string()))
                        .await
                        .is_err()
                    {
                        debug!("WebSocket send failed for {}", user_id_clone);
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Relay for {} lagged, skipped {}", user_id_clone, skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let hub = state.hub.clone();
    let user_id_clone = user_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let Some((payload, opts)) = relay_frame(&text) else {
                        debug!("Ignoring non-JSON frame from {}", user_id_clone);
                        continue;
                    };
                    if let Err(e) = hub.publish(&channel_name, payload, opts).await {
                        debug!("Relay publish from {} failed: {}", user_id_clone, e);
                    }
                }
                Message::Close(_) => {
                    debug!("WebSocket close received from {}", user_id_clone);
                    break;
                }
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    info!("WebSocket relay disconnected: user={}", user_id);
}

/// Periodically drop idle channels from the hub
pub fn spawn_hub_maintenance(hub: Arc<LocalChannelHub>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if hub.is_closed() {
                break;
            }
            hub.cleanup_inactive();
        }
    })
}
