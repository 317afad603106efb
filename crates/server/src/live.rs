use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::state::AppState;

// ── WebSocket Messages ──────────────────────────────────────────

#[derive(Serialize)]
struct WsMessage<T: Serialize> {
    #[serde(rename = "type")]
    msg_type: &'static str,
    data: T,
}

fn ws_json<T: Serialize>(msg_type: &'static str, data: T) -> String {
    serde_json::to_string(&WsMessage { msg_type, data }).unwrap_or_default()
}

// ── WebSocket Handler ───────────────────────────────────────────

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.progress.subscribe();

    // Current status of every repository as initial state.
    let initial = match state.dispatcher.context().status.list_status().await {
        Ok(entries) => ws_json("status", entries),
        Err(e) => {
            warn!(error = %e, "failed to load status for websocket client");
            ws_json("status", Vec::<()>::new())
        }
    };
    if sender.send(Message::Text(initial.into())).await.is_err() {
        return;
    }

    // Forward progress events to this client.
    let send_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "websocket client lagging, progress events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let msg = ws_json("progress", &event);
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Consume incoming messages (pings, close frames) but ignore content.
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    first_to_finish(send_task, recv_task).await;
}

/// Wait for either task, then abort the other so it drops its side of the
/// socket and its progress subscription.
async fn first_to_finish(mut a: JoinHandle<()>, mut b: JoinHandle<()>) {
    let loser = tokio::select! {
        _ = &mut a => b,
        _ = &mut b => a,
    };
    loser.abort();
    let _ = loser.await;
}
