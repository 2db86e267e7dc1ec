//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{ConnectError, PlayerInput};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Per-connection outbound queue depth. Messages beyond it are dropped.
const OUTBOUND_BUFFER: usize = 256;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    info!(session_id = %session_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);

    match state.arena.connect(session_id, outbound_tx).await {
        Ok(()) => {}
        Err(ConnectError::Admission(e)) => {
            info!(session_id = %session_id, error = %e, "Connection refused");
            let _ = send_msg(&mut ws_sink, &ServerMsg::CapacityFull).await;
            let _ = ws_sink.send(Message::Close(None)).await;
            return;
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Arena unavailable");
            return;
        }
    }

    let welcome = ServerMsg::Welcome {
        id: session_id,
        server_time: unix_millis(),
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(session_id = %session_id, error = %e, "Failed to send welcome");
        state.arena.disconnect(session_id).await;
        return;
    }

    run_session(session_id, &state, ws_sink, ws_stream, outbound_rx).await;

    // Cleanup on disconnect
    state.arena.disconnect(session_id).await;

    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    session_id: Uuid,
    state: &AppState,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut outbound_rx: mpsc::Receiver<ServerMsg>,
) {
    let rate_limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);
    let heartbeat_every = state.config.heartbeat_interval;
    let idle_timeout = state.config.client_timeout;

    // Writer task: arena -> WebSocket, plus transport heartbeat
    let writer_handle = tokio::spawn(async move {
        let mut heartbeat = interval(heartbeat_every);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = outbound_rx.recv() => {
                    let Some(msg) = msg else {
                        debug!(session_id = %session_id, "Outbound channel closed");
                        break;
                    };
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(session_id = %session_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if ws_sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Reader loop: WebSocket -> arena
    loop {
        let next = match timeout(idle_timeout, ws_stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                info!(session_id = %session_id, "Client timed out");
                break;
            }
        };

        let Some(result) = next else {
            break;
        };

        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(session_id = %session_id, "Rate limited input message");
                    continue;
                }

                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                if let Err(e) = client_msg.validate() {
                    warn!(session_id = %session_id, error = %e, "Rejected client message");
                    continue;
                }

                let input = PlayerInput {
                    session_id,
                    msg: client_msg,
                    received_at: unix_millis(),
                };

                if !state.arena.send_input(input).await {
                    debug!(session_id = %session_id, "Arena channel closed");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
