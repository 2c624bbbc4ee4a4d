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
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::game::{EntityId, InputCommand};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ProtocolError, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (ws_sink, ws_stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(state.config.outbound_capacity);

    // Greeting and catch-up are queued on outbound_tx before this returns
    let ticket = state.registry.connect(outbound_tx);
    let id = ticket.id;

    let mut writer_handle = tokio::spawn(run_writer(id, ws_sink, outbound_rx));

    // The writer ends on its own when the registry evicts this viewer
    tokio::select! {
        _ = run_reader(id, ws_stream, &state, |cmd| ticket.inbox.push(cmd)) => {}
        _ = &mut writer_handle => {
            info!(entity_id = %id, "Outbound closed by server, dropping connection");
        }
    }

    state.registry.disconnect(id);
    writer_handle.abort();

    info!(entity_id = %id, "WebSocket connection closed");
}

/// Outbound queue -> WebSocket
async fn run_writer(
    id: EntityId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<ServerMsg>,
) {
    while let Some(msg) = outbound_rx.recv().await {
        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(entity_id = %id, error = %e, "WebSocket send failed");
            break;
        }
    }
    debug!(entity_id = %id, "Writer stopped");
}

/// WebSocket -> command inbox
async fn run_reader<F>(
    id: EntityId,
    mut ws_stream: SplitStream<WebSocket>,
    state: &AppState,
    mut submit: F,
) where
    F: FnMut(InputCommand),
{
    let rate_limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(entity_id = %id, "Rate limited input message");
                    continue;
                }

                match ClientMsg::decode(&text) {
                    Ok(ClientMsg::Input { keys, seq, dt, ct }) => {
                        submit(InputCommand::new(seq, keys, dt, ct));
                    }
                    Ok(ClientMsg::Ping { t }) => {
                        let pong = ServerMsg::Pong {
                            t,
                            server_time: unix_millis(),
                        };
                        state.registry.send_to(id, pong);
                    }
                    Err(e) => {
                        warn!(entity_id = %id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(entity_id = %id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                debug!(entity_id = %id, "Received transport ping/pong");
            }
            Ok(Message::Close(_)) => {
                info!(entity_id = %id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(entity_id = %id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), SendError> {
    let json = msg.encode()?;
    sink.send(Message::Text(json)).await?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
enum SendError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("socket closed: {0}")]
    Socket(#[from] axum::Error),
}
