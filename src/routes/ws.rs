//! WebSocket handler — relay between one client socket and the engine.
//!
//! DESIGN
//! ======
//! On upgrade the connection registers with the engine, handing over the
//! sender half of a bounded outbound queue, then enters a `select!` loop:
//! - Incoming client text → parse → forward as an engine event
//! - Queued outbound messages → serialize → write to the socket
//!
//! The connection task holds no show state. If the engine drops the session
//! (its queue filled up or closed) the receiver ends and the socket closes;
//! the client reconnects and is brought back up to date.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → register → engine queues `welcome`
//! 2. Client sends `connect` → confirmation, catalog, current page
//! 3. Client events → engine → render commands fan out to every queue
//! 4. Close → unregister

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::http::header::HOST;
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::message::{InboundError, Outbound, SessionId, parse_inbound};
use crate::services::engine::Event;
use crate::state::AppState;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    ConnectInfo(address): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let host = headers.get(HOST).and_then(|v| v.to_str().ok());
    let asset_host = asset_host(host, Some(address), state.port);
    ws.on_upgrade(move |socket| run_ws(socket, state, address, asset_host))
}

/// Authority clients should use for asset URLs: the `Host` they dialed,
/// else their own address with our port, else localhost.
pub(crate) fn asset_host(host_header: Option<&str>, address: Option<SocketAddr>, port: u16) -> String {
    if let Some(host) = host_header.map(str::trim).filter(|h| !h.is_empty()) {
        return host.to_owned();
    }
    match address {
        Some(address) => SocketAddr::new(address.ip(), port).to_string(),
        None => format!("localhost:{port}"),
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, address: SocketAddr, asset_host: String) {
    let (client_tx, mut client_rx) = mpsc::channel::<Outbound>(state.session_queue);

    let Some(session_id) = state.engine.register(client_tx, Some(address), asset_host).await else {
        warn!(%address, "ws: engine unavailable, closing connection");
        return;
    };
    info!(%session_id, %address, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let Some(event) = parse_event(session_id, text.as_str()) else { continue };
                        if !state.engine.event(session_id, event).await {
                            warn!(%session_id, "ws: engine stopped");
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            outbound = client_rx.recv() => {
                let Some(message) = outbound else {
                    info!(%session_id, "ws: session dropped by engine");
                    break;
                };
                if send_message(&mut socket, session_id, &message).await.is_err() {
                    break;
                }
            }
        }
    }

    state.engine.unregister(session_id).await;
    info!(%session_id, "ws: client disconnected");
}

/// Parse one text frame into an engine event. Bad input is logged and
/// dropped; it never closes the connection.
pub(crate) fn parse_event(session_id: SessionId, text: &str) -> Option<Event> {
    match parse_inbound(text) {
        Ok(inbound) => {
            debug!(%session_id, ?inbound, "ws: recv message");
            Some(inbound.into_event())
        }
        Err(e @ InboundError::UnknownKind(_)) => {
            info!(%session_id, error = %e, "ws: ignoring message");
            None
        }
        Err(e) => {
            warn!(%session_id, error = %e, "ws: invalid inbound message");
            None
        }
    }
}

async fn send_message(socket: &mut WebSocket, session_id: SessionId, message: &Outbound) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(j) => j,
        Err(e) => {
            warn!(%session_id, error = %e, "ws: failed to serialize message");
            return Err(());
        }
    };
    debug!(%session_id, kind = message.kind(), "ws: send message");
    socket.send(Message::Text(json.into())).await.map_err(|e| {
        debug!(%session_id, error = %e, "ws: send failed");
    })
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
