//! WebSocket message processing loop.
//!
//! Reads frames from a live sensor connection in arrival order, answers
//! heartbeats, and hands every decoded event to
//! [`MonitorState::dispatch`]. Runs on a single task, so readings for any
//! one field are applied in the order the transport delivered them.

use std::fmt;

use futures::{SinkExt, StreamExt};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::{EventConnection, WsStream};
use crate::messages::{parse_packet, EnginePacket, SocketPacket, DISCONNECT_REQUEST, PONG};
use crate::state::MonitorState;

/// Why a live connection ended. Strings follow Socket.IO client reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// No packet arrived within ping interval + ping timeout.
    PingTimeout,
    /// The WebSocket closed or the server sent an Engine.IO close.
    TransportClose,
    /// The WebSocket reported a receive or send error.
    TransportError,
    /// The server disconnected the namespace.
    ServerDisconnect,
    /// Local shutdown.
    ClientDisconnect,
}

impl DisconnectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DisconnectReason::PingTimeout => "ping timeout",
            DisconnectReason::TransportClose => "transport close",
            DisconnectReason::TransportError => "transport error",
            DisconnectReason::ServerDisconnect => "io server disconnect",
            DisconnectReason::ClientDisconnect => "io client disconnect",
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process frames until the connection ends or `cancel` fires.
///
/// On cancellation a Socket.IO disconnect and a WebSocket close are sent
/// before returning. The stream is always dropped by the caller.
pub async fn process_messages(
    conn: &mut EventConnection,
    state: &MonitorState,
    cancel: &CancellationToken,
) -> DisconnectReason {
    let session_id = conn.session_id.clone();
    let heartbeat_timeout = conn.heartbeat_timeout;
    let ws_stream = &mut conn.ws_stream;
    let mut deadline = Instant::now() + heartbeat_timeout;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                close_gracefully(ws_stream, &session_id).await;
                return DisconnectReason::ClientDisconnect;
            }
            _ = tokio::time::sleep_until(deadline) => {
                tracing::warn!(session_id = %session_id, "No heartbeat from sensor server");
                return DisconnectReason::PingTimeout;
            }
            msg = ws_stream.next() => {
                deadline = Instant::now() + heartbeat_timeout;
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reason) = handle_text(ws_stream, &text, state, &session_id).await {
                            return reason;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        // Binary attachments are not used by the sensor server.
                        tracing::trace!(session_id = %session_id, "Ignoring binary frame");
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // Handled automatically by tungstenite.
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(session_id = %session_id, ?frame, "Sensor server closed WebSocket");
                        return DisconnectReason::TransportClose;
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        tracing::error!(session_id = %session_id, error = %e, "WebSocket receive error");
                        return DisconnectReason::TransportError;
                    }
                    None => {
                        tracing::info!(session_id = %session_id, "WebSocket stream exhausted");
                        return DisconnectReason::TransportClose;
                    }
                }
            }
        }
    }
}

/// Handle one text frame. Returns a reason when the frame ends the session.
async fn handle_text(
    ws_stream: &mut WsStream,
    text: &str,
    state: &MonitorState,
    session_id: &str,
) -> Option<DisconnectReason> {
    match parse_packet(text) {
        Ok(EnginePacket::Ping) => {
            if let Err(e) = ws_stream.send(Message::Text(PONG.to_string())).await {
                tracing::error!(session_id = %session_id, error = %e, "Failed to send pong");
                return Some(DisconnectReason::TransportError);
            }
            None
        }
        Ok(EnginePacket::Message(SocketPacket::Event(event))) => {
            state.dispatch(event);
            None
        }
        Ok(EnginePacket::Message(SocketPacket::Disconnect)) => {
            tracing::info!(session_id = %session_id, "Server disconnected namespace");
            Some(DisconnectReason::ServerDisconnect)
        }
        Ok(EnginePacket::Close) => Some(DisconnectReason::TransportClose),
        Ok(other) => {
            tracing::debug!(session_id = %session_id, packet = ?other, "Ignoring packet");
            None
        }
        Err(e) => {
            tracing::warn!(
                session_id = %session_id,
                error = %e,
                raw_message = %truncate(text, 200),
                "Failed to parse sensor message",
            );
            None
        }
    }
}

async fn close_gracefully(ws_stream: &mut WsStream, session_id: &str) {
    if let Err(e) = ws_stream
        .send(Message::Text(DISCONNECT_REQUEST.to_string()))
        .await
    {
        tracing::debug!(session_id = %session_id, error = %e, "Failed to send disconnect");
    }
    if let Err(e) = ws_stream.close(None).await {
        tracing::debug!(session_id = %session_id, error = %e, "Failed to close WebSocket");
    }
}

/// Camera frames can be large; keep parse warnings readable.
fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_match_socket_io_wording() {
        assert_eq!(DisconnectReason::PingTimeout.as_str(), "ping timeout");
        assert_eq!(DisconnectReason::TransportClose.to_string(), "transport close");
        assert_eq!(
            DisconnectReason::ServerDisconnect.to_string(),
            "io server disconnect"
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 200), "short");
    }
}
