//! WebSocket endpoint shared by devices and observers
//!
//! Every connection starts as an observer. A connection that announces
//! itself with `device_connected` becomes a device: it is registered in the
//! device registry and no longer receives broadcasts.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use super::handlers::MonitorState;
use super::protocol::{self, InboundMessage, ProtocolError};
use crate::broadcast::{send_to, ConnectionId, FrequencySummary, Outbox, OutboundEvent};
use crate::types::Session;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<MonitorState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: MonitorState) {
    let (mut sink, mut stream) = socket.split();
    let (conn, outbox, mut outbound) = state.observers.open_connection();
    state.observers.insert(conn, outbox.clone());
    info!(connection = conn, observers = state.observers.len(), "Client connected");

    // Single writer per connection: frames leave in queue order
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sink.send(Message::Text(frame.to_string())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let status = match state.sessions.current().await {
        Ok(active) => OutboundEvent::session_status(active.as_ref()),
        Err(e) => OutboundEvent::error(e.to_string()),
    };
    send_to(&outbox, &status);

    let mut device_id: Option<String> = None;
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                dispatch(&state, conn, &outbox, &mut device_id, &text).await;
            }
            Ok(Message::Binary(_)) => {
                send_to(&outbox, &OutboundEvent::error(ProtocolError::Binary.to_string()));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection = conn, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.observers.remove(conn);
    state.devices.device_disconnected(conn);
    drop(outbox);
    let _ = writer.await;
    info!(connection = conn, device = ?device_id, "Client disconnected");
}

async fn dispatch(
    state: &MonitorState,
    conn: ConnectionId,
    outbox: &Outbox,
    device_id: &mut Option<String>,
    text: &str,
) {
    let message = match protocol::decode(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(connection = conn, error = %e, "Rejected inbound frame");
            send_to(outbox, &OutboundEvent::error(e.to_string()));
            return;
        }
    };

    if let Some((device, reading)) = message.reading() {
        state.ingestor.ingest(device, reading).await;
        return;
    }

    match message {
        InboundMessage::DeviceConnected { device_id: id } => {
            state.observers.remove(conn);
            state.devices.device_connected(&id, conn);
            *device_id = Some(id);
        }
        InboundMessage::FftResult { .. } => {}
        InboundMessage::GetDeviceList => {
            send_to(
                outbox,
                &OutboundEvent::DeviceList {
                    devices: state.devices.list_connected(),
                },
            );
        }
        InboundMessage::GetSessions => {
            let event = match state.sessions.list_sessions().await {
                Ok(sessions) => OutboundEvent::SessionsList {
                    sessions: sessions.iter().map(Session::summary).collect(),
                },
                Err(e) => OutboundEvent::error(format!("Failed to list sessions: {e}")),
            };
            send_to(outbox, &event);
        }
        InboundMessage::GetSessionData { session_id } => {
            let event = match state.sessions.session_data(&session_id).await {
                Ok((session, samples)) => OutboundEvent::SessionData {
                    session_id,
                    data: samples,
                    frequency_data: FrequencySummary::from_session(&session),
                },
                Err(e) => OutboundEvent::error(format!("Failed to load session: {e}")),
            };
            send_to(outbox, &event);
        }
        InboundMessage::StartTest {
            session_name,
            test_mass,
        } => {
            // Success is acknowledged by the test_started broadcast
            if let Err(e) = state.sessions.start(session_name, test_mass).await {
                send_to(outbox, &OutboundEvent::error(format!("Failed to start test: {e}")));
            }
        }
        InboundMessage::StopTest => {
            if let Err(e) = state.sessions.stop().await {
                send_to(outbox, &OutboundEvent::error(format!("Failed to stop test: {e}")));
            }
        }
        InboundMessage::DeleteSession { session_id } => {
            if let Err(e) = state.sessions.delete(session_id.as_str()).await {
                send_to(
                    outbox,
                    &OutboundEvent::SessionDeleted {
                        session_id,
                        success: false,
                        error: Some(e.to_string()),
                    },
                );
            }
        }
    }
}
