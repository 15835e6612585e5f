//! Background task owning one STOMP session over WebSocket.

use std::sync::Arc;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, error, info, warn};

use super::frame::{Command, Frame};
use super::types::{ConnectionState, Credentials, SocketCommand, SocketEvent, SocketSettings};

/// Id of the single inbound subscription.
const SUBSCRIPTION_ID: &str = "sub-0";

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Connect, authenticate, subscribe, then pump frames until the session
/// ends. Never reconnects; the state is `Disconnected` when this returns.
pub(crate) async fn run_connection(
    settings: Arc<SocketSettings>,
    credentials: Credentials,
    state: Arc<watch::Sender<ConnectionState>>,
    event_tx: mpsc::Sender<SocketEvent>,
    mut command_rx: mpsc::Receiver<SocketCommand>,
) {
    let user_id = credentials.user_id;
    let url = settings.ws_url();
    info!(user = %user_id, url = %url, "Connecting chat socket");

    let ws = match tokio::time::timeout(
        settings.connect_timeout,
        tokio_tungstenite::connect_async(url.as_str()),
    )
    .await
    {
        Ok(Ok((ws, _))) => ws,
        Ok(Err(e)) => {
            error!(user = %user_id, error = %e, "Chat socket connection failed");
            let _ = event_tx
                .send(SocketEvent::Error(format!("Connection failed: {e}")))
                .await;
            finish(&state, &event_tx, credentials).await;
            return;
        }
        Err(_elapsed) => {
            error!(user = %user_id, "Chat socket connection timed out");
            let _ = event_tx
                .send(SocketEvent::Error("Connection timed out".into()))
                .await;
            finish(&state, &event_tx, credentials).await;
            return;
        }
    };
    let (mut sink, mut stream) = ws.split();

    // 1. STOMP handshake.
    let connect = Frame::new(Command::Connect)
        .header("accept-version", "1.2,1.1,1.0")
        .header("heart-beat", "0,0")
        .header("host", settings.host())
        .header("Authorization", format!("Bearer {}", credentials.token));
    let handshake = async {
        send_frame(&mut sink, &connect)
            .await
            .map_err(|e| format!("send CONNECT: {e}"))?;
        await_connected(&mut stream).await
    };
    let handshake_result = tokio::time::timeout(settings.connect_timeout, handshake).await;
    match handshake_result {
        Ok(Ok(())) => {}
        Ok(Err(reason)) => {
            warn!(user = %user_id, reason = %reason, "Chat socket handshake rejected");
            let _ = event_tx.send(SocketEvent::Error(reason)).await;
            let _ = sink.close().await;
            finish(&state, &event_tx, credentials).await;
            return;
        }
        Err(_elapsed) => {
            warn!(user = %user_id, "Chat socket handshake timed out");
            let _ = event_tx
                .send(SocketEvent::Error("Handshake timed out".into()))
                .await;
            let _ = sink.close().await;
            finish(&state, &event_tx, credentials).await;
            return;
        }
    }

    // 2. Exactly one inbound subscription.
    let subscribe = Frame::new(Command::Subscribe)
        .header("id", SUBSCRIPTION_ID)
        .header("destination", settings.inbound_queue.as_str())
        .header("ack", "auto");
    if let Err(e) = send_frame(&mut sink, &subscribe).await {
        warn!(user = %user_id, error = %e, "Chat socket subscribe failed");
        finish(&state, &event_tx, credentials).await;
        return;
    }

    state.send_replace(ConnectionState::Connected);
    info!(user = %user_id, queue = %settings.inbound_queue, "Chat socket connected");
    let _ = event_tx.send(SocketEvent::Connected { user_id }).await;

    // 3. Pump frames and commands.
    loop {
        tokio::select! {
            command = command_rx.recv() => match command {
                Some(SocketCommand::Send(body)) => {
                    let frame = Frame::new(Command::Send)
                        .header("destination", settings.send_destination.as_str())
                        .header("content-type", "application/json")
                        .body(body);
                    if let Err(e) = send_frame(&mut sink, &frame).await {
                        warn!(user = %user_id, error = %e, "Chat socket send failed");
                        break;
                    }
                }
                Some(SocketCommand::Disconnect) | None => {
                    debug!(user = %user_id, "Closing chat socket");
                    let _ = send_frame(&mut sink, &Frame::new(Command::Disconnect)).await;
                    let _ = sink.close().await;
                    break;
                }
            },

            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if !handle_text(&text, &event_tx).await {
                        let _ = sink.close().await;
                        break;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = sink.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!(user = %user_id, "Chat socket closed by server");
                    break;
                }
                Some(Err(e)) => {
                    debug!(user = %user_id, error = %e, "Chat socket error");
                    break;
                }
                _ => {}
            },
        }
    }

    finish(&state, &event_tx, credentials).await;
}

async fn finish(
    state: &watch::Sender<ConnectionState>,
    event_tx: &mpsc::Sender<SocketEvent>,
    credentials: Credentials,
) {
    state.send_replace(ConnectionState::Disconnected);
    let _ = event_tx
        .send(SocketEvent::Disconnected {
            user_id: credentials.user_id,
        })
        .await;
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

async fn send_frame<S>(sink: &mut S, frame: &Frame) -> Result<(), WsError>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    sink.send(Message::Text(frame.encode().into())).await
}

/// Read until CONNECTED (Ok) or ERROR / close (Err with a reason).
async fn await_connected<S>(stream: &mut S) -> Result<(), String>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => return Err("closed during handshake".into()),
            Ok(_) => continue,
            Err(e) => return Err(format!("read during handshake: {e}")),
        };
        let frames = Frame::decode_all(&text).map_err(|e| format!("bad frame: {e}"))?;
        for frame in frames {
            match frame.command {
                Command::Connected => return Ok(()),
                Command::Error => return Err(error_reason(&frame)),
                other => debug!(command = %other, "Ignoring frame before CONNECTED"),
            }
        }
    }
    Err("closed during handshake".into())
}

/// Handle one inbound text message. Returns `false` when the session
/// must end.
async fn handle_text(text: &str, event_tx: &mpsc::Sender<SocketEvent>) -> bool {
    let frames = match Frame::decode_all(text) {
        Ok(frames) => frames,
        Err(e) => {
            debug!(error = %e, "Dropping undecodable frame");
            return true;
        }
    };

    for frame in frames {
        match frame.command {
            Command::Message => match serde_json::from_str::<serde_json::Value>(&frame.body) {
                Ok(value) => {
                    let _ = event_tx.send(SocketEvent::Message(value)).await;
                }
                Err(e) => debug!(error = %e, "Dropping non-JSON chat message"),
            },
            Command::Error => {
                let reason = error_reason(&frame);
                warn!(reason = %reason, "Chat socket received ERROR frame");
                let _ = event_tx.send(SocketEvent::Error(reason)).await;
                return false;
            }
            other => debug!(command = %other, "Ignoring frame"),
        }
    }
    true
}

fn error_reason(frame: &Frame) -> String {
    frame
        .get("message")
        .map(str::to_string)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| frame.body.clone())
}
