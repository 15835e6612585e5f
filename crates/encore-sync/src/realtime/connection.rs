//! Background streaming loop with auto-reconnect.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::handler::translate_sse_event;
use super::sse::SseReader;
use super::types::{RealtimeConfig, RealtimeEvent};

/// How a single open stream ended.
enum StreamEnd {
    /// Server closed the body or the read failed. Reconnect.
    Closed,
    /// Server cancelled or revoked the stream. Stop for good.
    Terminal,
    /// Nobody is listening any more.
    ReceiverGone,
}

// ---------------------------------------------------------------------------
// Stream Loop
// ---------------------------------------------------------------------------

/// Background task streaming one path, reconnecting with exponential backoff.
///
/// Ends when the listener's receiver is dropped, or after a `cancel` or
/// `auth_revoked` event from the server.
pub(crate) async fn stream_loop(
    http: reqwest::Client,
    config: Arc<RealtimeConfig>,
    path: String,
    event_tx: mpsc::Sender<RealtimeEvent>,
) {
    let mut reconnect_delay = config.reconnect_delay_secs;

    loop {
        let url = config.rest_url(&path);
        info!(path = %path, "Opening realtime stream");

        let request = http.get(&url).header(ACCEPT, "text/event-stream");
        match tokio::time::timeout(config.connect_timeout(), request.send()).await {
            Ok(Ok(response)) if response.status().is_success() => {
                reconnect_delay = config.reconnect_delay_secs;
                if event_tx.send(RealtimeEvent::Connected).await.is_err() {
                    return;
                }

                match read_stream(response, &path, &event_tx).await {
                    StreamEnd::ReceiverGone | StreamEnd::Terminal => return,
                    StreamEnd::Closed => {}
                }

                if event_tx.send(RealtimeEvent::Disconnected).await.is_err() {
                    return;
                }
            }
            Ok(Ok(response)) => {
                let status = response.status();
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                    warn!(path = %path, status = %status, "Realtime stream rejected");
                    let _ = event_tx
                        .send(RealtimeEvent::Cancelled(format!("HTTP {status}")))
                        .await;
                    return;
                }
                error!(path = %path, status = %status, "Realtime stream failed to open");
                if event_tx
                    .send(RealtimeEvent::Error(format!("HTTP {status}")))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Ok(Err(e)) => {
                error!(path = %path, error = %e, "Failed to open realtime stream");
                if event_tx
                    .send(RealtimeEvent::Error(format!("Connection failed: {e}")))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Err(_elapsed) => {
                error!(
                    path = %path,
                    timeout_secs = config.connect_timeout_secs,
                    "Realtime stream timed out"
                );
                if event_tx
                    .send(RealtimeEvent::Error(format!(
                        "Connection timed out after {}s",
                        config.connect_timeout_secs
                    )))
                    .await
                    .is_err()
                {
                    return;
                }
            }
        }

        // Exponential backoff reconnect.
        info!(
            delay = reconnect_delay,
            "Reconnecting in {} seconds", reconnect_delay
        );
        tokio::time::sleep(Duration::from_secs(reconnect_delay)).await;
        reconnect_delay = (reconnect_delay * 2).min(config.max_reconnect_delay_secs);
    }
}

/// Forward events from one open stream until it ends.
async fn read_stream(
    response: reqwest::Response,
    path: &str,
    event_tx: &mpsc::Sender<RealtimeEvent>,
) -> StreamEnd {
    let mut reader = SseReader::from_response(response);
    loop {
        match reader.next_event().await {
            Ok(Some(sse)) => {
                let Some(event) = translate_sse_event(&sse) else {
                    continue;
                };
                let terminal = matches!(
                    event,
                    RealtimeEvent::Cancelled(_) | RealtimeEvent::AuthRevoked
                );
                if terminal {
                    warn!(path = %path, event = ?event, "Realtime stream ended by server");
                }
                if event_tx.send(event).await.is_err() {
                    return StreamEnd::ReceiverGone;
                }
                if terminal {
                    return StreamEnd::Terminal;
                }
            }
            Ok(None) => {
                info!(path = %path, "Realtime stream closed by server");
                return StreamEnd::Closed;
            }
            Err(e) => {
                debug!(path = %path, error = %e, "Realtime stream read error");
                if event_tx
                    .send(RealtimeEvent::Error(format!("Stream read failed: {e}")))
                    .await
                    .is_err()
                {
                    return StreamEnd::ReceiverGone;
                }
                return StreamEnd::Closed;
            }
        }
    }
}
