//! Translates raw SSE events from the streaming endpoint into `RealtimeEvent`s.

use serde::Deserialize;
use tracing::{debug, trace, warn};

use super::sse::SseEvent;
use super::types::RealtimeEvent;

/// Body of a `put` or `patch` event.
#[derive(Debug, Deserialize)]
struct PathData {
    path: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Map one SSE event to a realtime event. Keep-alives and unknown event
/// types yield `None`.
pub(crate) fn translate_sse_event(event: &SseEvent) -> Option<RealtimeEvent> {
    let kind = event.event.as_deref().unwrap_or("message");
    match kind {
        "put" | "patch" => match serde_json::from_str::<PathData>(&event.data) {
            Ok(body) if kind == "put" => Some(RealtimeEvent::Put {
                path: body.path,
                data: body.data,
            }),
            Ok(body) => Some(RealtimeEvent::Patch {
                path: body.path,
                data: body.data,
            }),
            Err(e) => {
                warn!(event = kind, error = %e, "Malformed realtime payload");
                None
            }
        },
        "keep-alive" => {
            trace!("Realtime keep-alive");
            None
        }
        "cancel" => Some(RealtimeEvent::Cancelled(reason(&event.data))),
        "auth_revoked" => Some(RealtimeEvent::AuthRevoked),
        other => {
            debug!(event = %other, "Unhandled realtime event");
            None
        }
    }
}

/// Cancel payloads are either a JSON string or raw text.
fn reason(data: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(data) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(serde_json::Value::Null) => "cancelled".into(),
        _ if data.trim().is_empty() => "cancelled".into(),
        _ => data.to_string(),
    }
}
