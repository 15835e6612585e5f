//! Server-Sent Events reader for the streaming REST endpoint.

use std::pin::Pin;

use futures_util::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio_util::io::StreamReader;

/// A single SSE event parsed from the stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SseEvent {
    /// The event type (`put`, `patch`, `keep-alive`, ...).
    pub event: Option<String>,
    /// The event data, multi-line data joined with `\n`.
    pub data: String,
}

type BoxedReader = Pin<Box<dyn AsyncBufRead + Send>>;

/// Pulls SSE events off a line-oriented reader one at a time.
pub(crate) struct SseReader<R> {
    lines: Lines<R>,
    finished: bool,
}

impl SseReader<BoxedReader> {
    /// Wrap the body of a streaming response.
    pub(crate) fn from_response(response: reqwest::Response) -> Self {
        let byte_stream = response
            .bytes_stream()
            .map(|result| result.map_err(std::io::Error::other));
        let reader: BoxedReader = Box::pin(tokio::io::BufReader::new(StreamReader::new(byte_stream)));
        Self::new(reader)
    }
}

impl<R: AsyncBufRead + Unpin> SseReader<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            finished: false,
        }
    }

    /// Next complete event, or `None` once the stream has ended.
    pub(crate) async fn next_event(&mut self) -> std::io::Result<Option<SseEvent>> {
        if self.finished {
            return Ok(None);
        }

        let mut current_event: Option<String> = None;
        let mut current_data = String::new();

        while let Some(line) = self.lines.next_line().await? {
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if line.is_empty() {
                // Empty line = end of event
                if !current_data.is_empty() || current_event.is_some() {
                    return Ok(Some(SseEvent {
                        event: current_event,
                        data: current_data,
                    }));
                }
                continue;
            }

            if let Some(event_type) = field(line, "event") {
                current_event = Some(event_type.to_string());
            } else if let Some(data) = field(line, "data") {
                if !current_data.is_empty() {
                    current_data.push('\n');
                }
                current_data.push_str(data);
            }
            // Ignore other fields (id:, retry:, comments)
        }

        self.finished = true;
        // Flush any remaining event
        if !current_data.is_empty() {
            return Ok(Some(SseEvent {
                event: current_event,
                data: current_data,
            }));
        }
        Ok(None)
    }
}

/// `name: value` or `name:value`.
fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}
