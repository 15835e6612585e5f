//! STOMP 1.2 frame encoding and decoding.

use std::fmt;

use thiserror::Error;

/// Frame commands used by the chat socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Disconnect => "DISCONNECT",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "CONNECT" | "STOMP" => Command::Connect,
            "CONNECTED" => Command::Connected,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            "DISCONNECT" => Command::Disconnect,
            _ => return None,
        })
    }

    /// CONNECT and CONNECTED headers are never escaped.
    fn escapes_headers(self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("malformed header line: {0}")]
    MalformedHeader(String),
    #[error("invalid escape sequence in header: {0}")]
    InvalidEscape(String),
    #[error("frame is missing its header terminator")]
    Truncated,
}

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of header `name`; repeated headers keep the first.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Serialize, including the trailing NUL.
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(32 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Decode every frame in one WebSocket message. Heart-beat EOLs
    /// between frames are skipped.
    pub fn decode_all(text: &str) -> Result<Vec<Frame>, FrameError> {
        let mut frames = Vec::new();
        for chunk in text.split('\0') {
            let chunk = chunk.trim_start_matches(['\r', '\n']);
            if chunk.is_empty() {
                continue;
            }
            frames.push(Self::decode_one(chunk)?);
        }
        Ok(frames)
    }

    fn decode_one(chunk: &str) -> Result<Frame, FrameError> {
        let (head, body) = split_head(chunk).ok_or(FrameError::Truncated)?;
        let mut lines = head.lines();
        let command_line = lines.next().unwrap_or_default().trim_end_matches('\r');
        let command = Command::parse(command_line)
            .ok_or_else(|| FrameError::UnknownCommand(command_line.to_string()))?;

        let escaped = command.escapes_headers();
        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
            if escaped {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let mut frame = Frame {
            command,
            headers,
            body: String::new(),
        };
        let body = match frame.get("content-length").and_then(|l| l.parse::<usize>().ok()) {
            Some(len) if len <= body.len() && body.is_char_boundary(len) => &body[..len],
            _ => body,
        };
        frame.body = body.to_string();
        Ok(frame)
    }
}

/// Split at the blank line ending the headers.
fn split_head(chunk: &str) -> Option<(&str, &str)> {
    if let Some(idx) = chunk.find("\n\n") {
        return Some((&chunk[..idx], &chunk[idx + 2..]));
    }
    chunk
        .find("\r\n\r\n")
        .map(|idx| (&chunk[..idx], &chunk[idx + 4..]))
}

fn escape_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(s: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(FrameError::InvalidEscape(s.to_string())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_connect_without_escaping() {
        let frame = Frame::new(Command::Connect)
            .header("accept-version", "1.2,1.1,1.0")
            .header("Authorization", "Bearer a:b");
        assert_eq!(
            frame.encode(),
            "CONNECT\naccept-version:1.2,1.1,1.0\nAuthorization:Bearer a:b\n\n\0"
        );
    }

    #[test]
    fn encodes_send_with_escaped_headers() {
        let frame = Frame::new(Command::Send)
            .header("destination", "/app/chat.send")
            .header("note", "a:b\nc")
            .body("{}");
        assert_eq!(
            frame.encode(),
            "SEND\ndestination:/app/chat.send\nnote:a\\cb\\nc\n\n{}\0"
        );
    }

    #[test]
    fn decodes_message() {
        let text = "MESSAGE\ndestination:/user/queue/messages\nsubscription:sub-0\nmessage-id:1\n\n{\"text\":\"hi\"}\0";
        let frames = Frame::decode_all(text).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, Command::Message);
        assert_eq!(frames[0].get("subscription"), Some("sub-0"));
        assert_eq!(frames[0].body, "{\"text\":\"hi\"}");
    }

    #[test]
    fn decodes_multiple_frames_and_heartbeats() {
        let text = "\nCONNECTED\nversion:1.2\n\n\0\r\nRECEIPT\nreceipt-id:7\n\n\0\n";
        let frames = Frame::decode_all(text).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].command, Command::Connected);
        assert_eq!(frames[1].get("receipt-id"), Some("7"));
    }

    #[test]
    fn heartbeat_only_yields_nothing() {
        assert!(Frame::decode_all("\n").unwrap().is_empty());
    }

    #[test]
    fn unescapes_headers() {
        let frames = Frame::decode_all("ERROR\nmessage:bad\\cthing\\\\x\n\nboom\0").unwrap();
        assert_eq!(frames[0].get("message"), Some("bad:thing\\x"));
        assert_eq!(frames[0].body, "boom");
    }

    #[test]
    fn honors_content_length() {
        let frames = Frame::decode_all("MESSAGE\ncontent-length:2\n\nhi there\0").unwrap();
        assert_eq!(frames[0].body, "hi");
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(
            Frame::decode_all("HELLO\n\n\0"),
            Err(FrameError::UnknownCommand("HELLO".into()))
        );
        assert_eq!(
            Frame::decode_all("MESSAGE\nbroken\n\n\0"),
            Err(FrameError::MalformedHeader("broken".into()))
        );
        assert_eq!(Frame::decode_all("MESSAGE\nx:y\0"), Err(FrameError::Truncated));
    }
}
