//! STOMP chat socket.
//!
//! Speaks STOMP 1.2 over the raw WebSocket transport of the backend's
//! SockJS endpoint (`{base}/ws-chat/websocket`). After `CONNECTED` the
//! socket subscribes once to the per-user inbound queue; outbound
//! messages go to a fixed destination while connected.

mod client;
mod connection;
mod frame;
mod types;


pub use client::ChatSocket;
pub use frame::{Command, Frame, FrameError};
pub use types::{ConnectionState, Credentials, SocketEvent, SocketSettings};
