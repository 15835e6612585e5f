//! Realtime database access.
//!
//! A [`RealtimeSource`] hands out per-path listeners that emit the
//! database's `put`/`patch` event stream. [`RealtimeClient`] streams over
//! the REST endpoint (Server-Sent Events) with auto-reconnect and backoff;
//! [`MemorySource`] serves the same protocol from memory.

mod client;
mod connection;
mod handler;
mod memory;
mod source;
mod sse;
pub(crate) mod tree;
mod types;

pub use client::RealtimeClient;
pub use memory::MemorySource;
pub use source::{Listener, RealtimeSource};
pub use types::{RealtimeConfig, RealtimeEvent};
