//! Live application stream: event-stream framing, connection state, the
//! visibility-driven staleness monitor and the reconnecting watch client.

pub mod client;
pub mod connection;
pub mod monitor;
pub mod sse;

pub use client::{EventSourceConnector, ReconnectHandle, WatchQuery, WatchStreamClient};
pub use connection::{ReadyState, StreamConnection, Transport};
pub use monitor::{VisibilityRecovery, ZOMBIE_THRESHOLD, init_visibility_recovery, is_zombie};
pub use sse::{SseDecoder, SseFrame, decode_watch_event};
