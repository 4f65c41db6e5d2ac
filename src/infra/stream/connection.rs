//! State of one live stream: the current transport, when it last delivered a
//! message, and whether the owner wants it open.

use std::fmt;
use std::rc::Rc;
use std::time::Instant;

/// Transport ready state, numbered like the browser `EventSource` states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
}

impl ReadyState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ReadyState::Connecting),
            1 => Some(ReadyState::Open),
            2 => Some(ReadyState::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReadyState::Connecting => "connecting",
            ReadyState::Open => "open",
            ReadyState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// A live event transport as seen by the staleness monitor.
pub trait Transport {
    fn ready_state(&self) -> ReadyState;
    fn close(&self);
}

#[derive(Default)]
pub struct StreamConnection {
    transport: Option<Rc<dyn Transport>>,
    last_message_at: Option<Instant>,
    desired_open: bool,
}

impl StreamConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `transport` and marks the connection as wanted. The message
    /// clock starts at `now` so a quiet but healthy stream is not a zombie
    /// right away.
    pub fn connect(&mut self, transport: Rc<dyn Transport>, now: Instant) {
        self.replace(transport, now);
        self.desired_open = true;
    }

    /// Swaps in a fresh transport, closing the previous one.
    pub fn replace(&mut self, transport: Rc<dyn Transport>, now: Instant) {
        if let Some(old) = self.transport.replace(transport) {
            old.close();
        }
        self.last_message_at = Some(now);
    }

    pub fn disconnect(&mut self) {
        self.desired_open = false;
        if let Some(old) = self.transport.take() {
            old.close();
        }
    }

    pub fn record_message(&mut self, now: Instant) {
        self.last_message_at = Some(now);
    }

    pub fn transport(&self) -> Option<Rc<dyn Transport>> {
        self.transport.clone()
    }

    pub fn last_message_at(&self) -> Option<Instant> {
        self.last_message_at
    }

    pub fn desired_open(&self) -> bool {
        self.desired_open
    }
}
