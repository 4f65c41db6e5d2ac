//! Application watch-stream client.
//!
//! Opens the event stream, feeds decoded watch events to a sink and keeps the
//! stream alive: it resubscribes when the server completes the stream, retries
//! after a fixed delay on errors, and reconnects on demand.

use super::connection::{ReadyState, StreamConnection, Transport};
use super::monitor::{VisibilityRecovery, ZOMBIE_THRESHOLD, init_visibility_recovery};
use super::sse::{SseDecoder, decode_watch_event};
use crate::domain::{StreamError, WatchEvent};
use crate::infra::app_config::StreamConfig;
use crate::infra::host::{Clock, VisibilityHost};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::LocalBoxStream;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub const STREAM_PATH: &str = "/api/v1/stream/applications";
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

pub type ByteStream = LocalBoxStream<'static, Result<Vec<u8>, StreamError>>;

/// Filters of the application watch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchQuery {
    pub name: Option<String>,
    pub projects: Vec<String>,
    pub selector: Option<String>,
    pub app_namespace: Option<String>,
    /// Resume point; updated from every received event.
    pub resource_version: Option<String>,
}

impl WatchQuery {
    pub fn path(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(name) = &self.name {
            query.append_pair("name", name);
        }
        for project in &self.projects {
            query.append_pair("projects", project);
        }
        if let Some(selector) = &self.selector {
            query.append_pair("selector", selector);
        }
        if let Some(ns) = &self.app_namespace {
            query.append_pair("appNamespace", ns);
        }
        if let Some(rv) = &self.resource_version {
            query.append_pair("resourceVersion", rv);
        }
        let query = query.finish();
        if query.is_empty() {
            STREAM_PATH.to_string()
        } else {
            format!("{STREAM_PATH}?{query}")
        }
    }
}

/// Opens raw event-stream bodies. Implemented over whatever HTTP client the
/// embedder uses.
#[async_trait(?Send)]
pub trait EventSourceConnector {
    async fn open(&self, path: &str) -> Result<ByteStream, StreamError>;
}

/// Forces the running client to drop its stream and reconnect.
///
/// A trigger while the client is connecting or waiting to retry starts a new
/// attempt right away. Triggers are not counted: several before the client
/// wakes up force one reconnect.
#[derive(Clone, Default)]
pub struct ReconnectHandle(Rc<Notify>);

impl ReconnectHandle {
    pub fn trigger(&self) {
        self.0.notify_one();
    }
}

/// Status of one connection attempt, as seen by the staleness monitor.
pub struct AttemptTransport {
    state: Cell<ReadyState>,
    cancel: CancellationToken,
}

impl AttemptTransport {
    fn new(cancel: CancellationToken) -> Rc<Self> {
        Rc::new(Self {
            state: Cell::new(ReadyState::Connecting),
            cancel,
        })
    }
}

impl Transport for AttemptTransport {
    fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    fn close(&self) {
        self.state.set(ReadyState::Closed);
        self.cancel.cancel();
    }
}

enum Outcome {
    Completed,
    Forced,
    Failed(StreamError),
}

pub struct WatchStreamClient {
    connector: Rc<dyn EventSourceConnector>,
    clock: Rc<dyn Clock>,
    query: RefCell<WatchQuery>,
    connection: Rc<RefCell<StreamConnection>>,
    reconnect: ReconnectHandle,
    retry_delay: Duration,
    zombie_threshold: Duration,
}

impl WatchStreamClient {
    pub fn new(connector: Rc<dyn EventSourceConnector>, clock: Rc<dyn Clock>, query: WatchQuery) -> Self {
        Self {
            connector,
            clock,
            query: RefCell::new(query),
            connection: Rc::new(RefCell::new(StreamConnection::new())),
            reconnect: ReconnectHandle::default(),
            retry_delay: RETRY_DELAY,
            zombie_threshold: ZOMBIE_THRESHOLD,
        }
    }

    /// Client using the timings of the `[stream]` config section.
    pub fn from_config(
        connector: Rc<dyn EventSourceConnector>,
        clock: Rc<dyn Clock>,
        query: WatchQuery,
        config: &StreamConfig,
    ) -> Self {
        Self::new(connector, clock, query)
            .with_retry_delay(config.retry_delay())
            .with_zombie_threshold(config.zombie_threshold())
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_zombie_threshold(mut self, threshold: Duration) -> Self {
        self.zombie_threshold = threshold;
        self
    }

    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    pub fn zombie_threshold(&self) -> Duration {
        self.zombie_threshold
    }

    pub fn query(&self) -> WatchQuery {
        self.query.borrow().clone()
    }

    pub fn connection(&self) -> Rc<RefCell<StreamConnection>> {
        Rc::clone(&self.connection)
    }

    pub fn reconnect_handle(&self) -> ReconnectHandle {
        self.reconnect.clone()
    }

    /// Wires the staleness monitor to this client's connection.
    pub fn visibility_recovery(&self, host: Rc<dyn VisibilityHost>) -> VisibilityRecovery {
        let transport = Rc::clone(&self.connection);
        let last = Rc::clone(&self.connection);
        let reconnect = self.reconnect.clone();
        init_visibility_recovery(
            host,
            move || transport.borrow().transport(),
            move || last.borrow().last_message_at(),
            move || reconnect.trigger(),
            self.zombie_threshold,
        )
    }

    /// Runs until `cancel` fires.
    pub async fn run(&self, mut sink: impl FnMut(WatchEvent), cancel: CancellationToken) {
        let mut decoder = SseDecoder::new();

        'outer: loop {
            if cancel.is_cancelled() {
                break;
            }
            let path = self.query.borrow().path();
            let transport = AttemptTransport::new(cancel.child_token());
            self.connection
                .borrow_mut()
                .connect(transport.clone(), self.clock.now());
            decoder.reset();

            let opened = tokio::select! {
                _ = cancel.cancelled() => break 'outer,
                _ = transport.cancel.cancelled() => None,
                _ = self.reconnect.0.notified() => None,
                opened = self.connector.open(&path) => Some(opened),
            };
            let outcome = match opened {
                None => Outcome::Forced,
                Some(Err(err)) => Outcome::Failed(err),
                Some(Ok(mut stream)) => {
                    transport.state.set(ReadyState::Open);
                    log::debug!("watch stream open: {path}");
                    loop {
                        tokio::select! {
                            _ = cancel.cancelled() => break 'outer,
                            _ = transport.cancel.cancelled() => break Outcome::Forced,
                            _ = self.reconnect.0.notified() => break Outcome::Forced,
                            chunk = stream.next() => match chunk {
                                Some(Ok(bytes)) => self.deliver(&mut decoder, &bytes, &mut sink),
                                Some(Err(err)) => break Outcome::Failed(err),
                                None => break Outcome::Completed,
                            },
                        }
                    }
                }
            };
            transport.state.set(ReadyState::Closed);

            match outcome {
                Outcome::Completed => log::info!("watch stream completed, resubscribing"),
                Outcome::Forced => log::info!("watch stream reconnect requested"),
                Outcome::Failed(err) => {
                    log::warn!(
                        "watch stream failed: {err}; retrying in {} ms",
                        self.retry_delay.as_millis()
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break 'outer,
                        _ = self.reconnect.0.notified() => {
                            log::info!("watch stream reconnect requested during retry delay");
                        }
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }

        self.connection.borrow_mut().disconnect();
    }

    fn deliver(&self, decoder: &mut SseDecoder, bytes: &[u8], sink: &mut impl FnMut(WatchEvent)) {
        for frame in decoder.push(bytes) {
            self.connection.borrow_mut().record_message(self.clock.now());
            let Some(event) = decode_watch_event(&frame.data) else {
                continue;
            };
            if let Some(rv) = &event.application.metadata.resource_version {
                self.query.borrow_mut().resource_version = Some(rv.clone());
            }
            sink(event);
        }
    }
}
