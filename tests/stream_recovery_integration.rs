use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use syncview::infra::host::{Clock, ManualHost, Visibility};
use syncview::infra::stream::{
    ReadyState, StreamConnection, Transport, ZOMBIE_THRESHOLD, init_visibility_recovery,
    is_zombie,
};

struct ScriptedTransport {
    state: Cell<ReadyState>,
    closes: Cell<usize>,
}

impl ScriptedTransport {
    fn new(state: ReadyState) -> Rc<Self> {
        Rc::new(Self {
            state: Cell::new(state),
            closes: Cell::new(0),
        })
    }
}

impl Transport for ScriptedTransport {
    fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    fn close(&self) {
        self.closes.set(self.closes.get() + 1);
        self.state.set(ReadyState::Closed);
    }
}

/// Connection with a monitor whose reconnect swaps in a fresh open transport.
struct Harness {
    host: Rc<ManualHost>,
    connection: Rc<RefCell<StreamConnection>>,
    reconnects: Rc<Cell<usize>>,
}

impl Harness {
    fn zombie(&self, visibility: Visibility) -> bool {
        let connection = self.connection.borrow();
        is_zombie(
            visibility,
            connection.transport().map(|t| t.ready_state()),
            connection.last_message_at(),
            self.host.now(),
            ZOMBIE_THRESHOLD,
        )
    }

    fn new() -> (Self, syncview::infra::stream::VisibilityRecovery) {
        let host = ManualHost::new();
        let connection = Rc::new(RefCell::new(StreamConnection::new()));
        let reconnects = Rc::new(Cell::new(0));

        let transport_of = Rc::clone(&connection);
        let last_of = Rc::clone(&connection);
        let target = Rc::clone(&connection);
        let clock = Rc::clone(&host);
        let count = Rc::clone(&reconnects);
        let recovery = init_visibility_recovery(
            host.clone(),
            move || transport_of.borrow().transport(),
            move || last_of.borrow().last_message_at(),
            move || {
                count.set(count.get() + 1);
                target
                    .borrow_mut()
                    .replace(ScriptedTransport::new(ReadyState::Open), clock.now());
            },
            ZOMBIE_THRESHOLD,
        );
        (
            Self {
                host,
                connection,
                reconnects,
            },
            recovery,
        )
    }

    fn attach(&self, state: ReadyState) -> Rc<ScriptedTransport> {
        let transport = ScriptedTransport::new(state);
        self.connection
            .borrow_mut()
            .connect(transport.clone(), self.host.now());
        transport
    }

    fn hide_then_show(&self) {
        self.host.set_visibility(Visibility::Hidden);
        self.host.set_visibility(Visibility::Visible);
    }
}

#[test]
fn stale_open_stream_reconnects_once_on_becoming_visible() {
    let (harness, _recovery) = Harness::new();
    let zombie = harness.attach(ReadyState::Open);

    harness.host.advance(Duration::from_secs(121));
    harness.hide_then_show();

    assert_eq!(harness.reconnects.get(), 1);
    assert_eq!(zombie.closes.get(), 1, "the dead transport is closed");
    let fresh = harness.connection.borrow().transport().expect("replacement");
    assert_eq!(fresh.ready_state(), ReadyState::Open);
    assert!(harness.connection.borrow().desired_open());

    // The replacement starts its own silence clock.
    harness.hide_then_show();
    assert_eq!(harness.reconnects.get(), 1);
}

#[test]
fn hidden_page_never_reconnects() {
    let (harness, _recovery) = Harness::new();
    harness.attach(ReadyState::Open);
    harness.host.advance(Duration::from_secs(600));

    harness.host.set_visibility(Visibility::Hidden);
    assert_eq!(harness.reconnects.get(), 0);
    assert!(!harness.zombie(Visibility::Hidden));
    assert!(harness.zombie(Visibility::Visible));
}

#[test]
fn recent_traffic_keeps_the_stream() {
    let (harness, _recovery) = Harness::new();
    harness.attach(ReadyState::Open);

    harness.host.advance(Duration::from_secs(110));
    harness
        .connection
        .borrow_mut()
        .record_message(harness.host.now());
    harness.host.advance(Duration::from_secs(110));
    harness.hide_then_show();

    assert_eq!(harness.reconnects.get(), 0);
}

#[test]
fn silence_exactly_at_threshold_is_not_stale() {
    let (harness, _recovery) = Harness::new();
    harness.attach(ReadyState::Open);

    harness.host.advance(ZOMBIE_THRESHOLD);
    harness.hide_then_show();
    assert_eq!(harness.reconnects.get(), 0);

    harness.host.advance(Duration::from_millis(1));
    harness.hide_then_show();
    assert_eq!(harness.reconnects.get(), 1);
}

#[test]
fn closed_or_connecting_stream_reconnects_regardless_of_age() {
    for state in [ReadyState::Closed, ReadyState::Connecting] {
        let (harness, _recovery) = Harness::new();
        harness.attach(state);
        harness.hide_then_show();
        assert_eq!(harness.reconnects.get(), 1, "state {state}");
    }
}

#[test]
fn no_transport_means_nothing_to_recover() {
    let (harness, _recovery) = Harness::new();
    harness.host.advance(Duration::from_secs(600));
    harness.hide_then_show();
    assert_eq!(harness.reconnects.get(), 0);
}

#[test]
fn disposed_monitor_stops_listening() {
    let (harness, recovery) = Harness::new();
    harness.attach(ReadyState::Closed);
    assert_eq!(harness.host.visibility_listener_count(), 1);

    recovery.dispose();
    assert_eq!(harness.host.visibility_listener_count(), 0);

    harness.hide_then_show();
    assert_eq!(harness.reconnects.get(), 0);
}

#[test]
fn dropping_the_registration_also_unsubscribes() {
    let (harness, recovery) = Harness::new();
    drop(recovery);
    assert_eq!(harness.host.visibility_listener_count(), 0);

    let started: Instant = harness.host.now();
    harness.attach(ReadyState::Open);
    harness.host.advance(Duration::from_secs(300));
    harness.hide_then_show();
    assert_eq!(harness.reconnects.get(), 0);
    assert!(harness.zombie(Visibility::Visible));
    assert_eq!(
        harness.connection.borrow().last_message_at(),
        Some(started)
    );
}
