//! Reconnects a silently dead stream when the page becomes visible again.
//!
//! Hidden pages are throttled by the host and intermediaries drop idle
//! connections, so a transport can report `Open` long after it stopped
//! delivering anything. The check runs only on visibility changes.

use super::connection::{ReadyState, Transport};
use crate::infra::host::{ListenerId, Visibility, VisibilityHost};
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

pub const ZOMBIE_THRESHOLD: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    Skip,
    Reconnect,
}

/// Visible, open, and silent for longer than `threshold`. A transport that
/// never delivered anything counts as silent.
pub fn is_zombie(
    visibility: Visibility,
    state: Option<ReadyState>,
    last_message: Option<Instant>,
    now: Instant,
    threshold: Duration,
) -> bool {
    visibility == Visibility::Visible
        && state == Some(ReadyState::Open)
        && last_message.is_none_or(|at| now.saturating_duration_since(at) > threshold)
}

/// Decision taken on one visibility change: reconnect a visible stream that is
/// not open or is a zombie.
pub fn recovery_action(
    visibility: Visibility,
    state: Option<ReadyState>,
    last_message: Option<Instant>,
    now: Instant,
    threshold: Duration,
) -> RecoveryAction {
    if visibility != Visibility::Visible {
        return RecoveryAction::Skip;
    }
    match state {
        None => RecoveryAction::Skip,
        Some(ReadyState::Open) if !is_zombie(visibility, state, last_message, now, threshold) => {
            RecoveryAction::Skip
        }
        Some(_) => RecoveryAction::Reconnect,
    }
}

/// Registration of the visibility listener. Dropping it or calling
/// [`VisibilityRecovery::dispose`] removes the listener exactly once.
pub struct VisibilityRecovery {
    host: Weak<dyn VisibilityHost>,
    id: Option<ListenerId>,
}

impl VisibilityRecovery {
    pub fn dispose(mut self) {
        self.remove();
    }

    pub fn is_active(&self) -> bool {
        self.id.is_some()
    }

    fn remove(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Some(host) = self.host.upgrade() {
            host.remove_visibility_listener(id);
        }
    }
}

impl Drop for VisibilityRecovery {
    fn drop(&mut self) {
        self.remove();
    }
}

pub fn init_visibility_recovery(
    host: Rc<dyn VisibilityHost>,
    get_transport: impl Fn() -> Option<Rc<dyn Transport>> + 'static,
    get_last_message: impl Fn() -> Option<Instant> + 'static,
    reconnect: impl Fn() + 'static,
    threshold: Duration,
) -> VisibilityRecovery {
    let weak = Rc::downgrade(&host);
    let listener_host = weak.clone();
    let id = host.add_visibility_listener(Rc::new(move || {
        let Some(host) = listener_host.upgrade() else {
            return;
        };
        let state = get_transport().map(|t| t.ready_state());
        let last = get_last_message();
        let now = host.now();
        if recovery_action(host.visibility(), state, last, now, threshold) == RecoveryAction::Reconnect {
            let silent = last.map(|at| now.saturating_duration_since(at).as_secs());
            log::info!(
                "page visible with stale stream (state: {}, silent for {}s), reconnecting",
                state.map_or_else(|| "none".to_string(), |s| s.to_string()),
                silent.unwrap_or_default()
            );
            reconnect();
        }
    }));

    VisibilityRecovery {
        host: weak,
        id: Some(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::host::{Clock, ManualHost};
    use crate::infra::stream::connection::fake::FakeTransport;
    use std::cell::{Cell, RefCell};

    struct Fixture {
        host: Rc<ManualHost>,
        transport: Rc<RefCell<Option<Rc<FakeTransport>>>>,
        last: Rc<Cell<Option<Instant>>>,
        reconnects: Rc<Cell<usize>>,
    }

    fn fixture() -> (Fixture, VisibilityRecovery) {
        let host = ManualHost::new();
        let transport: Rc<RefCell<Option<Rc<FakeTransport>>>> = Rc::new(RefCell::new(None));
        let last = Rc::new(Cell::new(None));
        let reconnects = Rc::new(Cell::new(0));

        let t = Rc::clone(&transport);
        let l = Rc::clone(&last);
        let r = Rc::clone(&reconnects);
        let recovery = init_visibility_recovery(
            host.clone(),
            move || t.borrow().clone().map(|t| t as Rc<dyn Transport>),
            move || l.get(),
            move || r.set(r.get() + 1),
            ZOMBIE_THRESHOLD,
        );
        (
            Fixture {
                host,
                transport,
                last,
                reconnects,
            },
            recovery,
        )
    }

    fn flip_visible(host: &ManualHost) {
        host.set_visibility(Visibility::Hidden);
        host.set_visibility(Visibility::Visible);
    }

    #[test]
    fn test_no_transport_does_nothing() {
        let (fx, _recovery) = fixture();
        flip_visible(&fx.host);
        assert_eq!(fx.reconnects.get(), 0);
    }

    #[test]
    fn test_closed_transport_reconnects() {
        let (fx, _recovery) = fixture();
        *fx.transport.borrow_mut() = Some(FakeTransport::new(ReadyState::Closed));
        flip_visible(&fx.host);
        assert_eq!(fx.reconnects.get(), 1);
    }

    #[test]
    fn test_open_transport_reconnects_only_when_stale() {
        let (fx, _recovery) = fixture();
        *fx.transport.borrow_mut() = Some(FakeTransport::new(ReadyState::Open));
        fx.last.set(Some(fx.host.now()));

        fx.host.advance(Duration::from_secs(60));
        flip_visible(&fx.host);
        assert_eq!(fx.reconnects.get(), 0);

        fx.host.advance(Duration::from_secs(61));
        fx.host.set_visibility(Visibility::Hidden);
        assert_eq!(fx.reconnects.get(), 0);
        fx.host.set_visibility(Visibility::Visible);
        assert_eq!(fx.reconnects.get(), 1);
    }

    #[test]
    fn test_dispose_removes_listener_once() {
        let (fx, recovery) = fixture();
        assert_eq!(fx.host.visibility_listener_count(), 1);
        assert!(recovery.is_active());
        recovery.dispose();
        assert_eq!(fx.host.visibility_listener_count(), 0);

        *fx.transport.borrow_mut() = Some(FakeTransport::new(ReadyState::Closed));
        flip_visible(&fx.host);
        assert_eq!(fx.reconnects.get(), 0);
    }

    #[test]
    fn test_drop_removes_listener() {
        let (fx, recovery) = fixture();
        drop(recovery);
        assert_eq!(fx.host.visibility_listener_count(), 0);
    }

    #[test]
    fn test_recovery_action_table() {
        use Visibility::{Hidden, Visible};
        let now = Instant::now();
        let fresh = Some(now);
        let stale = now.checked_sub(Duration::from_secs(121));
        let th = ZOMBIE_THRESHOLD;
        let open = Some(ReadyState::Open);

        assert_eq!(
            recovery_action(Hidden, Some(ReadyState::Closed), stale, now, th),
            RecoveryAction::Skip
        );
        assert_eq!(recovery_action(Visible, None, stale, now, th), RecoveryAction::Skip);
        assert_eq!(
            recovery_action(Visible, Some(ReadyState::Connecting), fresh, now, th),
            RecoveryAction::Reconnect
        );
        assert_eq!(recovery_action(Visible, open, fresh, now, th), RecoveryAction::Skip);
        if stale.is_some() {
            assert_eq!(recovery_action(Visible, open, stale, now, th), RecoveryAction::Reconnect);
        }
        assert_eq!(recovery_action(Visible, open, None, now, th), RecoveryAction::Reconnect);
    }

    #[test]
    fn test_zombie_needs_visible_open_and_silent() {
        use Visibility::{Hidden, Visible};
        let t0 = Instant::now();
        let open = Some(ReadyState::Open);
        let th = ZOMBIE_THRESHOLD;
        let later = t0 + Duration::from_secs(121);

        assert!(is_zombie(Visible, open, Some(t0), later, th));
        assert!(!is_zombie(Hidden, open, Some(t0), later, th));
        assert!(!is_zombie(Visible, open, Some(t0), t0 + th, th));
        assert!(!is_zombie(Visible, Some(ReadyState::Connecting), Some(t0), later, th));
        assert!(!is_zombie(Visible, None, Some(t0), later, th));
        assert!(is_zombie(Visible, open, None, t0, th));
    }
}
