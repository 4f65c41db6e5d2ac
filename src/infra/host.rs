//! Host capabilities injected into the diff queue and the stream monitor.
//!
//! Everything that would otherwise reach for wall-clock time, idle callbacks or
//! page visibility goes through these traits, so the same logic runs on a Tokio
//! `LocalSet` in production and on [`ManualHost`] in tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

pub trait Clock {
    fn now(&self) -> Instant;
}

pub type IdleTask = Box<dyn FnOnce()>;

/// Defers work until the host has nothing more urgent to do.
pub trait IdleScheduler: Clock {
    fn request_idle(&self, task: IdleTask);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

pub type ListenerId = u64;

/// Page/window visibility notifications.
pub trait VisibilityHost: Clock {
    fn visibility(&self) -> Visibility;
    fn add_visibility_listener(&self, listener: Rc<dyn Fn()>) -> ListenerId;
    /// Returns `false` when the id was not registered.
    fn remove_visibility_listener(&self, id: ListenerId) -> bool;
}

/// Visibility state plus its listeners. Shared by the concrete hosts.
pub struct VisibilityRegistry {
    state: Cell<Visibility>,
    listeners: RefCell<Vec<(ListenerId, Rc<dyn Fn()>)>>,
    next_id: Cell<ListenerId>,
}

impl Default for VisibilityRegistry {
    fn default() -> Self {
        Self {
            state: Cell::new(Visibility::Visible),
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }
}

impl VisibilityRegistry {
    pub fn state(&self) -> Visibility {
        self.state.get()
    }

    pub fn add(&self, listener: Rc<dyn Fn()>) -> ListenerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Updates the state and notifies listeners when it actually changed.
    pub fn set(&self, next: Visibility) {
        if self.state.replace(next) == next {
            return;
        }
        // Listeners may add or remove registrations while running.
        let snapshot: Vec<Rc<dyn Fn()>> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in snapshot {
            listener();
        }
    }
}

/// Deterministic host: manual clock, manual idle queue, settable visibility.
pub struct ManualHost {
    base: Instant,
    offset: Cell<Duration>,
    idle: RefCell<VecDeque<IdleTask>>,
    visibility: VisibilityRegistry,
}

impl Default for ManualHost {
    fn default() -> Self {
        Self {
            base: Instant::now(),
            offset: Cell::new(Duration::ZERO),
            idle: RefCell::new(VecDeque::new()),
            visibility: VisibilityRegistry::default(),
        }
    }
}

impl ManualHost {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    pub fn pending_idle(&self) -> usize {
        self.idle.borrow().len()
    }

    /// Runs one idle period: the tasks queued before this call. Tasks they
    /// schedule wait for the next period. Returns how many tasks ran.
    pub fn run_idle(&self) -> usize {
        let batch: Vec<IdleTask> = self.idle.borrow_mut().drain(..).collect();
        let ran = batch.len();
        for task in batch {
            task();
        }
        ran
    }

    /// Runs idle periods until nothing is queued. Returns the number of periods.
    pub fn run_until_idle(&self) -> usize {
        let mut periods = 0;
        while self.run_idle() > 0 {
            periods += 1;
        }
        periods
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        self.visibility.set(visibility);
    }

    pub fn visibility_listener_count(&self) -> usize {
        self.visibility.len()
    }
}

impl Clock for ManualHost {
    fn now(&self) -> Instant {
        self.base + self.offset.get()
    }
}

impl IdleScheduler for ManualHost {
    fn request_idle(&self, task: IdleTask) {
        self.idle.borrow_mut().push_back(task);
    }
}

impl VisibilityHost for ManualHost {
    fn visibility(&self) -> Visibility {
        self.visibility.state()
    }

    fn add_visibility_listener(&self, listener: Rc<dyn Fn()>) -> ListenerId {
        self.visibility.add(listener)
    }

    fn remove_visibility_listener(&self, id: ListenerId) -> bool {
        self.visibility.remove(id)
    }
}

/// Host backed by the Tokio runtime.
///
/// `request_idle` spawns onto the current `LocalSet` after yielding once, so it
/// must be used from inside `LocalSet::run_until` (or a `spawn_local` task).
/// Visibility starts as visible; embedders forward focus/resume notifications
/// through [`TokioHost::set_visibility`].
#[derive(Default)]
pub struct TokioHost {
    visibility: VisibilityRegistry,
}

impl TokioHost {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        self.visibility.set(visibility);
    }
}

impl Clock for TokioHost {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl IdleScheduler for TokioHost {
    fn request_idle(&self, task: IdleTask) {
        tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            task();
        });
    }
}

impl VisibilityHost for TokioHost {
    fn visibility(&self) -> Visibility {
        self.visibility.state()
    }

    fn add_visibility_listener(&self, listener: Rc<dyn Fn()>) -> ListenerId {
        self.visibility.add(listener)
    }

    fn remove_visibility_listener(&self, id: ListenerId) -> bool {
        self.visibility.remove(id)
    }
}
