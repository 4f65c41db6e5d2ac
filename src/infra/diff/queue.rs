//! Cooperative, time-sliced diff work queue.
//!
//! Jobs drain in FIFO order on idle callbacks. After each job the drain step
//! checks how long it has been running; once the slice budget is spent it
//! schedules another idle callback and returns, so a diff view with hundreds of
//! resources never holds the host for longer than one slice.

use super::text::{DEFAULT_CONTEXT_LINES, compute_job};
use crate::domain::{DiffError, DiffJob};
use crate::infra::host::IdleScheduler;
use std::cell::RefCell;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

pub const DEFAULT_TIME_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Budget for one drain step before yielding back to the host.
    pub time_slice: Duration,
    /// Context lines used for compact diffs.
    pub context_lines: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            time_slice: DEFAULT_TIME_SLICE,
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }
}

pub type DiffComputer = Rc<dyn Fn(&DiffJob) -> Result<String, DiffError>>;

enum Slot {
    Pending(Option<Waker>),
    Settled(Result<String, DiffError>),
}

/// Result handle for one enqueued job. Settles at most once.
///
/// A handle whose job was dropped by [`DiffQueue::clear`] or superseded by a
/// newer job with the same id stays pending forever.
#[derive(Clone)]
pub struct DiffHandle {
    id: String,
    slot: Rc<RefCell<Slot>>,
}

impl DiffHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.slot.borrow(), Slot::Pending(_))
    }

    pub fn try_result(&self) -> Option<Result<String, DiffError>> {
        match &*self.slot.borrow() {
            Slot::Pending(_) => None,
            Slot::Settled(result) => Some(result.clone()),
        }
    }
}

impl std::fmt::Debug for DiffHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffHandle")
            .field("id", &self.id)
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl Future for DiffHandle {
    type Output = Result<String, DiffError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.slot.borrow_mut();
        match &mut *slot {
            Slot::Settled(result) => Poll::Ready(result.clone()),
            Slot::Pending(waker) => {
                *waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

fn settle(slot: &Rc<RefCell<Slot>>, result: Result<String, DiffError>) {
    let previous = std::mem::replace(&mut *slot.borrow_mut(), Slot::Settled(result));
    if let Slot::Pending(Some(waker)) = previous {
        waker.wake();
    }
}

struct Entry {
    job: Rc<DiffJob>,
    slot: Rc<RefCell<Slot>>,
}

#[derive(Default)]
struct QueueState {
    jobs: Vec<Entry>,
    cursor: usize,
    enabled: bool,
    tick_scheduled: bool,
}

struct Shared {
    state: RefCell<QueueState>,
    scheduler: Rc<dyn IdleScheduler>,
    computer: DiffComputer,
    config: QueueConfig,
}

/// Time-sliced diff queue. Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct DiffQueue {
    shared: Rc<Shared>,
}

impl DiffQueue {
    /// Queue computing jobs with [`compute_job`].
    pub fn new(scheduler: Rc<dyn IdleScheduler>, config: QueueConfig) -> Self {
        let context_lines = config.context_lines;
        Self::with_computer(
            scheduler,
            config,
            Rc::new(move |job: &DiffJob| compute_job(job, context_lines)),
        )
    }

    pub fn with_computer(
        scheduler: Rc<dyn IdleScheduler>,
        config: QueueConfig,
        computer: DiffComputer,
    ) -> Self {
        Self {
            shared: Rc::new(Shared {
                state: RefCell::new(QueueState::default()),
                scheduler,
                computer,
                config,
            }),
        }
    }

    pub fn config(&self) -> QueueConfig {
        self.shared.config
    }

    /// Appends `job` and returns its handle. A job with the same id that has
    /// not been drained yet is dropped; its handle never settles.
    pub fn enqueue(&self, job: DiffJob) -> DiffHandle {
        let slot = Rc::new(RefCell::new(Slot::Pending(None)));
        let id = job.id.clone();
        let enabled = {
            let mut state = self.shared.state.borrow_mut();
            let cursor = state.cursor;
            if let Some(pos) = state.jobs[cursor..].iter().position(|e| e.job.id == id) {
                state.jobs.remove(cursor + pos);
                log::debug!("diff job {id} superseded before it ran");
            }
            state.jobs.push(Entry {
                job: Rc::new(job),
                slot: Rc::clone(&slot),
            });
            state.enabled
        };
        if enabled {
            schedule(&self.shared);
        }
        DiffHandle { id, slot }
    }

    /// Drops every queued job and resets the cursor. Handles of dropped jobs are
    /// abandoned, not rejected.
    pub fn clear(&self) {
        let mut state = self.shared.state.borrow_mut();
        let dropped = state.jobs.len() - state.cursor;
        state.jobs.clear();
        state.cursor = 0;
        if dropped > 0 {
            log::debug!("diff queue cleared, {dropped} jobs abandoned");
        }
    }

    /// Starts draining. Calling it again while enabled is a no-op.
    pub fn enable(&self) {
        let has_work = {
            let mut state = self.shared.state.borrow_mut();
            state.enabled = true;
            state.cursor < state.jobs.len()
        };
        if has_work {
            schedule(&self.shared);
        }
    }

    /// Stops draining after the job in progress. Queued jobs are kept.
    pub fn disable(&self) {
        self.shared.state.borrow_mut().enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.state.borrow().enabled
    }

    /// Jobs enqueued but not yet drained.
    pub fn pending_len(&self) -> usize {
        let state = self.shared.state.borrow();
        state.jobs.len() - state.cursor
    }
}

fn schedule(shared: &Rc<Shared>) {
    {
        let mut state = shared.state.borrow_mut();
        if state.tick_scheduled {
            return;
        }
        state.tick_scheduled = true;
    }
    let weak: Weak<Shared> = Rc::downgrade(shared);
    shared.scheduler.request_idle(Box::new(move || {
        if let Some(shared) = weak.upgrade() {
            drain(&shared);
        }
    }));
}

fn run_job(computer: &DiffComputer, job: &DiffJob) -> Result<String, DiffError> {
    match catch_unwind(AssertUnwindSafe(|| computer(job))) {
        Ok(result) => result,
        Err(_) => Err(DiffError::Panicked {
            name: job.name.clone(),
        }),
    }
}

fn drain(shared: &Rc<Shared>) {
    {
        let mut state = shared.state.borrow_mut();
        state.tick_scheduled = false;
        if !state.enabled {
            return;
        }
    }

    let started = shared.scheduler.now();
    let mut drained = 0usize;
    loop {
        let (job, slot) = {
            let mut state = shared.state.borrow_mut();
            if state.cursor >= state.jobs.len() {
                state.jobs.clear();
                state.cursor = 0;
                return;
            }
            let entry = &state.jobs[state.cursor];
            let next = (Rc::clone(&entry.job), Rc::clone(&entry.slot));
            state.cursor += 1;
            next
        };

        let result = run_job(&shared.computer, &job);
        if let Err(err) = &result {
            log::warn!("diff for {} failed: {err}", job.name);
        }
        settle(&slot, result);
        drained += 1;

        let (remaining, enabled) = {
            let mut state = shared.state.borrow_mut();
            let remaining = state.cursor < state.jobs.len();
            if !remaining {
                state.jobs.clear();
                state.cursor = 0;
            }
            (remaining, state.enabled)
        };
        if !remaining || !enabled {
            return;
        }

        let elapsed = shared.scheduler.now().saturating_duration_since(started);
        if elapsed >= shared.config.time_slice {
            log::debug!(
                "diff queue yielding after {drained} jobs ({} ms)",
                elapsed.as_millis()
            );
            schedule(shared);
            return;
        }
    }
}
