//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the host hooks defined in
//! `vellum-core`. Hosts construct a [`StdRuntime`] around an
//! [`Environment`](vellum_core::Environment) and drive its
//! [`Application`] from their own event loop.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use vellum_core::{Application, Environment, TickScheduler, ViewError, ViewResult};

/// Receives the application's tick requests and wakes the host loop.
///
/// The application only asks once per batch of dirty signals, so every
/// request here is a tick the host still has to run.
pub struct StdScheduler {
    tick_requested: Cell<bool>,
    scheduled: Cell<u64>,
    tick_waker: RefCell<Option<Rc<dyn Fn()>>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            tick_requested: Cell::new(false),
            scheduled: Cell::new(0),
            tick_waker: RefCell::new(None),
        }
    }

    /// Returns whether a tick has been requested since the last call.
    pub fn take_tick_request(&self) -> bool {
        self.tick_requested.replace(false)
    }

    /// Number of ticks the application has asked for so far.
    pub fn scheduled_ticks(&self) -> u64 {
        self.scheduled.get()
    }

    /// Registers a waker that will be invoked whenever a new tick is scheduled.
    pub fn set_tick_waker(&self, waker: impl Fn() + 'static) {
        *self.tick_waker.borrow_mut() = Some(Rc::new(waker));
    }

    /// Clears any registered tick waker.
    pub fn clear_tick_waker(&self) {
        *self.tick_waker.borrow_mut() = None;
    }

    fn wake(&self) {
        let waker = self.tick_waker.borrow().clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field("tick_requested", &self.tick_requested.get())
            .field("scheduled", &self.scheduled.get())
            .finish()
    }
}

impl TickScheduler for StdScheduler {
    fn schedule_tick(&self) {
        self.tick_requested.set(true);
        self.scheduled.set(self.scheduled.get() + 1);
        self.wake();
    }
}

/// Hands the shared scheduler to the application.
struct SchedulerHandle(Rc<StdScheduler>);

impl TickScheduler for SchedulerHandle {
    fn schedule_tick(&self) {
        self.0.schedule_tick();
    }
}

/// Wall-clock time spent in ticks, measured with [`Instant`].
#[derive(Debug, Default)]
pub struct TickTimer {
    ticks: Cell<u64>,
    last: Cell<Duration>,
    total: Cell<Duration>,
}

impl TickTimer {
    fn time<R>(&self, tick: impl FnOnce() -> R) -> R {
        let started = Instant::now();
        let result = tick();
        let elapsed = started.elapsed();
        self.ticks.set(self.ticks.get() + 1);
        self.last.set(elapsed);
        self.total.set(self.total.get() + elapsed);
        result
    }

    /// Ticks run so far, failed ones included.
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }

    pub fn last_tick(&self) -> Duration {
        self.last.get()
    }

    pub fn total(&self) -> Duration {
        self.total.get()
    }
}

/// Bundles an [`Application`] with the standard scheduler and tick timer.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Rc<StdScheduler>,
    timer: Rc<TickTimer>,
    application: Application,
}

impl StdRuntime {
    /// Number of ticks [`StdRuntime::run_until_stable`] allows by default.
    pub const DEFAULT_MAX_TICKS: usize = 16;

    pub fn new(env: Environment) -> Self {
        let scheduler = Rc::new(StdScheduler::default());
        let application = Application::new(env, Rc::new(SchedulerHandle(Rc::clone(&scheduler))));
        Self {
            scheduler,
            timer: Rc::new(TickTimer::default()),
            application,
        }
    }

    pub fn application(&self) -> Application {
        self.application.clone()
    }

    pub fn scheduler(&self) -> Rc<StdScheduler> {
        Rc::clone(&self.scheduler)
    }

    pub fn timer(&self) -> Rc<TickTimer> {
        Rc::clone(&self.timer)
    }

    /// Returns whether a tick was requested since the last poll.
    pub fn take_tick_request(&self) -> bool {
        self.scheduler.take_tick_request()
    }

    /// Registers a waker to be called when the application schedules a tick.
    pub fn set_tick_waker(&self, waker: impl Fn() + 'static) {
        self.scheduler.set_tick_waker(waker);
    }

    pub fn clear_tick_waker(&self) {
        self.scheduler.clear_tick_waker();
    }

    /// Runs the pending tick, if any. Returns whether one ran.
    pub fn run_frame(&self) -> ViewResult<bool> {
        let requested = self.take_tick_request();
        if !requested && !self.application.has_pending_tick() {
            return Ok(false);
        }
        self.timer.time(|| self.application.tick())?;
        log::trace!(
            "tick {} took {:?}",
            self.timer.ticks(),
            self.timer.last_tick()
        );
        Ok(true)
    }

    /// Ticks until no further tick is requested, failing once `max_ticks`
    /// have run without settling. Returns the number of ticks run.
    pub fn run_until_stable(&self, max_ticks: usize) -> ViewResult<usize> {
        let mut ticks = 0;
        while self.run_frame()? {
            ticks += 1;
            if ticks >= max_ticks && self.application.has_pending_tick() {
                return Err(ViewError::illegal_state(format!(
                    "application did not stabilize after {ticks} ticks"
                )));
            }
        }
        Ok(ticks)
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("timer", &self.timer)
            .field("views", &self.application.view_count())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/std_runtime_tests.rs"]
mod tests;
