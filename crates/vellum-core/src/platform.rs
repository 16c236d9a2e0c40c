//! Host hooks the engine relies on to get a change detection pass scheduled.

/// Asks the host to run a tick soon.
///
/// The application coalesces dirty signals, so a scheduler sees at most one
/// request per pending tick.
pub trait TickScheduler {
    fn schedule_tick(&self);
}

/// Scheduler for hosts that tick on their own cadence.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScheduler;

impl TickScheduler for NoopScheduler {
    fn schedule_tick(&self) {}
}
