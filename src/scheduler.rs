//! Schedulers decide when work runs.
//!
//! Work is a [`Task`]: a piece of state plus a handler called with a mutable
//! reference to it. The handler's [`TaskState`] tells the scheduler what to do
//! next, which is how a task re-schedules itself:
//!
//! - `Finished`: done, the task handle closes.
//! - `Yield`: run again at the current time, after everything already due.
//! - `Sleeping(d)`: run again `d` later.
//!
//! [`Scheduler::schedule`] returns a [`Subscription`]; unsubscribing it
//! cancels a task that has not run yet and stops a repeating one.

mod immediate;
#[cfg(all(feature = "futures-scheduler", not(target_arch = "wasm32")))]
mod local_pool;
pub mod marble;
mod test_scheduler;
mod virtual_time;

pub use std::time::Duration;
use std::time::Instant;

pub use immediate::ImmediateScheduler;
pub use test_scheduler::*;
pub use virtual_time::VirtualTimeScheduler;

use once_cell::sync::Lazy;

use crate::subscription::Subscription;

/// Wall-clock origin shared by the real-time schedulers.
pub(crate) static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
  Finished,
  Yield,
  Sleeping(Duration),
}

pub struct Task<S> {
  state: S,
  handler: Box<dyn FnMut(&mut S) -> TaskState>,
}

impl<S> Task<S> {
  pub fn new(state: S, handler: impl FnMut(&mut S) -> TaskState + 'static) -> Self {
    Task { state, handler: Box::new(handler) }
  }

  /// A task that runs once.
  pub fn once(state: S, handler: impl FnOnce(&mut S) + 'static) -> Self {
    let mut handler = Some(handler);
    Task::new(state, move |state| {
      if let Some(handler) = handler.take() {
        handler(state);
      }
      TaskState::Finished
    })
  }

  /// Runs one step of the task.
  #[inline]
  pub fn step(&mut self) -> TaskState { (self.handler)(&mut self.state) }
}

/// Orders tasks in time.
pub trait Scheduler: Clone + 'static {
  /// The scheduler's notion of the current time.
  fn now(&self) -> Duration;

  /// Runs `task` after `delay` (or as soon as possible when `None`).
  fn schedule<S: 'static>(&self, task: Task<S>, delay: Option<Duration>) -> Subscription;
}
