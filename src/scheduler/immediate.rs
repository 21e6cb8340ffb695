use super::{Duration, Scheduler, Task, TaskState, EPOCH};
use crate::subscription::Subscription;

/// Runs tasks inline, inside `schedule`, blocking the thread for delays.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateScheduler;

impl Scheduler for ImmediateScheduler {
  fn now(&self) -> Duration { EPOCH.elapsed() }

  fn schedule<S: 'static>(&self, mut task: Task<S>, delay: Option<Duration>) -> Subscription {
    let handle = Subscription::new();
    let mut delay = delay.unwrap_or_default();
    loop {
      if !delay.is_zero() {
        std::thread::sleep(delay);
      }
      if handle.is_closed() {
        break;
      }
      match task.step() {
        TaskState::Finished => break,
        TaskState::Yield => delay = Duration::ZERO,
        TaskState::Sleeping(d) => delay = d,
      }
    }
    handle.dispose();
    handle
  }
}
