//! Deterministic virtual time.
//!
//! Time is an integer frame counter (one frame per virtual millisecond) that
//! only moves while [`VirtualTimeScheduler::flush`] runs. Actions execute in
//! non-decreasing frame order, FIFO among actions sharing a frame.

use std::{
  cell::RefCell,
  cmp::Ordering,
  collections::BinaryHeap,
  rc::Rc,
};

use super::{Duration, Scheduler, Task, TaskState};
use crate::subscription::Subscription;

#[derive(Clone)]
pub struct VirtualTimeScheduler(Rc<RefCell<VirtualState>>);

struct VirtualState {
  frame: u64,
  next_index: u64,
  max_frames: u64,
  queue: BinaryHeap<ScheduledAction>,
  flushing: bool,
}

struct ScheduledAction {
  frame: u64,
  index: u64,
  work: Box<dyn FnMut() -> TaskState>,
  handle: Subscription,
}

impl PartialEq for ScheduledAction {
  fn eq(&self, other: &Self) -> bool { self.frame == other.frame && self.index == other.index }
}

impl Eq for ScheduledAction {}

impl PartialOrd for ScheduledAction {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for ScheduledAction {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier frames first, then FIFO by index
    other.frame.cmp(&self.frame).then_with(|| other.index.cmp(&self.index))
  }
}

impl Default for VirtualTimeScheduler {
  fn default() -> Self { Self::new() }
}

#[inline]
pub(crate) fn to_frames(d: Duration) -> u64 { u64::try_from(d.as_millis()).unwrap_or(u64::MAX) }

impl VirtualTimeScheduler {
  pub fn new() -> Self { Self::with_max_frames(u64::MAX) }

  /// A scheduler whose `flush` stops before actions due after `max_frames`.
  pub fn with_max_frames(max_frames: u64) -> Self {
    VirtualTimeScheduler(Rc::new(RefCell::new(VirtualState {
      frame: 0,
      next_index: 0,
      max_frames,
      queue: BinaryHeap::new(),
      flushing: false,
    })))
  }

  /// The current virtual frame.
  pub fn frame(&self) -> u64 { self.0.borrow().frame }

  pub fn max_frames(&self) -> u64 { self.0.borrow().max_frames }

  pub fn set_max_frames(&self, max_frames: u64) { self.0.borrow_mut().max_frames = max_frames; }

  /// Number of queued actions that have not been cancelled.
  pub fn pending_count(&self) -> usize {
    self.0.borrow().queue.iter().filter(|a| !a.handle.is_closed()).count()
  }

  pub fn is_flushing(&self) -> bool { self.0.borrow().flushing }

  /// Runs `f` once, `delay` after the current frame.
  pub fn schedule_fn(&self, delay: Duration, f: impl FnOnce() + 'static) -> Subscription {
    self.schedule(Task::once((), move |_| f()), Some(delay))
  }

  /// Runs every queued action due at or before `max_frames`, advancing the
  /// clock to each action's frame before running it.
  ///
  /// Actions may schedule further actions; they are picked up by the same
  /// flush. A nested `flush` call is a no-op. A panicking action propagates
  /// to the caller and leaves the rest of the queue in place.
  pub fn flush(&self) {
    {
      let mut state = self.0.borrow_mut();
      if state.flushing {
        return;
      }
      state.flushing = true;
    }
    let _guard = FlushGuard(&self.0);
    log::trace!("virtual time flush from frame {}", self.frame());

    loop {
      let action = {
        let mut state = self.0.borrow_mut();
        let due = state.queue.peek().is_some_and(|a| a.frame <= state.max_frames);
        if !due {
          break;
        }
        let Some(action) = state.queue.pop() else { break };
        if action.handle.is_closed() {
          continue;
        }
        state.frame = action.frame;
        action
      };
      self.run(action);
    }
    log::trace!("virtual time flushed up to frame {}", self.frame());
  }

  fn run(&self, mut action: ScheduledAction) {
    match (action.work)() {
      TaskState::Finished => action.handle.dispose(),
      TaskState::Yield => self.requeue(action, 0),
      TaskState::Sleeping(d) => self.requeue(action, to_frames(d)),
    }
  }

  fn requeue(&self, mut action: ScheduledAction, delay: u64) {
    if action.handle.is_closed() {
      return;
    }
    let mut state = self.0.borrow_mut();
    action.frame = state.frame.saturating_add(delay);
    action.index = state.next_index;
    state.next_index += 1;
    state.queue.push(action);
  }
}

struct FlushGuard<'a>(&'a RefCell<VirtualState>);

impl Drop for FlushGuard<'_> {
  fn drop(&mut self) {
    if let Ok(mut state) = self.0.try_borrow_mut() {
      state.flushing = false;
    }
  }
}

impl Scheduler for VirtualTimeScheduler {
  fn now(&self) -> Duration { Duration::from_millis(self.frame()) }

  fn schedule<S: 'static>(&self, mut task: Task<S>, delay: Option<Duration>) -> Subscription {
    let handle = Subscription::new();
    let mut state = self.0.borrow_mut();
    let frame = state.frame.saturating_add(delay.map_or(0, to_frames));
    let index = state.next_index;
    state.next_index += 1;
    state.queue.push(ScheduledAction {
      frame,
      index,
      work: Box::new(move || task.step()),
      handle,
    });
    handle
  }
}
