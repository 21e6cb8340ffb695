use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use crate::{
  notification::Notification,
  observable::{Observable, Operator},
  observer::Observer,
  scheduler::{Duration, Scheduler, Task, TaskState},
  subscriber::Subscriber,
  subscription::TeardownLogic,
};

pub struct DelayOp<S> {
  due: Duration,
  scheduler: S,
}

struct DelayQueue<Item, Err> {
  queue: VecDeque<(Duration, Notification<Item, Err>)>,
  active: bool,
  errored: bool,
}

/// Queues every notification with its due time. A single drain task is
/// scheduled per subscription; it delivers whatever is due, then sleeps until
/// the next entry is, or ends when the queue runs dry.
struct DelayObserver<Item, Err, S> {
  due: Duration,
  scheduler: S,
  downstream: Subscriber<Item, Err>,
  queue: Rc<RefCell<DelayQueue<Item, Err>>>,
}

impl<Item: 'static, Err: 'static, S: Scheduler> DelayObserver<Item, Err, S> {
  fn push(&mut self, notification: Notification<Item, Err>) {
    let time = self.scheduler.now() + self.due;
    let start = {
      let mut queue = self.queue.borrow_mut();
      if queue.errored {
        return;
      }
      queue.queue.push_back((time, notification));
      !std::mem::replace(&mut queue.active, true)
    };
    if start {
      let drain = drain_task(self.queue.clone(), self.downstream.clone(), self.scheduler.clone());
      let handle = self.scheduler.schedule(drain, Some(self.due));
      self.downstream.add(handle);
    }
  }
}

fn drain_task<Item, Err, S>(
  queue: Rc<RefCell<DelayQueue<Item, Err>>>, downstream: Subscriber<Item, Err>, scheduler: S,
) -> Task<()>
where
  Item: 'static,
  Err: 'static,
  S: Scheduler,
{
  Task::new((), move |_| {
    loop {
      let due = {
        let mut queue = queue.borrow_mut();
        match queue.queue.front() {
          Some((time, _)) if *time <= scheduler.now() => queue.queue.pop_front(),
          _ => None,
        }
      };
      match due {
        Some((_, notification)) => downstream.notify(notification),
        None => break,
      }
    }

    let mut queue = queue.borrow_mut();
    match queue.queue.front() {
      Some((time, _)) => TaskState::Sleeping(time.saturating_sub(scheduler.now())),
      None => {
        queue.active = false;
        TaskState::Finished
      }
    }
  })
}

impl<Item, Err, S> Observer<Item, Err> for DelayObserver<Item, Err, S>
where
  Item: 'static,
  Err: 'static,
  S: Scheduler,
{
  fn next(&mut self, value: Item) { self.push(Notification::Next(value)) }

  /// Errors skip the queue; everything still queued is dropped.
  fn error(&mut self, err: Err) {
    {
      let mut queue = self.queue.borrow_mut();
      queue.errored = true;
      queue.queue.clear();
    }
    self.downstream.error(err);
  }

  fn complete(&mut self) { self.push(Notification::Complete) }
}

impl<Item, Err, S> Operator<Item, Err, Item, Err> for DelayOp<S>
where
  Item: 'static,
  Err: 'static,
  S: Scheduler,
{
  fn call(
    &self, downstream: Subscriber<Item, Err>, source: &Observable<Item, Err>,
  ) -> TeardownLogic {
    let observer = DelayObserver {
      due: self.due,
      scheduler: self.scheduler.clone(),
      downstream: downstream.clone(),
      queue: Rc::new(RefCell::new(DelayQueue {
        queue: VecDeque::new(),
        active: false,
        errored: false,
      })),
    };
    source.subscribe_child(downstream.subscription(), observer).into()
  }
}

impl<Item: 'static, Err: 'static> Observable<Item, Err> {
  /// Shifts every value and the completion `due` later on `scheduler`.
  /// Errors are forwarded at once and drop whatever is still queued.
  pub fn delay<S: Scheduler>(&self, due: Duration, scheduler: S) -> Observable<Item, Err> {
    self.lift(DelayOp { due, scheduler })
  }
}

#[cfg(test)]
mod tests {
  use crate::scheduler::{Duration, TestScheduler};

  const V: [(char, i32); 3] = [('a', 1), ('b', 2), ('c', 3)];

  #[rxengine_macro::test]
  fn shifts_values_and_completion() {
    let ts = TestScheduler::new();
    let source = ts.cold::<i32, &str, _>("-a--b-c|", &V, None);
    let delayed = source.delay(Duration::from_millis(30), ts.clone());
    ts.expect_observable(&delayed, None).to_be("----a--b-c|", &V, None);
    ts.expect_subscriptions(&source.subscriptions()).to_be("^------!");
    ts.flush();
  }

  #[rxengine_macro::test]
  fn errors_are_not_delayed() {
    let ts = TestScheduler::new();
    let source = ts.cold::<i32, &str, _>("-a-b-#", &V, Some("boom"));
    let delayed = source.delay(Duration::from_millis(30), ts.clone());
    ts.expect_observable(&delayed, None).to_be("----a#", &V, Some("boom"));
    ts.flush();
  }

  #[rxengine_macro::test]
  fn unsubscribing_cancels_pending_deliveries() {
    let ts = TestScheduler::new();
    let source = ts.cold::<i32, &str, _>("ab|", &V, None);
    let delayed = source.delay(Duration::from_millis(50), ts.clone());
    ts.expect_observable(&delayed, Some("^---!")).to_be("-", &V, None);
    ts.flush();
    assert_eq!(ts.virtual_time().pending_count(), 0);
  }

  #[rxengine_macro::test]
  fn delay_in_run_mode() {
    let ts = TestScheduler::new();
    ts.run(|ts| {
      let source = ts.cold::<i32, &str, _>("a 9ms b|", &V, None);
      let delayed = source.delay(Duration::from_millis(5), ts.clone());
      ts.expect_observable(&delayed, None).to_be("5ms a 9ms b|", &V, None);
    });
  }
}
