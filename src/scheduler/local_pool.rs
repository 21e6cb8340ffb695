use std::task::Poll;

use futures::{
  executor::LocalSpawner,
  future::{abortable, poll_fn},
  task::LocalSpawnExt,
  FutureExt,
};

use super::{Duration, Scheduler, Task, TaskState, EPOCH};
use crate::subscription::Subscription;

/// A `futures` local pool runs tasks asynchronously, on a later turn of the
/// pool. Delays are real time.
impl Scheduler for LocalSpawner {
  fn now(&self) -> Duration { EPOCH.elapsed() }

  fn schedule<S: 'static>(&self, mut task: Task<S>, delay: Option<Duration>) -> Subscription {
    let handle = Subscription::new();
    let work = async move {
      let mut delay = delay.unwrap_or_default();
      loop {
        if delay.is_zero() {
          yield_now().await;
        } else {
          futures_time::task::sleep(delay.into()).await;
        }
        if handle.is_closed() {
          return;
        }
        match task.step() {
          TaskState::Finished => break,
          TaskState::Yield => delay = Duration::ZERO,
          TaskState::Sleeping(d) => delay = d,
        }
      }
      handle.dispose();
    };

    let (work, abort) = abortable(work);
    handle.add_fn(move || abort.abort());
    if let Err(err) = self.spawn_local(work.map(|_| ())) {
      log::warn!("local pool refused a scheduled task: {err}");
      handle.dispose();
    }
    handle
  }
}

async fn yield_now() {
  let mut yielded = false;
  poll_fn(move |cx| {
    if yielded {
      Poll::Ready(())
    } else {
      yielded = true;
      cx.waker().wake_by_ref();
      Poll::Pending
    }
  })
  .await
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use futures::executor::LocalPool;

  use super::*;

  #[rxengine_macro::test]
  fn runs_on_a_later_turn() {
    let mut pool = LocalPool::new();
    let runs = Rc::new(RefCell::new(0));
    let c_runs = runs.clone();
    let handle = pool.spawner().schedule(
      Task::new((), move |_| {
        *c_runs.borrow_mut() += 1;
        if *c_runs.borrow() < 3 { TaskState::Yield } else { TaskState::Finished }
      }),
      None,
    );
    assert_eq!(*runs.borrow(), 0);
    pool.run();
    assert_eq!(*runs.borrow(), 3);
    assert!(handle.is_closed());
  }

  #[rxengine_macro::test]
  fn cancelled_before_running() {
    let mut pool = LocalPool::new();
    let runs = Rc::new(RefCell::new(0));
    let c_runs = runs.clone();
    let handle = pool.spawner().schedule(
      Task::once((), move |_| *c_runs.borrow_mut() += 1),
      Some(Duration::from_millis(5)),
    );
    handle.unsubscribe().unwrap();
    pool.run();
    assert_eq!(*runs.borrow(), 0);
  }
}
