use super::Observable;
use crate::{
  scheduler::{Duration, Scheduler, Task, TaskState},
  subscriber::Subscriber,
};

/// Emits `0` once `delay` has passed on `scheduler`, then completes.
pub fn timer<Err, S>(delay: Duration, scheduler: S) -> Observable<usize, Err>
where
  Err: 'static,
  S: Scheduler,
{
  Observable::new(move |subscriber: Subscriber<usize, Err>| {
    scheduler.schedule(
      Task::once(subscriber, |subscriber| {
        subscriber.next(0);
        subscriber.complete();
      }),
      Some(delay),
    )
  })
}

/// Emits `0, 1, 2, ...`, one value every `period` on `scheduler`, until
/// unsubscribed.
pub fn interval<Err, S>(period: Duration, scheduler: S) -> Observable<usize, Err>
where
  Err: 'static,
  S: Scheduler,
{
  Observable::new(move |subscriber: Subscriber<usize, Err>| {
    scheduler.schedule(
      Task::new((subscriber, 0), move |(subscriber, count): &mut (Subscriber<usize, Err>, usize)| {
        if subscriber.is_closed() {
          return TaskState::Finished;
        }
        subscriber.next(*count);
        *count += 1;
        TaskState::Sleeping(period)
      }),
      Some(period),
    )
  })
}
