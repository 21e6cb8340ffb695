use std::{
  cell::{Cell, RefCell},
  rc::Rc,
};

use super::{Subject, SubjectLike};
use crate::{error::RxError, subscriber::Subscriber, subscription::Subscription};

/// A subject that only emits on completion.
///
/// Values are buffered, not forwarded. `complete` sends the last value (if
/// there was one) followed by `complete`, to current and later subscribers
/// alike. An error is forwarded as with a plain [`Subject`].
pub struct AsyncSubject<Item, Err> {
  subject: Subject<Item, Err>,
  state: Rc<AsyncState<Item>>,
}

struct AsyncState<Item> {
  last: RefCell<Option<Item>>,
  completed: Cell<bool>,
}

impl<Item, Err> Clone for AsyncSubject<Item, Err> {
  fn clone(&self) -> Self {
    AsyncSubject { subject: self.subject.clone(), state: self.state.clone() }
  }
}

impl<Item, Err> Default for AsyncSubject<Item, Err> {
  fn default() -> Self {
    AsyncSubject {
      subject: Subject::new(),
      state: Rc::new(AsyncState { last: RefCell::new(None), completed: Cell::new(false) }),
    }
  }
}

impl<Item, Err> AsyncSubject<Item, Err> {
  pub fn new() -> Self { Self::default() }

  pub fn observer_count(&self) -> usize { self.subject.observer_count() }
}

impl<Item, Err> SubjectLike<Item, Err> for AsyncSubject<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  fn next(&self, value: Item) -> Result<(), RxError> {
    if self.subject.is_closed() {
      return Err(RxError::ObjectUnsubscribed);
    }
    if !self.subject.is_stopped() {
      *self.state.last.borrow_mut() = Some(value);
    }
    Ok(())
  }

  fn error(&self, err: Err) -> Result<(), RxError> {
    if self.state.completed.get() {
      return if self.subject.is_closed() { Err(RxError::ObjectUnsubscribed) } else { Ok(()) };
    }
    self.subject.error(err)
  }

  fn complete(&self) -> Result<(), RxError> {
    if self.subject.is_closed() {
      return Err(RxError::ObjectUnsubscribed);
    }
    if self.subject.is_stopped() {
      return Ok(());
    }
    self.state.completed.set(true);
    let last = self.state.last.borrow().clone();
    if let Some(value) = last {
      self.subject.next(value)?;
    }
    self.subject.complete()
  }

  fn subscribe_subscriber(
    &self, subscriber: Subscriber<Item, Err>,
  ) -> Result<Subscription, RxError> {
    if self.subject.is_closed() {
      return Err(RxError::ObjectUnsubscribed);
    }
    if self.state.completed.get() && !self.subject.has_error() {
      let last = self.state.last.borrow().clone();
      if let Some(value) = last {
        subscriber.next(value);
      }
      subscriber.complete();
      return Ok(Subscription::EMPTY);
    }
    self.subject.subscribe_subscriber(subscriber)
  }

  fn is_stopped(&self) -> bool { self.subject.is_stopped() }

  fn is_closed(&self) -> bool { self.subject.is_closed() }

  fn unsubscribe(&self) { self.subject.unsubscribe() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{notification::Notification, observer::AllObserver};

  type Log = Rc<RefCell<Vec<Notification<i32, &'static str>>>>;

  fn subscribe(subject: &AsyncSubject<i32, &'static str>) -> Log {
    let log = Log::default();
    let (n, e, c) = (log.clone(), log.clone(), log.clone());
    subject
      .subscribe_observer(AllObserver {
        next: move |v| n.borrow_mut().push(Notification::Next(v)),
        error: move |err| e.borrow_mut().push(Notification::Error(err)),
        complete: move || c.borrow_mut().push(Notification::Complete),
      })
      .unwrap();
    log
  }

  #[rxengine_macro::test]
  fn emits_last_value_on_complete() {
    let subject = AsyncSubject::new();
    let early = subscribe(&subject);
    subject.next(1).unwrap();
    subject.next(2).unwrap();
    assert!(early.borrow().is_empty());
    subject.complete().unwrap();
    let late = subscribe(&subject);
    use Notification::*;
    assert_eq!(*early.borrow(), [Next(2), Complete]);
    assert_eq!(*late.borrow(), [Next(2), Complete]);
  }

  #[rxengine_macro::test]
  fn completes_without_value_when_nothing_was_sent() {
    let subject = AsyncSubject::new();
    let log = subscribe(&subject);
    subject.complete().unwrap();
    assert_eq!(*log.borrow(), [Notification::Complete]);
  }

  #[rxengine_macro::test]
  fn error_discards_the_buffered_value() {
    let subject = AsyncSubject::new();
    let log = subscribe(&subject);
    subject.next(1).unwrap();
    subject.error("boom").unwrap();
    subject.complete().unwrap();
    let late = subscribe(&subject);
    assert_eq!(*log.borrow(), [Notification::Error("boom")]);
    assert_eq!(*late.borrow(), [Notification::Error("boom")]);
  }
}
