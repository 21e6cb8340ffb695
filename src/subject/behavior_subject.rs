use std::{cell::RefCell, rc::Rc};

use super::{Subject, SubjectLike};
use crate::{error::RxError, subscriber::Subscriber, subscription::Subscription};

/// A subject holding a current value.
///
/// Every new subscriber first receives the current value, then the live
/// values that follow. `next` updates the value before forwarding it.
pub struct BehaviorSubject<Item, Err> {
  subject: Subject<Item, Err>,
  value: Rc<RefCell<Item>>,
}

impl<Item, Err> Clone for BehaviorSubject<Item, Err> {
  fn clone(&self) -> Self {
    BehaviorSubject { subject: self.subject.clone(), value: self.value.clone() }
  }
}

impl<Item, Err> BehaviorSubject<Item, Err> {
  pub fn new(value: Item) -> Self {
    BehaviorSubject { subject: Subject::new(), value: Rc::new(RefCell::new(value)) }
  }

  pub fn observer_count(&self) -> usize { self.subject.observer_count() }
}

impl<Item: Clone, Err> BehaviorSubject<Item, Err> {
  /// The current value.
  ///
  /// Fails with [`RxError::SubjectErrored`] once the subject errored and
  /// with [`RxError::ObjectUnsubscribed`] once it is closed.
  pub fn value(&self) -> Result<Item, RxError> {
    if self.subject.has_error() {
      Err(RxError::SubjectErrored)
    } else if self.subject.0.closed.get() {
      Err(RxError::ObjectUnsubscribed)
    } else {
      Ok(self.value.borrow().clone())
    }
  }
}

impl<Item, Err> SubjectLike<Item, Err> for BehaviorSubject<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  fn next(&self, value: Item) -> Result<(), RxError> {
    if self.subject.is_closed() {
      return Err(RxError::ObjectUnsubscribed);
    }
    if !self.subject.is_stopped() {
      *self.value.borrow_mut() = value.clone();
    }
    self.subject.next(value)
  }

  fn error(&self, err: Err) -> Result<(), RxError> { self.subject.error(err) }

  fn complete(&self) -> Result<(), RxError> { self.subject.complete() }

  fn subscribe_subscriber(
    &self, subscriber: Subscriber<Item, Err>,
  ) -> Result<Subscription, RxError> {
    let subscription = self.subject.subscribe_subscriber(subscriber.clone())?;
    if !subscription.is_closed() {
      let current = self.value.borrow().clone();
      subscriber.next(current);
    }
    Ok(subscription)
  }

  fn is_stopped(&self) -> bool { self.subject.is_stopped() }

  fn is_closed(&self) -> bool { self.subject.is_closed() }

  fn unsubscribe(&self) { self.subject.unsubscribe() }
}
