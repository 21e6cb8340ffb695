use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use super::{Subject, SubjectLike};
use crate::{error::RxError, subscriber::Subscriber, subscription::Subscription};

/// A subject replaying its latest values to late subscribers.
///
/// Up to `buffer_size` values are kept. A late subscriber first receives the
/// buffer, oldest first, then live values, or the terminal notification if
/// the subject already stopped.
pub struct ReplaySubject<Item, Err> {
  subject: Subject<Item, Err>,
  buffer: Rc<RefCell<VecDeque<Item>>>,
  buffer_size: usize,
}

impl<Item, Err> Clone for ReplaySubject<Item, Err> {
  fn clone(&self) -> Self {
    ReplaySubject {
      subject: self.subject.clone(),
      buffer: self.buffer.clone(),
      buffer_size: self.buffer_size,
    }
  }
}

impl<Item, Err> ReplaySubject<Item, Err> {
  /// A subject keeping the last `buffer_size` values, at least one.
  pub fn new(buffer_size: usize) -> Self {
    ReplaySubject {
      subject: Subject::new(),
      buffer: Rc::default(),
      buffer_size: buffer_size.max(1),
    }
  }

  /// A subject keeping every value.
  pub fn unbounded() -> Self { Self::new(usize::MAX) }

  pub fn buffer_size(&self) -> usize { self.buffer_size }

  pub fn observer_count(&self) -> usize { self.subject.observer_count() }
}

impl<Item, Err> SubjectLike<Item, Err> for ReplaySubject<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  fn next(&self, value: Item) -> Result<(), RxError> {
    if self.subject.is_closed() {
      return Err(RxError::ObjectUnsubscribed);
    }
    if !self.subject.is_stopped() {
      let mut buffer = self.buffer.borrow_mut();
      if buffer.len() == self.buffer_size {
        buffer.pop_front();
      }
      buffer.push_back(value.clone());
    }
    self.subject.next(value)
  }

  fn error(&self, err: Err) -> Result<(), RxError> { self.subject.error(err) }

  fn complete(&self) -> Result<(), RxError> { self.subject.complete() }

  fn subscribe_subscriber(
    &self, subscriber: Subscriber<Item, Err>,
  ) -> Result<Subscription, RxError> {
    if self.subject.is_closed() {
      return Err(RxError::ObjectUnsubscribed);
    }
    let replay: Vec<Item> = self.buffer.borrow().iter().cloned().collect();
    if self.subject.is_stopped() {
      replay.into_iter().for_each(|v| subscriber.next(v));
      return self.subject.subscribe_subscriber(subscriber);
    }
    let subscription = self.subject.subscribe_subscriber(subscriber.clone())?;
    for value in replay {
      if subscriber.is_stopped() {
        break;
      }
      subscriber.next(value);
    }
    Ok(subscription)
  }

  fn is_stopped(&self) -> bool { self.subject.is_stopped() }

  fn is_closed(&self) -> bool { self.subject.is_closed() }

  fn unsubscribe(&self) { self.subject.unsubscribe() }
}
