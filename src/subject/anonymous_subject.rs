use std::{cell::Cell, rc::Rc};

use super::SubjectLike;
use crate::{
  error::RxError, observable::Observable, observer::Observer, subscriber::Subscriber,
  subscription::Subscription,
};

/// A subject glued together from an observer and an observable.
///
/// Observer calls go to `destination`, subscriptions go to `source`. The two
/// sides need not be related; this is how a subject is built around an
/// existing producer and consumer pair.
pub struct AnonymousSubject<Item, Err> {
  destination: Subscriber<Item, Err>,
  source: Observable<Item, Err>,
  closed: Rc<Cell<bool>>,
}

impl<Item, Err> Clone for AnonymousSubject<Item, Err> {
  fn clone(&self) -> Self {
    AnonymousSubject {
      destination: self.destination.clone(),
      source: self.source.clone(),
      closed: self.closed.clone(),
    }
  }
}

impl<Item: 'static, Err: 'static> AnonymousSubject<Item, Err> {
  pub fn new(
    destination: impl Observer<Item, Err> + 'static, source: Observable<Item, Err>,
  ) -> Self {
    AnonymousSubject {
      destination: Subscriber::new(destination),
      source,
      closed: Rc::new(Cell::new(false)),
    }
  }

  fn check_open(&self) -> Result<(), RxError> {
    if self.closed.get() {
      Err(RxError::ObjectUnsubscribed)
    } else {
      Ok(())
    }
  }
}

impl<Item: 'static, Err: 'static> SubjectLike<Item, Err> for AnonymousSubject<Item, Err> {
  fn next(&self, value: Item) -> Result<(), RxError> {
    self.check_open()?;
    self.destination.next(value);
    Ok(())
  }

  fn error(&self, err: Err) -> Result<(), RxError> {
    self.check_open()?;
    self.destination.error(err);
    Ok(())
  }

  fn complete(&self) -> Result<(), RxError> {
    self.check_open()?;
    self.destination.complete();
    Ok(())
  }

  fn subscribe_subscriber(
    &self, subscriber: Subscriber<Item, Err>,
  ) -> Result<Subscription, RxError> {
    self.check_open()?;
    Ok(self.source.subscribe_subscriber(subscriber))
  }

  fn is_stopped(&self) -> bool { self.destination.is_stopped() }

  fn is_closed(&self) -> bool { self.closed.get() }

  fn unsubscribe(&self) { self.closed.set(true) }
}
