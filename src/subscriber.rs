//! An observer sink embedding a disposal node.
//!
//! A [`Subscriber`] tracks two independent flags: *stopped* (the stream
//! terminated through `error` or `complete`) and *closed* (its disposal node
//! was unsubscribed). Either one silences further notifications, but only a
//! terminal notification reaches the destination as `error`/`complete`;
//! unsubscribing never does.

use std::{
  cell::{Cell, RefCell},
  collections::VecDeque,
  rc::Rc,
};

use crate::{
  config::report_unhandled_error,
  error::RxError,
  notification::Notification,
  observer::Observer,
  subscription::{Subscription, TeardownLogic},
};

pub struct Subscriber<Item, Err>(Rc<SubscriberInner<Item, Err>>);

struct SubscriberInner<Item, Err> {
  subscription: Subscription,
  stopped: Cell<bool>,
  delivering: Cell<bool>,
  pending: RefCell<VecDeque<Notification<Item, Err>>>,
  destination: RefCell<Box<dyn Observer<Item, Err>>>,
}

impl<Item, Err> Clone for Subscriber<Item, Err> {
  fn clone(&self) -> Self { Subscriber(self.0.clone()) }
}

impl<Item: 'static, Err: 'static> Subscriber<Item, Err> {
  pub fn new(destination: impl Observer<Item, Err> + 'static) -> Self {
    Self::with_subscription(destination, Subscription::new())
  }

  /// A subscriber whose disposal node is `subscription`.
  pub fn with_subscription(
    destination: impl Observer<Item, Err> + 'static, subscription: Subscription,
  ) -> Self {
    Subscriber(Rc::new(SubscriberInner {
      subscription,
      stopped: Cell::new(false),
      delivering: Cell::new(false),
      pending: RefCell::new(VecDeque::new()),
      destination: RefCell::new(Box::new(destination)),
    }))
  }

  #[inline]
  pub fn next(&self, value: Item) { self.on_next(value) }

  #[inline]
  pub fn error(&self, err: Err) { self.on_error(err) }

  #[inline]
  pub fn complete(&self) { self.on_complete() }

  /// Delivers `notification` through the matching method.
  pub fn notify(&self, notification: Notification<Item, Err>) {
    match notification {
      Notification::Next(v) => self.on_next(v),
      Notification::Error(e) => self.on_error(e),
      Notification::Complete => self.on_complete(),
    }
  }

  /// True once the stream terminated or the subscriber was unsubscribed.
  #[inline]
  pub fn is_stopped(&self) -> bool { self.0.stopped.get() || self.is_closed() }

  #[inline]
  pub fn is_closed(&self) -> bool { self.0.subscription.is_closed() }

  /// The disposal node of this subscriber.
  #[inline]
  pub fn subscription(&self) -> Subscription { self.0.subscription }

  #[inline]
  pub fn add(&self, teardown: impl Into<TeardownLogic>) -> Subscription {
    self.0.subscription.add(teardown)
  }

  #[inline]
  pub fn add_fn(&self, f: impl FnOnce() + 'static) -> Subscription {
    self.0.subscription.add_fn(f)
  }

  #[inline]
  pub fn remove(&self, child: Subscription) { self.0.subscription.remove(child) }

  /// Disposes this subscriber without notifying its destination.
  #[inline]
  pub fn unsubscribe(&self) -> Result<(), RxError> { self.0.subscription.unsubscribe() }

  pub(crate) fn dispose(&self) { self.0.subscription.dispose() }

  pub fn ptr_eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) }

  fn on_next(&self, value: Item) {
    if !self.is_stopped() {
      self.deliver(Notification::Next(value));
    }
  }

  fn on_error(&self, err: Err) {
    if !self.is_stopped() {
      self.0.stopped.set(true);
      self.deliver(Notification::Error(err));
    }
  }

  fn on_complete(&self) {
    if !self.is_stopped() {
      self.0.stopped.set(true);
      self.deliver(Notification::Complete);
    }
  }

  /// Notifications arriving while the destination is running are queued and
  /// delivered, in order, once it returns.
  fn deliver(&self, notification: Notification<Item, Err>) {
    let inner = &self.0;
    if inner.delivering.get() {
      inner.pending.borrow_mut().push_back(notification);
      return;
    }

    inner.delivering.set(true);
    let _reset = ResetOnDrop(&inner.delivering);
    let mut current = Some(notification);
    while let Some(notification) = current {
      self.emit(notification);
      current = loop {
        let queued = inner.pending.borrow_mut().pop_front();
        match queued {
          Some(Notification::Next(_)) if self.is_closed() => continue,
          other => break other,
        }
      };
    }
  }

  fn emit(&self, notification: Notification<Item, Err>) {
    let inner = &self.0;
    match notification {
      Notification::Next(v) => inner.destination.borrow_mut().next(v),
      Notification::Error(e) => {
        let handled = inner.destination.borrow().handles_errors();
        if handled {
          inner.destination.borrow_mut().error(e);
        } else {
          report_unhandled_error(e);
        }
        self.dispose();
      }
      Notification::Complete => {
        inner.destination.borrow_mut().complete();
        self.dispose();
      }
    }
  }
}

struct ResetOnDrop<'a>(&'a Cell<bool>);

impl Drop for ResetOnDrop<'_> {
  fn drop(&mut self) { self.0.set(false) }
}

impl<Item: 'static, Err: 'static> Observer<Item, Err> for Subscriber<Item, Err> {
  #[inline]
  fn next(&mut self, value: Item) { self.on_next(value) }

  #[inline]
  fn error(&mut self, err: Err) { self.on_error(err) }

  #[inline]
  fn complete(&mut self) { self.on_complete() }
}
