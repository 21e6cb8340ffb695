//! Sharing one subscription to a source between many subscribers.
//!
//! A [`ConnectableObservable`] subscribes its subscribers to a subject, and
//! the subject to the source only when [`connect`](ConnectableObservable::connect)
//! is called. [`ref_count`](ConnectableObservable::ref_count) automates that:
//! the first subscriber connects, the last one to leave disconnects.

use std::{
  cell::{Cell, RefCell},
  ops::Deref,
  rc::{Rc, Weak},
};

use super::Observable;
use crate::{
  config::report_unhandled_error,
  observer::Observer,
  subject::SubjectLike,
  subscriber::Subscriber,
  subscription::{Subscription, TeardownLogic},
};

type SubjectRef<Item, Err> = Rc<dyn SubjectLike<Item, Err>>;

pub struct ConnectableObservable<Item, Err> {
  state: Rc<ConnectableState<Item, Err>>,
  observable: Observable<Item, Err>,
}

struct ConnectableState<Item, Err> {
  source: Observable<Item, Err>,
  factory: Box<dyn Fn() -> SubjectRef<Item, Err>>,
  subject: RefCell<Option<SubjectRef<Item, Err>>>,
  connection: Cell<Option<Subscription>>,
  ref_count: Cell<usize>,
}

impl<Item, Err> Clone for ConnectableObservable<Item, Err> {
  fn clone(&self) -> Self {
    ConnectableObservable { state: self.state.clone(), observable: self.observable.clone() }
  }
}

impl<Item, Err> Deref for ConnectableObservable<Item, Err> {
  type Target = Observable<Item, Err>;

  fn deref(&self) -> &Self::Target { &self.observable }
}

impl<Item: 'static, Err: 'static> ConnectableObservable<Item, Err> {
  /// Multicasts `source` through subjects made by `factory`. A new subject is
  /// made for the first connection and whenever the previous one stopped or
  /// was disconnected.
  pub fn new<S>(source: Observable<Item, Err>, factory: impl Fn() -> S + 'static) -> Self
  where
    S: SubjectLike<Item, Err> + 'static,
  {
    let state = Rc::new(ConnectableState {
      source,
      factory: Box::new(move || Rc::new(factory()) as SubjectRef<Item, Err>),
      subject: RefCell::new(None),
      connection: Cell::new(None),
      ref_count: Cell::new(0),
    });
    let c_state = state.clone();
    let observable = Observable::new(move |subscriber: Subscriber<Item, Err>| {
      match current_subject(&c_state).subscribe_subscriber(subscriber) {
        Ok(subscription) => TeardownLogic::Subscription(subscription),
        Err(err) => {
          report_unhandled_error(err);
          TeardownLogic::Empty
        }
      }
    });
    ConnectableObservable { state, observable }
  }

  /// Multicasts `source` through `subject`, for every connection.
  pub fn with_subject<S>(source: Observable<Item, Err>, subject: S) -> Self
  where
    S: SubjectLike<Item, Err> + 'static,
  {
    let subject: SubjectRef<Item, Err> = Rc::new(subject);
    Self::new(source, move || subject.clone())
  }

  /// The observable view, without the connection controls.
  pub fn observable(&self) -> Observable<Item, Err> { self.observable.clone() }

  pub fn is_connected(&self) -> bool {
    self.state.connection.get().is_some_and(|c| !c.is_closed())
  }

  /// Subscribers currently counted by [`ref_count`](Self::ref_count).
  pub fn ref_count_value(&self) -> usize { self.state.ref_count.get() }

  /// Subscribes the subject to the source, unless already connected.
  ///
  /// Returns the connection; unsubscribing it disconnects. If the source
  /// terminated during the call, [`Subscription::EMPTY`] is returned and the
  /// next call connects afresh.
  pub fn connect(&self) -> Subscription {
    let state = &self.state;
    if let Some(connection) = state.connection.get().filter(|c| !c.is_closed()) {
      return connection;
    }

    let connection = Subscription::new();
    state.connection.set(Some(connection));
    let weak = Rc::downgrade(state);
    connection.add_fn(move || disconnected(&weak, connection));
    log::trace!("connectable connecting");

    let subject = current_subject(state);
    state.source.subscribe_child(connection, ConnectionObserver { subject, connection });
    if connection.is_closed() {
      Subscription::EMPTY
    } else {
      connection
    }
  }

  /// An observable that connects on its first subscriber and disconnects
  /// when the subscriber count drops back to zero.
  pub fn ref_count(&self) -> Observable<Item, Err> {
    let connectable = self.clone();
    Observable::new(move |subscriber: Subscriber<Item, Err>| {
      let state = &connectable.state;
      state.ref_count.set(state.ref_count.get() + 1);

      let local = Rc::new(Cell::new(None));
      let (weak, c_local) = (Rc::downgrade(state), local.clone());
      subscriber.add_fn(move || {
        if let Some(state) = weak.upgrade() {
          release(&state, c_local.take());
        }
      });

      connectable.observable.subscribe_subscriber(subscriber.clone());
      if !subscriber.is_closed() {
        local.set(Some(connectable.connect()));
      }
    })
  }
}

fn current_subject<Item, Err>(state: &ConnectableState<Item, Err>) -> SubjectRef<Item, Err> {
  let existing = state.subject.borrow().clone();
  match existing {
    Some(subject) if !subject.is_stopped() => subject,
    _ => {
      let subject = (state.factory)();
      *state.subject.borrow_mut() = Some(subject.clone());
      subject
    }
  }
}

/// Runs when `connection` is disposed, whichever way that happened.
fn disconnected<Item, Err>(state: &Weak<ConnectableState<Item, Err>>, connection: Subscription) {
  let Some(state) = state.upgrade() else { return };
  if state.connection.get() == Some(connection) {
    log::trace!("connectable disconnected with {} subscriber(s)", state.ref_count.get());
    state.connection.set(None);
    state.ref_count.set(0);
    state.subject.borrow_mut().take();
  }
}

/// One ref-counted subscriber left. `local` is the connection it started or
/// joined; the shared connection is only torn down if it is still that one.
fn release<Item, Err>(state: &ConnectableState<Item, Err>, local: Option<Subscription>) {
  let count = state.ref_count.get();
  if count == 0 {
    return;
  }
  state.ref_count.set(count - 1);
  if count > 1 {
    return;
  }
  if let Some(shared) = state.connection.get() {
    if local.map_or(true, |local| local == shared) {
      shared.dispose();
    }
  }
}

/// Forwards the source into the subject. A terminal notification ends the
/// connection before it reaches the subject, so subscribers reacting to it
/// already see a disconnected observable.
struct ConnectionObserver<Item, Err> {
  subject: SubjectRef<Item, Err>,
  connection: Subscription,
}

impl<Item, Err> Observer<Item, Err> for ConnectionObserver<Item, Err> {
  fn next(&mut self, value: Item) {
    if let Err(err) = self.subject.next(value) {
      report_unhandled_error(err);
    }
  }

  fn error(&mut self, err: Err) {
    self.connection.dispose();
    if let Err(err) = self.subject.error(err) {
      report_unhandled_error(err);
    }
  }

  fn complete(&mut self) {
    self.connection.dispose();
    if let Err(err) = self.subject.complete() {
      report_unhandled_error(err);
    }
  }
}
