//! Subjects: values that are both an observable and an observer.
//!
//! A subject multicasts whatever it is told to every subscriber currently in
//! its observer list. The list is snapshotted before each delivery pass, so
//! observers joining or leaving during a pass take effect on the next one.
//!
//! Subjects have two flags, like subscribers:
//!
//! - *stopped*: `error` or `complete` was called. Later `next` calls are
//!   ignored and late subscribers immediately receive the terminal
//!   notification.
//! - *closed*: [`SubjectLike::unsubscribe`] was called. Every later
//!   operation is an illegal-state error, [`RxError::ObjectUnsubscribed`].
//!
//! | Subject              | Late subscribers receive                          |
//! |----------------------|---------------------------------------------------|
//! | [`Subject`]          | only what is emitted after they subscribe         |
//! | [`BehaviorSubject`]  | the current value, then live values               |
//! | [`ReplaySubject`]    | the buffered values, then live values             |
//! | [`AsyncSubject`]     | the last value and `complete`, once completed     |
//! | [`AnonymousSubject`] | whatever its source observable emits              |

mod anonymous_subject;
mod async_subject;
mod behavior_subject;
mod replay_subject;
mod subscribers;

use std::{
  cell::{Cell, RefCell},
  rc::Rc,
};

pub use anonymous_subject::AnonymousSubject;
pub use async_subject::AsyncSubject;
pub use behavior_subject::BehaviorSubject;
pub use replay_subject::ReplaySubject;
use subscribers::{broadcast_error, broadcast_value, Subscribers};

use crate::{
  config::report_unhandled_error,
  error::RxError,
  notification::Notification,
  observable::Observable,
  observer::{FnMutObserver, Observer},
  subscriber::Subscriber,
  subscription::{Subscription, TeardownLogic},
};

/// The operations every subject supports.
///
/// The trait is object safe, so different subjects can stand behind one
/// `Rc<dyn SubjectLike<Item, Err>>`, which is how multicasting operators
/// accept any of them.
pub trait SubjectLike<Item, Err> {
  fn next(&self, value: Item) -> Result<(), RxError>;

  fn error(&self, err: Err) -> Result<(), RxError>;

  fn complete(&self) -> Result<(), RxError>;

  /// Adds `subscriber` to the observer list and returns the subscription
  /// that removes it again. A stopped subject delivers its terminal
  /// notification right away and returns [`Subscription::EMPTY`].
  fn subscribe_subscriber(&self, subscriber: Subscriber<Item, Err>)
    -> Result<Subscription, RxError>;

  fn is_stopped(&self) -> bool;

  fn is_closed(&self) -> bool;

  /// Closes the subject and drops its observers without notifying them.
  fn unsubscribe(&self);

  fn notify(&self, notification: Notification<Item, Err>) -> Result<(), RxError> {
    match notification {
      Notification::Next(v) => self.next(v),
      Notification::Error(e) => self.error(e),
      Notification::Complete => self.complete(),
    }
  }

  fn subscribe_observer<O>(&self, observer: O) -> Result<Subscription, RxError>
  where
    O: Observer<Item, Err> + 'static,
    Self: Sized,
    Item: 'static,
    Err: 'static,
  {
    self.subscribe_subscriber(Subscriber::new(observer))
  }

  fn subscribe<N>(&self, next: N) -> Result<Subscription, RxError>
  where
    N: FnMut(Item) + 'static,
    Self: Sized,
    Item: 'static,
    Err: 'static,
  {
    self.subscribe_observer(FnMutObserver(next))
  }

  /// An observable view of this subject, hiding its observer side.
  ///
  /// Subscribing to the view after the subject closed reports
  /// [`RxError::ObjectUnsubscribed`] to the unhandled-error reporter and
  /// leaves the subscriber untouched.
  fn as_observable(&self) -> Observable<Item, Err>
  where
    Self: Clone + Sized + 'static,
    Item: 'static,
    Err: 'static,
  {
    let subject = self.clone();
    Observable::new(move |subscriber| match subject.subscribe_subscriber(subscriber) {
      Ok(subscription) => TeardownLogic::Subscription(subscription),
      Err(err) => {
        report_unhandled_error(err);
        TeardownLogic::Empty
      }
    })
  }
}

impl<Item, Err, S> SubjectLike<Item, Err> for Rc<S>
where
  S: SubjectLike<Item, Err> + ?Sized,
{
  fn next(&self, value: Item) -> Result<(), RxError> { (**self).next(value) }

  fn error(&self, err: Err) -> Result<(), RxError> { (**self).error(err) }

  fn complete(&self) -> Result<(), RxError> { (**self).complete() }

  fn subscribe_subscriber(
    &self, subscriber: Subscriber<Item, Err>,
  ) -> Result<Subscription, RxError> {
    (**self).subscribe_subscriber(subscriber)
  }

  fn is_stopped(&self) -> bool { (**self).is_stopped() }

  fn is_closed(&self) -> bool { (**self).is_closed() }

  fn unsubscribe(&self) { (**self).unsubscribe() }
}

/// Lets a subject sit at the end of a subscription. Illegal-state errors
/// have no caller to go back to there, so they are reported as unhandled.
macro_rules! impl_subject_observer {
  ($($ty: ty),*) => {$(
    impl<Item, Err> Observer<Item, Err> for $ty
    where
      $ty: SubjectLike<Item, Err>,
    {
      fn next(&mut self, value: Item) {
        if let Err(err) = SubjectLike::next(&*self, value) {
          report_unhandled_error(err);
        }
      }

      fn error(&mut self, err: Err) {
        if let Err(err) = SubjectLike::error(&*self, err) {
          report_unhandled_error(err);
        }
      }

      fn complete(&mut self) {
        if let Err(err) = SubjectLike::complete(&*self) {
          report_unhandled_error(err);
        }
      }
    }
  )*};
}

impl_subject_observer!(
  Subject<Item, Err>,
  BehaviorSubject<Item, Err>,
  AsyncSubject<Item, Err>,
  ReplaySubject<Item, Err>,
  AnonymousSubject<Item, Err>,
  Rc<dyn SubjectLike<Item, Err>>
);

/// A plain multicasting subject.
///
/// ```rust
/// use rxengine::prelude::*;
/// use std::{cell::RefCell, rc::Rc};
///
/// let subject = Subject::<i32, ()>::new();
/// let seen = Rc::new(RefCell::new(vec![]));
/// let c_seen = seen.clone();
/// subject.subscribe(move |v| c_seen.borrow_mut().push(v)).unwrap();
/// subject.next(1).unwrap();
/// subject.next(2).unwrap();
/// assert_eq!(*seen.borrow(), [1, 2]);
/// ```
pub struct Subject<Item, Err>(Rc<SubjectCore<Item, Err>>);

struct SubjectCore<Item, Err> {
  closed: Cell<bool>,
  stopped: Cell<bool>,
  thrown: RefCell<Option<Err>>,
  observers: RefCell<Subscribers<Item, Err>>,
}

impl<Item, Err> Clone for Subject<Item, Err> {
  fn clone(&self) -> Self { Subject(self.0.clone()) }
}

impl<Item, Err> Default for Subject<Item, Err> {
  fn default() -> Self {
    Subject(Rc::new(SubjectCore {
      closed: Cell::new(false),
      stopped: Cell::new(false),
      thrown: RefCell::new(None),
      observers: RefCell::default(),
    }))
  }
}

impl<Item, Err> Subject<Item, Err> {
  pub fn new() -> Self { Self::default() }

  /// Number of subscribers currently in the observer list.
  pub fn observer_count(&self) -> usize { self.0.observers.borrow().len() }

  pub fn has_error(&self) -> bool { self.0.thrown.borrow().is_some() }

  pub fn ptr_eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) }

  fn check_open(&self) -> Result<(), RxError> {
    if self.0.closed.get() {
      Err(RxError::ObjectUnsubscribed)
    } else {
      Ok(())
    }
  }
}

impl<Item, Err: Clone> Subject<Item, Err> {
  /// The error the subject stopped with, if any.
  pub fn thrown_error(&self) -> Option<Err> { self.0.thrown.borrow().clone() }
}

impl<Item, Err> SubjectLike<Item, Err> for Subject<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  fn next(&self, value: Item) -> Result<(), RxError> {
    self.check_open()?;
    if !self.0.stopped.get() {
      let targets = self.0.observers.borrow().snapshot();
      broadcast_value(&targets, value);
    }
    Ok(())
  }

  fn error(&self, err: Err) -> Result<(), RxError> {
    self.check_open()?;
    if !self.0.stopped.replace(true) {
      *self.0.thrown.borrow_mut() = Some(err.clone());
      let targets = self.0.observers.borrow_mut().take();
      broadcast_error(&targets, err);
    }
    Ok(())
  }

  fn complete(&self) -> Result<(), RxError> {
    self.check_open()?;
    if !self.0.stopped.replace(true) {
      let targets = self.0.observers.borrow_mut().take();
      targets.iter().for_each(Subscriber::complete);
    }
    Ok(())
  }

  fn subscribe_subscriber(
    &self, subscriber: Subscriber<Item, Err>,
  ) -> Result<Subscription, RxError> {
    self.check_open()?;
    if let Some(err) = self.thrown_error() {
      subscriber.error(err);
      return Ok(Subscription::EMPTY);
    }
    if self.0.stopped.get() {
      subscriber.complete();
      return Ok(Subscription::EMPTY);
    }

    let id = self.0.observers.borrow_mut().add(subscriber.clone());
    let core = Rc::downgrade(&self.0);
    let removal = Subscription::from_fn(move || {
      if let Some(core) = core.upgrade() {
        core.observers.borrow_mut().remove(id);
      }
    });
    subscriber.add(removal);
    Ok(removal)
  }

  fn is_stopped(&self) -> bool { self.0.stopped.get() }

  fn is_closed(&self) -> bool { self.0.closed.get() }

  fn unsubscribe(&self) {
    self.0.stopped.set(true);
    self.0.closed.set(true);
    self.0.observers.borrow_mut().take();
  }
}
