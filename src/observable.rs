//! Lazy descriptions of a subscription side effect.
//!
//! An [`Observable`] wraps a subscribe function. Nothing runs until it is
//! subscribed, and every subscription is an independent execution of that
//! function against a fresh [`Subscriber`]. Operators compose observables
//! through [`Observable::lift`].

mod connectable;
mod create;
mod timer;

use std::rc::Rc;

pub use connectable::*;
pub use create::*;
pub use timer::*;

use crate::{
  observer::{AllObserver, ErrObserver, FnMutObserver, Observer},
  subscriber::Subscriber,
  subscription::{Subscription, TeardownLogic},
};

type Producer<Item, Err> = dyn Fn(Subscriber<Item, Err>) -> TeardownLogic;

pub struct Observable<Item, Err> {
  producer: Rc<Producer<Item, Err>>,
}

impl<Item, Err> Clone for Observable<Item, Err> {
  fn clone(&self) -> Self { Observable { producer: self.producer.clone() } }
}

/// A transformation from one observable to another, applied by
/// [`Observable::lift`].
pub trait Operator<In, InErr, Out, OutErr>: 'static {
  /// Subscribes `source` on behalf of `subscriber`.
  fn call(&self, subscriber: Subscriber<Out, OutErr>, source: &Observable<In, InErr>)
    -> TeardownLogic;
}

impl<Item: 'static, Err: 'static> Observable<Item, Err> {
  /// Creates an observable from its subscribe function.
  ///
  /// The function receives the subscriber and returns whatever must be torn
  /// down when that subscriber is disposed: `()`, a [`Subscription`] or a
  /// [`TeardownLogic`].
  pub fn new<F, T>(subscribe: F) -> Self
  where
    F: Fn(Subscriber<Item, Err>) -> T + 'static,
    T: Into<TeardownLogic>,
  {
    Observable { producer: Rc::new(move |subscriber| subscribe(subscriber).into()) }
  }

  /// Runs the subscribe function for `subscriber` and returns its disposal
  /// node. A subscriber that is already closed is not subscribed at all.
  pub fn subscribe_subscriber(&self, subscriber: Subscriber<Item, Err>) -> Subscription {
    if !subscriber.is_closed() {
      let teardown = (self.producer)(subscriber.clone());
      subscriber.add(teardown);
    }
    subscriber.subscription()
  }

  pub fn subscribe_observer(&self, observer: impl Observer<Item, Err> + 'static) -> Subscription {
    self.subscribe_subscriber(Subscriber::new(observer))
  }

  /// Subscribes with a `next` handler. Stream errors go to the unhandled-error
  /// reporter.
  pub fn subscribe(&self, next: impl FnMut(Item) + 'static) -> Subscription {
    self.subscribe_observer(FnMutObserver(next))
  }

  pub fn subscribe_err(
    &self, next: impl FnMut(Item) + 'static, error: impl FnMut(Err) + 'static,
  ) -> Subscription {
    self.subscribe_observer(ErrObserver { next, error })
  }

  pub fn subscribe_all(
    &self, next: impl FnMut(Item) + 'static, error: impl FnMut(Err) + 'static,
    complete: impl FnMut() + 'static,
  ) -> Subscription {
    self.subscribe_observer(AllObserver { next, error, complete })
  }

  /// Subscribes `observer` with its disposal node registered under `parent`
  /// before the subscribe function runs, so a synchronous source stops as
  /// soon as `parent` is disposed.
  pub fn subscribe_child(
    &self, parent: Subscription, observer: impl Observer<Item, Err> + 'static,
  ) -> Subscription {
    let subscriber = Subscriber::new(observer);
    parent.add(subscriber.subscription());
    self.subscribe_subscriber(subscriber)
  }

  /// Builds a new observable whose subscription is delegated to `operator`.
  pub fn lift<Out, OutErr>(
    &self, operator: impl Operator<Item, Err, Out, OutErr>,
  ) -> Observable<Out, OutErr>
  where
    Out: 'static,
    OutErr: 'static,
  {
    let source = self.clone();
    Observable::new(move |subscriber| operator.call(subscriber, &source))
  }

  /// [`Observable::lift`] for a closure operator.
  pub fn lift_fn<Out, OutErr, F>(&self, operator: F) -> Observable<Out, OutErr>
  where
    Out: 'static,
    OutErr: 'static,
    F: Fn(Subscriber<Out, OutErr>, &Observable<Item, Err>) -> TeardownLogic + 'static,
  {
    let source = self.clone();
    Observable::new(move |subscriber| operator(subscriber, &source))
  }

  pub fn ptr_eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.producer, &other.producer) }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use super::*;

  #[rxengine_macro::test]
  fn each_subscribe_is_independent() {
    let runs = Rc::new(RefCell::new(0));
    let c_runs = runs.clone();
    let obs = Observable::<i32, ()>::new(move |subscriber| {
      *c_runs.borrow_mut() += 1;
      subscriber.next(*c_runs.borrow());
      subscriber.complete();
    });
    let seen = Rc::new(RefCell::new(vec![]));
    let (s1, s2) = (seen.clone(), seen.clone());
    obs.subscribe(move |v| s1.borrow_mut().push(v));
    obs.subscribe(move |v| s2.borrow_mut().push(v));
    assert_eq!(*seen.borrow(), [1, 2]);
  }

  #[rxengine_macro::test]
  fn teardown_runs_on_unsubscribe() {
    let torn = Rc::new(RefCell::new(false));
    let c_torn = torn.clone();
    let obs = Observable::<i32, ()>::new(move |_| {
      let c_torn = c_torn.clone();
      Subscription::from_fn(move || *c_torn.borrow_mut() = true)
    });
    let subscription = obs.subscribe(|_| {});
    assert!(!*torn.borrow());
    subscription.unsubscribe().unwrap();
    assert!(*torn.borrow());
  }

  #[rxengine_macro::test]
  fn teardown_of_synchronously_completed_source_runs_immediately() {
    let torn = Rc::new(RefCell::new(false));
    let c_torn = torn.clone();
    let obs = Observable::<i32, ()>::new(move |subscriber| {
      subscriber.complete();
      let c_torn = c_torn.clone();
      TeardownLogic::from_fn(move || *c_torn.borrow_mut() = true)
    });
    let subscription = obs.subscribe(|_| {});
    assert!(subscription.is_closed());
    assert!(*torn.borrow());
  }

  #[rxengine_macro::test]
  fn lift_transforms_notifications() {
    let source = Observable::<i32, ()>::new(|subscriber| {
      subscriber.next(1);
      subscriber.next(2);
      subscriber.complete();
    });
    let doubled = source.lift_fn(|subscriber: Subscriber<String, ()>, source| {
      let (s1, s2, s3) = (subscriber.clone(), subscriber.clone(), subscriber.clone());
      source
        .subscribe_child(
          subscriber.subscription(),
          AllObserver {
            next: move |v: i32| s1.next(format!("{}", v * 2)),
            error: move |e| s2.error(e),
            complete: move || s3.complete(),
          },
        )
        .into()
    });
    let seen = Rc::new(RefCell::new(vec![]));
    let c_seen = seen.clone();
    doubled.subscribe(move |v| c_seen.borrow_mut().push(v));
    assert_eq!(*seen.borrow(), ["2", "4"]);
  }
}
