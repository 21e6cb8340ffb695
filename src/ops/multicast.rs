//! Multicasting operators.
//!
//! All of them build a [`ConnectableObservable`]; they only differ in the
//! subject the source is multicast through. [`Observable::share`] adds
//! reference counting on top.

use crate::{
  observable::{ConnectableObservable, Observable},
  subject::{AsyncSubject, BehaviorSubject, ReplaySubject, Subject, SubjectLike},
};

impl<Item: Clone + 'static, Err: Clone + 'static> Observable<Item, Err> {
  /// Multicasts through `subject` for the lifetime of the returned
  /// connectable, reconnections included.
  pub fn multicast<S>(&self, subject: S) -> ConnectableObservable<Item, Err>
  where
    S: SubjectLike<Item, Err> + 'static,
  {
    ConnectableObservable::with_subject(self.clone(), subject)
  }

  /// Multicasts through a subject made by `factory` for every connection.
  pub fn multicast_with<S>(
    &self, factory: impl Fn() -> S + 'static,
  ) -> ConnectableObservable<Item, Err>
  where
    S: SubjectLike<Item, Err> + 'static,
  {
    ConnectableObservable::new(self.clone(), factory)
  }

  /// Multicasts through a plain [`Subject`].
  pub fn publish(&self) -> ConnectableObservable<Item, Err> { self.multicast(Subject::new()) }

  /// Multicasts through a [`BehaviorSubject`] seeded with `initial`.
  pub fn publish_behavior(&self, initial: Item) -> ConnectableObservable<Item, Err> {
    self.multicast(BehaviorSubject::new(initial))
  }

  /// Multicasts only the last value, once the source completes.
  pub fn publish_last(&self) -> ConnectableObservable<Item, Err> {
    self.multicast(AsyncSubject::new())
  }

  /// Multicasts through a [`ReplaySubject`] keeping `buffer_size` values.
  pub fn publish_replay(&self, buffer_size: usize) -> ConnectableObservable<Item, Err> {
    self.multicast(ReplaySubject::new(buffer_size))
  }

  /// Shares one subscription to the source among all concurrent
  /// subscribers. The source is subscribed for the first one and
  /// unsubscribed when the last one leaves; a later subscriber starts over
  /// with a fresh subject.
  pub fn share(&self) -> Observable<Item, Err> {
    self.multicast_with(Subject::<Item, Err>::new).ref_count()
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use crate::{observable::of, scheduler::TestScheduler};

  const V: [(char, i32); 4] = [('a', 1), ('b', 2), ('c', 3), ('d', 4)];

  #[rxengine_macro::test]
  fn publish_waits_for_connect() {
    let seen = Rc::new(RefCell::new(vec![]));
    let published = of::<_, ()>([1, 2, 3]).publish();
    let (s1, s2) = (seen.clone(), seen.clone());
    published.subscribe(move |v| s1.borrow_mut().push(("first", v)));
    published.subscribe(move |v| s2.borrow_mut().push(("second", v)));
    assert!(seen.borrow().is_empty());

    published.connect();
    assert_eq!(
      *seen.borrow(),
      [("first", 1), ("second", 1), ("first", 2), ("second", 2), ("first", 3), ("second", 3)]
    );
  }

  #[rxengine_macro::test]
  fn publish_last_emits_the_final_value_on_completion() {
    let ts = TestScheduler::new();
    let source = ts.cold::<i32, &str, _>("--a--b--c--|", &V, None);
    let published = source.publish_last();
    ts.expect_observable(&published, None).to_be("-----------(c|)", &V, None);
    ts.expect_observable(&published, Some("----^")).to_be("-----------(c|)", &V, None);
    ts.expect_subscriptions(&source.subscriptions()).to_be("^----------!");
    published.connect();
    ts.flush();
  }

  #[rxengine_macro::test]
  fn publish_last_of_an_empty_source_only_completes() {
    let ts = TestScheduler::new();
    let source = ts.cold::<i32, &str, _>("---|", &V, None);
    let published = source.publish_last();
    ts.expect_observable(&published, None).to_be("---|", &V, None);
    published.connect();
    ts.flush();
  }

  #[rxengine_macro::test]
  fn publish_behavior_starts_with_the_seed() {
    let ts = TestScheduler::new();
    let source = ts.cold::<i32, &str, _>("--a--b|", &V, None);
    let published = source.publish_behavior(0);
    let values = [('s', 0), ('a', 1), ('b', 2)];
    ts.expect_observable(&published, None).to_be("s-a--b|", &values, None);
    published.connect();
    ts.flush();
  }

  #[rxengine_macro::test]
  fn publish_replay_replays_to_late_subscribers() {
    let ts = TestScheduler::new();
    let source = ts.cold::<i32, &str, _>("-a-b-c------d-|", &V, None);
    let published = source.publish_replay(2);
    ts.expect_observable(&published, Some("------^")).to_be("------(bc)--d-|", &V, None);
    published.connect();
    ts.flush();
  }

  #[rxengine_macro::test]
  fn share_subscribes_once_and_restarts_after_the_last_leaves() {
    let ts = TestScheduler::new();
    let source = ts.cold::<i32, &str, _>("-a-b-c-d-|", &V, None);
    let shared = source.share();
    ts.expect_observable(&shared, Some("^----!")).to_be("-a-b-", &V, None);
    ts.expect_observable(&shared, Some("--^------!")).to_be("---b-c-d", &V, None);
    ts.expect_observable(&shared, Some("----------^")).to_be("-----------a-b-c-d-|", &V, None);
    ts.expect_subscriptions(&source.subscriptions())
      .to_be_all(&["^--------!", "----------^--------!"]);
    ts.flush();
  }

  #[rxengine_macro::test]
  fn multicast_with_makes_a_subject_per_connection() {
    let ts = TestScheduler::new();
    let source = ts.cold::<i32, &str, _>("-a|", &V, None);
    let connectable = source.multicast_with(crate::subject::Subject::<i32, &str>::new);
    let seen = Rc::new(RefCell::new(vec![]));

    let c_seen = seen.clone();
    connectable.subscribe(move |v| c_seen.borrow_mut().push(v));
    connectable.connect();
    ts.flush();
    assert!(!connectable.is_connected());

    let c_seen = seen.clone();
    connectable.subscribe(move |v| c_seen.borrow_mut().push(v * 10));
    connectable.connect();
    ts.virtual_time().flush();
    assert_eq!(*seen.borrow(), [1, 10]);
    assert_eq!(ts.frame(), 40);
  }
}
