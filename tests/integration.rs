//! Integration tests for rxengine
//!
//! Cross-module behavior through the public API only.

use std::{cell::RefCell, rc::Rc};

use rxengine::{
  prelude::*,
  scheduler::marble::{parse_marbles, serialize_marbles},
};

fn recorder<T>() -> (Rc<RefCell<Vec<T>>>, Rc<RefCell<Vec<T>>>) {
  let seen = Rc::new(RefCell::new(vec![]));
  (seen.clone(), seen)
}

#[rxengine_macro::test]
fn unsubscribe_is_idempotent() {
  let (seen, c_seen) = recorder();
  let subscription = Subscription::from_fn(move || c_seen.borrow_mut().push("torn down"));
  assert!(subscription.unsubscribe().is_ok());
  assert!(subscription.is_closed());
  assert!(subscription.unsubscribe().is_ok());
  assert!(subscription.is_closed());
  assert_eq!(*seen.borrow(), ["torn down"]);
}

#[rxengine_macro::test]
fn a_subscriber_terminates_at_most_once() {
  let (seen, c_seen) = recorder();
  let (e_seen, d_seen) = (c_seen.clone(), c_seen.clone());
  let subscriber = Subscriber::new(AllObserver {
    next: move |v: i32| c_seen.borrow_mut().push(format!("next {v}")),
    error: move |e: &str| e_seen.borrow_mut().push(format!("error {e}")),
    complete: move || d_seen.borrow_mut().push("complete".to_owned()),
  });
  subscriber.next(1);
  subscriber.complete();
  subscriber.error("late");
  subscriber.complete();
  subscriber.next(2);
  assert_eq!(*seen.borrow(), ["next 1", "complete"]);
  assert!(subscriber.is_closed());
}

#[rxengine_macro::test]
fn every_teardown_runs_when_one_fails() {
  let (seen, c_seen) = recorder();
  let parent = Subscription::new();
  let first = c_seen.clone();
  parent.add_fn(move || first.borrow_mut().push(1));
  let second = c_seen.clone();
  parent.try_add_fn(move || {
    second.borrow_mut().push(2);
    Err(TeardownError::from("second failed").into())
  });
  parent.add_fn(move || c_seen.borrow_mut().push(3));

  let err = parent.unsubscribe().unwrap_err();
  assert_eq!(*seen.borrow(), [1, 2, 3]);
  let messages: Vec<_> = err.teardown_errors().iter().map(|e| e.to_string()).collect();
  assert_eq!(messages, ["second failed"]);
  assert!(parent.unsubscribe().is_ok());
}

#[rxengine_macro::test]
fn behavior_subject_replays_only_the_current_value() {
  let subject = BehaviorSubject::<i32, ()>::new(0);
  let (a, c_a) = recorder();
  let (b, c_b) = recorder();
  subject.subscribe(move |v| c_a.borrow_mut().push(v)).unwrap();
  subject.next(1).unwrap();
  subject.subscribe(move |v| c_b.borrow_mut().push(v)).unwrap();
  assert_eq!(*a.borrow(), [0, 1]);
  assert_eq!(*b.borrow(), [1]);
}

#[derive(Clone, Debug, PartialEq)]
struct Record {
  id: u32,
  seq: u32,
}

#[rxengine_macro::test]
fn group_by_makes_one_group_per_key() {
  let records = [(1, 0), (2, 1), (2, 2), (1, 3)].map(|(id, seq)| Record { id, seq });
  let groups: Rc<RefCell<Vec<(u32, Rc<RefCell<Vec<u32>>>)>>> = Rc::default();
  let c_groups = groups.clone();
  of::<_, ()>(records).group_by(|r| r.id).subscribe(move |group| {
    let (seen, c_seen) = recorder();
    group.subscribe(move |r: Record| c_seen.borrow_mut().push(r.seq));
    c_groups.borrow_mut().push((*group.key(), seen));
  });

  let groups = groups.borrow();
  assert_eq!(groups.len(), 2);
  assert_eq!(groups[0].0, 1);
  assert_eq!(*groups[0].1.borrow(), [0, 3]);
  assert_eq!(groups[1].0, 2);
  assert_eq!(*groups[1].1.borrow(), [1, 2]);
}

#[rxengine_macro::test]
fn window_count_splits_on_boundaries() {
  let windows: Rc<RefCell<Vec<Rc<RefCell<Vec<char>>>>>> = Rc::default();
  let c_windows = windows.clone();
  of::<_, ()>(['a', 'b', 'c', 'd', 'e']).window_count(2, None).subscribe(move |window| {
    let (seen, c_seen) = recorder();
    window.subscribe(move |v| c_seen.borrow_mut().push(v));
    c_windows.borrow_mut().push(seen);
  });
  let windows: Vec<Vec<char>> = windows.borrow().iter().map(|w| w.borrow().clone()).collect();
  assert_eq!(windows, [vec!['a', 'b'], vec!['c', 'd'], vec!['e']]);
}

#[rxengine_macro::test]
fn marbles_parse_serialize_and_parse_again() {
  let values = [('a', 1), ('b', 2)];
  let options = MarbleOptions::default();
  let messages = parse_marbles::<i32, (), _>("-a-b-|", &values, None, options).unwrap();
  assert_eq!(
    messages,
    [TestMessage::next(10, 1), TestMessage::next(30, 2), TestMessage::complete(50)]
  );

  let token = |v: &i32| if *v == 1 { 'a' } else { 'b' };
  let diagram = serialize_marbles(&messages, options.frame_time_factor, token).unwrap();
  assert_eq!(diagram, "-a-b-|");
  let reparsed = parse_marbles::<i32, (), _>(&diagram, &values, None, options).unwrap();
  assert_eq!(reparsed, messages);
}

#[rxengine_macro::test]
fn ref_count_subscribes_and_unsubscribes_the_source_once() {
  let (events, c_events) = recorder();
  let source = Observable::<i32, ()>::new(move |_| {
    c_events.borrow_mut().push("subscribed");
    let c_events = c_events.clone();
    TeardownLogic::from_fn(move || c_events.borrow_mut().push("unsubscribed"))
  });
  let shared = source.multicast_with(Subject::<i32, ()>::new).ref_count();

  let first = shared.subscribe(|_| {});
  let second = shared.subscribe(|_| {});
  first.unsubscribe().unwrap();
  assert_eq!(*events.borrow(), ["subscribed"]);
  second.unsubscribe().unwrap();
  first.unsubscribe().unwrap();
  assert_eq!(*events.borrow(), ["subscribed", "unsubscribed"]);
}

#[rxengine_macro::test]
fn delayed_share_in_marbles() {
  let ts = TestScheduler::new();
  let values = [('a', 1), ('b', 2), ('c', 3)];
  let source = ts.cold::<i32, &str, _>("-a-b-c|", &values, None);
  let shared = source.delay(Duration::from_millis(20), ts.clone()).share();
  ts.expect_observable(&shared, None).to_be("---a-b-c|", &values, None);
  ts.expect_observable(&shared, Some("----^")).to_be("-----b-c|", &values, None);
  ts.expect_subscriptions(&source.subscriptions()).to_be("^-----!");
  ts.flush();
}

#[rxengine_macro::test]
fn materialized_windows_in_marbles() {
  let ts = TestScheduler::new();
  let values = [('a', 1), ('b', 2), ('c', 3)];
  let source = ts.hot::<i32, &str, _>("^-a-b-c-|", &values, None);
  let closing = ts.cold::<(), &str, _>("---x", &[('x', ())], None);
  let c_closing = closing.observable();
  let materialized = source
    .window_when(move || c_closing.clone())
    .map(|window: Observable<i32, &str>| window.materialize());
  let (kinds, c_kinds) = recorder();
  materialized.subscribe(move |window| {
    let c_kinds = c_kinds.clone();
    window.subscribe(move |n: Notification<i32, &str>| c_kinds.borrow_mut().push(n.kind()));
  });
  ts.flush();
  assert_eq!(
    *kinds.borrow(),
    [
      NotificationKind::Next,
      NotificationKind::Complete,
      NotificationKind::Next,
      NotificationKind::Next,
      NotificationKind::Complete,
      NotificationKind::Complete,
    ]
  );
}

#[rxengine_macro::test]
fn publish_last_in_run_mode() {
  let ts = TestScheduler::new();
  ts.run(|ts| {
    let values = [('a', 1), ('b', 2)];
    let source = ts.cold::<i32, &str, _>("a 5ms b 3ms |", &values, None);
    let last = source.publish_last().ref_count();
    ts.expect_observable(&last, None).to_be("10ms (b|)", &values, None);
  });
}
