//! Marble testing on virtual time.
//!
//! A [`TestScheduler`] wraps a [`VirtualTimeScheduler`] and adds:
//!
//! - **Test observables**: [`cold`](TestScheduler::cold) observables replay a
//!   diagram for every subscriber, relative to the subscription time;
//!   [`hot`](TestScheduler::hot) observables play it once, in absolute time,
//!   through a subject. Both log when they are subscribed and unsubscribed.
//! - **Expectations**: [`expect_observable`](TestScheduler::expect_observable)
//!   records what an observable emits; `to_be` states what it should have
//!   emitted. Nothing is compared until [`flush`](TestScheduler::flush).
//! - **Run mode**: [`run`](TestScheduler::run) switches to one frame per
//!   millisecond, unlimited frames and duration tokens, then flushes.
//!
//! ```rust
//! use rxengine::prelude::*;
//!
//! let ts = TestScheduler::new();
//! let source = ts.cold::<i32, &str, _>("-a-b-|", &[('a', 1), ('b', 2)], None);
//! ts.expect_observable(&source, None).to_be("-a-b-|", &[('a', 1), ('b', 2)], None);
//! ts.expect_subscriptions(&source.subscriptions()).to_be("^----!");
//! ts.flush();
//! ```

use std::{
  cell::{Cell, RefCell},
  collections::HashMap,
  fmt::Debug,
  ops::Deref,
  rc::Rc,
};

use thiserror::Error;

use super::{
  marble::{
    parse_marbles, parse_marbles_as_subscriptions, Literal, MarbleError, MarbleOptions,
    MarbleValues, SubscriptionLog, TestMessage,
  },
  virtual_time::VirtualTimeScheduler,
  Duration, Scheduler, Task,
};
use crate::{
  config::report_unhandled_error,
  notification::Notification,
  observable::Observable,
  observer::AllObserver,
  subject::{Subject, SubjectLike},
  subscriber::Subscriber,
  subscription::{Subscription, TeardownLogic},
};

/// Frames a [`TestScheduler`] runs before `flush` stops, outside run mode.
pub const DEFAULT_MAX_FRAMES: u64 = 750;

type FlushCheck = Box<dyn FnOnce() -> Option<MarbleMismatch>>;

#[derive(Clone)]
pub struct TestScheduler {
  virtual_time: VirtualTimeScheduler,
  state: Rc<TestState>,
}

struct TestState {
  options: Cell<MarbleOptions>,
  hot_setups: RefCell<Vec<Box<dyn FnOnce()>>>,
  flush_checks: RefCell<Vec<FlushCheck>>,
}

/// One failed expectation, both sides rendered with `Debug`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}\n     got {actual}")]
pub struct MarbleMismatch {
  pub actual: String,
  pub expected: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestSchedulerError {
  #[error("{} expectation(s) failed:\n{}", .0.len(), list(.0))]
  Mismatch(Vec<MarbleMismatch>),
}

fn list(mismatches: &[MarbleMismatch]) -> String {
  mismatches.iter().map(|m| m.to_string()).collect::<Vec<_>>().join("\n")
}

#[inline]
fn frame_delay(frame: i64) -> Duration { Duration::from_millis(frame.max(0) as u64) }

impl Default for TestScheduler {
  fn default() -> Self { Self::new() }
}

impl TestScheduler {
  pub fn new() -> Self {
    TestScheduler {
      virtual_time: VirtualTimeScheduler::with_max_frames(DEFAULT_MAX_FRAMES),
      state: Rc::new(TestState {
        options: Cell::new(MarbleOptions::default()),
        hot_setups: RefCell::default(),
        flush_checks: RefCell::default(),
      }),
    }
  }

  /// The underlying virtual clock.
  pub fn virtual_time(&self) -> &VirtualTimeScheduler { &self.virtual_time }

  pub fn frame(&self) -> u64 { self.virtual_time.frame() }

  pub fn options(&self) -> MarbleOptions { self.state.options.get() }

  pub fn frame_time_factor(&self) -> u64 { self.options().frame_time_factor }

  pub fn is_run_mode(&self) -> bool { self.options().run_mode }

  pub fn max_frames(&self) -> u64 { self.virtual_time.max_frames() }

  pub fn set_max_frames(&self, max_frames: u64) { self.virtual_time.set_max_frames(max_frames) }

  pub fn parse_marbles<T, E, V>(
    &self, marbles: &str, values: &V, error: Option<E>,
  ) -> Result<Vec<TestMessage<T, E>>, MarbleError>
  where
    V: MarbleValues<T> + ?Sized,
    E: Clone,
  {
    parse_marbles(marbles, values, error, self.options())
  }

  pub fn parse_marbles_as_subscriptions(
    &self, marbles: &str,
  ) -> Result<SubscriptionLog, MarbleError> {
    parse_marbles_as_subscriptions(marbles, self.options())
  }

  /// The time at which the single `|` of `marbles` happens.
  pub fn create_time(&self, marbles: &str) -> Result<Duration, MarbleError> {
    if marbles.matches('|').count() != 1 {
      return Err(MarbleError::InvalidTimeDiagram(marbles.to_owned()));
    }
    let messages = parse_marbles::<char, (), _>(marbles, &Literal, Some(()), self.options())?;
    let frame = messages
      .iter()
      .find(|m| m.notification == Notification::Complete)
      .map_or(0, |m| m.frame);
    Ok(frame_delay(frame))
  }

  /// A cold observable replaying `marbles` to each subscriber.
  pub fn create_cold_observable<T, E, V>(
    &self, marbles: &str, values: &V, error: Option<E>,
  ) -> Result<ColdObservable<T, E>, MarbleError>
  where
    T: Clone + 'static,
    E: Clone + 'static,
    V: MarbleValues<T> + ?Sized,
  {
    if marbles.contains('^') {
      return Err(MarbleError::ColdSubscriptionOffset(marbles.to_owned()));
    }
    let messages = self.parse_marbles(marbles, values, error)?;
    let subscriptions = SubscriptionLogs::default();

    let (scheduler, logs, scheduled) = (self.clone(), subscriptions.clone(), messages.clone());
    let observable = Observable::new(move |subscriber: Subscriber<T, E>| {
      let index = logs.log_subscribed(scheduler.frame());
      for message in scheduled.iter() {
        let target = subscriber.clone();
        let notification = message.notification.clone();
        let delay = frame_delay(message.frame);
        let handle = scheduler.virtual_time.schedule_fn(delay, move || target.notify(notification));
        subscriber.add(handle);
      }
      let (logs, scheduler) = (logs.clone(), scheduler.clone());
      TeardownLogic::from_fn(move || logs.log_unsubscribed(index, scheduler.frame()))
    });

    Ok(ColdObservable { observable, messages, subscriptions })
  }

  /// Like [`create_cold_observable`](Self::create_cold_observable).
  ///
  /// # Panics
  ///
  /// Panics if `marbles` is not a valid cold diagram.
  pub fn cold<T, E, V>(&self, marbles: &str, values: &V, error: Option<E>) -> ColdObservable<T, E>
  where
    T: Clone + 'static,
    E: Clone + 'static,
    V: MarbleValues<T> + ?Sized,
  {
    match self.create_cold_observable(marbles, values, error) {
      Ok(cold) => cold,
      Err(err) => panic!("invalid cold marble diagram: {err}"),
    }
  }

  /// A hot observable playing `marbles` once, in absolute time, starting at
  /// the first flush. Notifications before `^` are never delivered.
  pub fn create_hot_observable<T, E, V>(
    &self, marbles: &str, values: &V, error: Option<E>,
  ) -> Result<HotObservable<T, E>, MarbleError>
  where
    T: Clone + 'static,
    E: Clone + 'static,
    V: MarbleValues<T> + ?Sized,
  {
    let messages = self.parse_marbles(marbles, values, error)?;
    let subscriptions = SubscriptionLogs::default();
    let subject = Subject::<T, E>::new();

    let (virtual_time, scheduled, target) =
      (self.virtual_time.clone(), messages.clone(), subject.clone());
    self.state.hot_setups.borrow_mut().push(Box::new(move || {
      for message in scheduled.into_iter().filter(|m| m.frame >= 0) {
        let target = target.clone();
        virtual_time.schedule_fn(frame_delay(message.frame), move || {
          if let Err(err) = target.notify(message.notification) {
            report_unhandled_error(err);
          }
        });
      }
    }));

    let (scheduler, logs, source) = (self.clone(), subscriptions.clone(), subject.as_observable());
    let observable = Observable::new(move |subscriber: Subscriber<T, E>| {
      let index = logs.log_subscribed(scheduler.frame());
      let (logs, scheduler) = (logs.clone(), scheduler.clone());
      subscriber.add_fn(move || logs.log_unsubscribed(index, scheduler.frame()));
      source.subscribe_subscriber(subscriber)
    });

    Ok(HotObservable { observable, messages, subscriptions, subject })
  }

  /// Like [`create_hot_observable`](Self::create_hot_observable).
  ///
  /// # Panics
  ///
  /// Panics if `marbles` is not a valid diagram.
  pub fn hot<T, E, V>(&self, marbles: &str, values: &V, error: Option<E>) -> HotObservable<T, E>
  where
    T: Clone + 'static,
    E: Clone + 'static,
    V: MarbleValues<T> + ?Sized,
  {
    match self.create_hot_observable(marbles, values, error) {
      Ok(hot) => hot,
      Err(err) => panic!("invalid hot marble diagram: {err}"),
    }
  }

  /// Schedules a subscription to `observable` and records what it emits.
  ///
  /// `subscription_marbles` places the subscription (`^`, default frame 0)
  /// and an optional unsubscription (`!`).
  ///
  /// # Panics
  ///
  /// Panics if `subscription_marbles` is not a valid subscription diagram.
  pub fn expect_observable<T, E>(
    &self, observable: &Observable<T, E>, subscription_marbles: Option<&str>,
  ) -> ObservableExpectation<T, E>
  where
    T: 'static,
    E: 'static,
  {
    let actual: Rc<RefCell<Vec<TestMessage<T, E>>>> = Rc::default();
    let record = {
      let (scheduler, actual) = (self.clone(), actual.clone());
      move |notification| {
        let frame = scheduler.frame() as i64;
        actual.borrow_mut().push(TestMessage { frame, notification });
      }
    };
    self.schedule_subscription(subscription_marbles, observable, move |source, parent| {
      let (n, e, c) = (record.clone(), record.clone(), record.clone());
      source.subscribe_child(
        parent,
        AllObserver {
          next: move |v| n(Notification::Next(v)),
          error: move |err| e(Notification::Error(err)),
          complete: move || c(Notification::Complete),
        },
      );
    });
    ObservableExpectation { scheduler: self.clone(), actual, options: self.options() }
  }

  /// Like [`expect_observable`](Self::expect_observable) for a stream of
  /// observables. Every inner observable is subscribed as soon as it is
  /// emitted and recorded relative to that frame.
  pub fn expect_observable_of_observables<T, E>(
    &self, observable: &Observable<Observable<T, E>, E>, subscription_marbles: Option<&str>,
  ) -> NestedExpectation<T, E>
  where
    T: 'static,
    E: 'static,
  {
    let actual: Rc<RefCell<Vec<TestMessage<InnerRecord<T, E>, E>>>> = Rc::default();
    let record = {
      let (scheduler, actual) = (self.clone(), actual.clone());
      move |notification: Notification<Observable<T, E>, E>| {
        let frame = scheduler.frame() as i64;
        let notification = notification.map(|inner| scheduler.materialize_inner(&inner, frame));
        actual.borrow_mut().push(TestMessage { frame, notification });
      }
    };
    self.schedule_subscription(subscription_marbles, observable, move |source, parent| {
      let (n, e, c) = (record.clone(), record.clone(), record.clone());
      source.subscribe_child(
        parent,
        AllObserver {
          next: move |v| n(Notification::Next(v)),
          error: move |err| e(Notification::Error(err)),
          complete: move || c(Notification::Complete),
        },
      );
    });
    NestedExpectation { scheduler: self.clone(), actual, options: self.options() }
  }

  fn materialize_inner<T: 'static, E: 'static>(
    &self, inner: &Observable<T, E>, outer_frame: i64,
  ) -> InnerRecord<T, E> {
    let messages: InnerRecord<T, E> = Rc::default();
    let record = {
      let (scheduler, messages) = (self.clone(), messages.clone());
      move |notification| {
        let frame = scheduler.frame() as i64 - outer_frame;
        messages.borrow_mut().push(TestMessage { frame, notification });
      }
    };
    let (n, e, c) = (record.clone(), record.clone(), record);
    inner.subscribe_observer(AllObserver {
      next: move |v| n(Notification::Next(v)),
      error: move |err| e(Notification::Error(err)),
      complete: move || c(Notification::Complete),
    });
    messages
  }

  fn schedule_subscription<T, E>(
    &self, subscription_marbles: Option<&str>, observable: &Observable<T, E>,
    subscribe: impl FnOnce(Observable<T, E>, Subscription) + 'static,
  ) where
    T: 'static,
    E: 'static,
  {
    let log = match subscription_marbles {
      Some(marbles) => match self.parse_marbles_as_subscriptions(marbles) {
        Ok(log) => log,
        Err(err) => panic!("invalid subscription marble diagram: {err}"),
      },
      None => SubscriptionLog::new(SubscriptionLog::INFINITE),
    };
    let subscribe_frame =
      if log.subscribed_frame == SubscriptionLog::INFINITE { 0 } else { log.subscribed_frame };

    let parent = Subscription::new();
    let source = observable.clone();
    self.virtual_time.schedule_fn(Duration::from_millis(subscribe_frame), move || {
      subscribe(source, parent)
    });
    if log.unsubscribed_frame != SubscriptionLog::INFINITE {
      self
        .virtual_time
        .schedule_fn(Duration::from_millis(log.unsubscribed_frame), move || parent.dispose());
    }
  }

  /// Checks that `logs` matches the subscription diagrams given to the
  /// returned expectation.
  pub fn expect_subscriptions(&self, logs: &SubscriptionLogs) -> SubscriptionExpectation {
    SubscriptionExpectation { scheduler: self.clone(), logs: logs.clone(), options: self.options() }
  }

  fn push_check(&self, check: FlushCheck) { self.state.flush_checks.borrow_mut().push(check); }

  /// Sets up hot observables, runs virtual time and checks every
  /// expectation.
  ///
  /// # Panics
  ///
  /// Panics listing every failed expectation.
  pub fn flush(&self) {
    if let Err(err) = self.try_flush() {
      panic!("{err}");
    }
  }

  /// Like [`flush`](Self::flush), returning the failed expectations instead
  /// of panicking.
  pub fn try_flush(&self) -> Result<(), TestSchedulerError> {
    let setups: Vec<_> = self.state.hot_setups.borrow_mut().drain(..).collect();
    for setup in setups {
      setup();
    }
    self.virtual_time.flush();

    let checks: Vec<_> = self.state.flush_checks.borrow_mut().drain(..).collect();
    let mismatches: Vec<_> = checks.into_iter().filter_map(|check| check()).collect();
    if mismatches.is_empty() {
      Ok(())
    } else {
      log::debug!("{} marble expectation(s) failed at frame {}", mismatches.len(), self.frame());
      Err(TestSchedulerError::Mismatch(mismatches))
    }
  }

  /// Runs `f` in run mode, then flushes. The previous mode and frame limit
  /// are restored afterwards, even if `f` panics.
  pub fn run<R>(&self, f: impl FnOnce(&TestScheduler) -> R) -> R {
    let _restore = RestoreMode {
      scheduler: self.clone(),
      options: self.options(),
      max_frames: self.max_frames(),
    };
    self.state.options.set(MarbleOptions::run_mode());
    self.set_max_frames(u64::MAX);
    let ret = f(self);
    self.flush();
    ret
  }
}

struct RestoreMode {
  scheduler: TestScheduler,
  options: MarbleOptions,
  max_frames: u64,
}

impl Drop for RestoreMode {
  fn drop(&mut self) {
    self.scheduler.state.options.set(self.options);
    self.scheduler.set_max_frames(self.max_frames);
  }
}

impl Scheduler for TestScheduler {
  fn now(&self) -> Duration { self.virtual_time.now() }

  fn schedule<S: 'static>(&self, task: Task<S>, delay: Option<Duration>) -> Subscription {
    self.virtual_time.schedule(task, delay)
  }
}

/// Shared record of when a test observable was subscribed.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionLogs(Rc<RefCell<Vec<SubscriptionLog>>>);

impl SubscriptionLogs {
  pub fn snapshot(&self) -> Vec<SubscriptionLog> { self.0.borrow().clone() }

  fn log_subscribed(&self, frame: u64) -> usize {
    let mut logs = self.0.borrow_mut();
    logs.push(SubscriptionLog::new(frame));
    logs.len() - 1
  }

  fn log_unsubscribed(&self, index: usize, frame: u64) {
    if let Some(log) = self.0.borrow_mut().get_mut(index) {
      log.unsubscribed_frame = frame;
    }
  }
}

pub struct ColdObservable<T, E> {
  observable: Observable<T, E>,
  messages: Vec<TestMessage<T, E>>,
  subscriptions: SubscriptionLogs,
}

pub struct HotObservable<T, E> {
  observable: Observable<T, E>,
  messages: Vec<TestMessage<T, E>>,
  subscriptions: SubscriptionLogs,
  subject: Subject<T, E>,
}

macro_rules! impl_test_observable {
  ($ty: ident) => {
    impl<T, E> $ty<T, E> {
      pub fn messages(&self) -> &[TestMessage<T, E>] { &self.messages }

      pub fn subscriptions(&self) -> SubscriptionLogs { self.subscriptions.clone() }

      pub fn observable(&self) -> Observable<T, E> { self.observable.clone() }
    }

    impl<T, E> Deref for $ty<T, E> {
      type Target = Observable<T, E>;

      fn deref(&self) -> &Self::Target { &self.observable }
    }
  };
}

impl_test_observable!(ColdObservable);
impl_test_observable!(HotObservable);

impl<T, E> HotObservable<T, E> {
  /// The subject the diagram is played through.
  pub fn subject(&self) -> &Subject<T, E> { &self.subject }
}

pub struct ObservableExpectation<T, E> {
  scheduler: TestScheduler,
  actual: Rc<RefCell<Vec<TestMessage<T, E>>>>,
  options: MarbleOptions,
}

impl<T, E> ObservableExpectation<T, E>
where
  T: PartialEq + Debug + 'static,
  E: PartialEq + Debug + Clone + 'static,
{
  /// # Panics
  ///
  /// Panics if `marbles` is not a valid diagram.
  pub fn to_be<V>(self, marbles: &str, values: &V, error: Option<E>)
  where
    V: MarbleValues<T> + ?Sized,
  {
    match parse_marbles(marbles, values, error, self.options) {
      Ok(expected) => self.to_equal(expected),
      Err(err) => panic!("invalid expected marble diagram: {err}"),
    }
  }

  /// Expects exactly `expected`.
  pub fn to_equal(self, expected: Vec<TestMessage<T, E>>) {
    let actual = self.actual;
    self.scheduler.push_check(Box::new(move || compare(&*actual.borrow(), &expected)));
  }
}

type InnerRecord<T, E> = Rc<RefCell<Vec<TestMessage<T, E>>>>;

pub struct NestedExpectation<T, E> {
  scheduler: TestScheduler,
  actual: Rc<RefCell<Vec<TestMessage<InnerRecord<T, E>, E>>>>,
  options: MarbleOptions,
}

impl<T, E> NestedExpectation<T, E>
where
  T: Clone + PartialEq + Debug + 'static,
  E: Clone + PartialEq + Debug + 'static,
{
  /// `inner` names the diagram each outer value stands for; inner diagrams
  /// are read relative to the frame their observable was emitted at.
  ///
  /// # Panics
  ///
  /// Panics if any diagram is invalid.
  pub fn to_be<V>(self, marbles: &str, inner: &[(char, &str)], values: &V, error: Option<E>)
  where
    V: MarbleValues<T> + ?Sized,
  {
    let parsed: Result<HashMap<char, Vec<TestMessage<T, E>>>, MarbleError> = inner
      .iter()
      .map(|(token, diagram)| {
        parse_marbles(diagram, values, error.clone(), self.options).map(|m| (*token, m))
      })
      .collect();
    let expected = parsed.and_then(|inner| parse_marbles(marbles, &inner, error, self.options));
    let expected = match expected {
      Ok(expected) => expected,
      Err(err) => panic!("invalid expected marble diagram: {err}"),
    };

    let actual = self.actual;
    self.scheduler.push_check(Box::new(move || {
      let actual: Vec<TestMessage<Vec<TestMessage<T, E>>, E>> = actual
        .borrow()
        .iter()
        .map(|m| TestMessage {
          frame: m.frame,
          notification: m.notification.as_ref().map(|inner| inner.borrow().clone()).cloned_err(),
        })
        .collect();
      compare(&actual, &expected)
    }));
  }
}

trait ClonedErr<T, E> {
  fn cloned_err(self) -> Notification<T, E>;
}

impl<T, E: Clone> ClonedErr<T, E> for Notification<T, &E> {
  fn cloned_err(self) -> Notification<T, E> {
    match self {
      Notification::Next(v) => Notification::Next(v),
      Notification::Error(e) => Notification::Error(e.clone()),
      Notification::Complete => Notification::Complete,
    }
  }
}

fn compare<T: PartialEq + Debug>(actual: &[T], expected: &[T]) -> Option<MarbleMismatch> {
  (actual != expected)
    .then(|| MarbleMismatch { actual: format!("{actual:?}"), expected: format!("{expected:?}") })
}

pub struct SubscriptionExpectation {
  scheduler: TestScheduler,
  logs: SubscriptionLogs,
  options: MarbleOptions,
}

impl SubscriptionExpectation {
  /// Expects exactly one subscription, matching `marbles`.
  pub fn to_be(self, marbles: &str) { self.to_be_all(&[marbles]) }

  /// Expects one subscription per diagram, in order. An empty list expects
  /// no subscription at all.
  ///
  /// # Panics
  ///
  /// Panics if a diagram is invalid.
  pub fn to_be_all(self, marbles: &[&str]) {
    let expected: Result<Vec<_>, _> =
      marbles.iter().map(|m| parse_marbles_as_subscriptions(m, self.options)).collect();
    let expected = match expected {
      Ok(expected) => expected,
      Err(err) => panic!("invalid expected subscription diagram: {err}"),
    };
    let logs = self.logs;
    self.scheduler.push_check(Box::new(move || compare(&logs.snapshot(), &expected)));
  }
}
