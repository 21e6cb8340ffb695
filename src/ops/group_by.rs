//! Splitting a stream into one observable per key.
//!
//! Each distinct key opens a group, a subject emitted downstream as a
//! [`GroupedObservable`]. The source subscription outlives the downstream
//! subscriber while any group still has subscribers: unsubscribing
//! downstream only *attempts* to unsubscribe, and the source is released
//! once the last group subscriber leaves. In the meantime existing groups
//! keep receiving their values; values whose key has no open group are
//! dropped, since nobody is left to receive a new group.

use std::{
  cell::RefCell,
  collections::HashMap,
  hash::Hash,
  ops::Deref,
  rc::{Rc, Weak},
};

use crate::{
  config::report_unhandled_error,
  observable::{Observable, Operator},
  observer::Observer,
  subject::{Subject, SubjectLike},
  subscriber::Subscriber,
  subscription::{Subscription, TeardownLogic},
};

type SubjectRef<Item, Err> = Rc<dyn SubjectLike<Item, Err>>;

/// The observable of one group, tagged with its key.
pub struct GroupedObservable<Key, Item, Err> {
  key: Key,
  observable: Observable<Item, Err>,
}

impl<Key: Clone, Item, Err> Clone for GroupedObservable<Key, Item, Err> {
  fn clone(&self) -> Self {
    GroupedObservable { key: self.key.clone(), observable: self.observable.clone() }
  }
}

impl<Key, Item, Err> GroupedObservable<Key, Item, Err> {
  pub fn key(&self) -> &Key { &self.key }

  pub fn observable(&self) -> &Observable<Item, Err> { &self.observable }
}

impl<Key, Item, Err> Deref for GroupedObservable<Key, Item, Err> {
  type Target = Observable<Item, Err>;

  fn deref(&self) -> &Self::Target { &self.observable }
}

/// The selectors of [`Observable::group_by_with`].
///
/// ```rust
/// use rxengine::prelude::*;
///
/// let words = of::<_, ()>(["apple", "avocado", "banana"]);
/// let groups = words.group_by_with(
///   GroupBy::new(|w: &&str| w.chars().next()).element(|w: &str| w.len()),
/// );
/// # groups.subscribe(|_| {});
/// ```
pub struct GroupBy<Item, Key, Value, Err> {
  key: Rc<dyn Fn(&Item) -> Result<Key, Err>>,
  element: Rc<dyn Fn(Item) -> Result<Value, Err>>,
  duration: Option<Rc<DurationSelector<Key, Value, Err>>>,
  subject: Rc<dyn Fn() -> SubjectRef<Value, Err>>,
}

type DurationSelector<Key, Value, Err> =
  dyn Fn(&GroupedObservable<Key, Value, Err>) -> Observable<(), Err>;

impl<Item, Key, Value, Err> Clone for GroupBy<Item, Key, Value, Err> {
  fn clone(&self) -> Self {
    GroupBy {
      key: self.key.clone(),
      element: self.element.clone(),
      duration: self.duration.clone(),
      subject: self.subject.clone(),
    }
  }
}

fn default_subject<Value, Err>() -> Rc<dyn Fn() -> SubjectRef<Value, Err>>
where
  Value: Clone + 'static,
  Err: Clone + 'static,
{
  Rc::new(|| Rc::new(Subject::new()) as SubjectRef<Value, Err>)
}

impl<Item, Key, Err> GroupBy<Item, Key, Item, Err>
where
  Item: Clone + 'static,
  Key: 'static,
  Err: Clone + 'static,
{
  pub fn new(key: impl Fn(&Item) -> Key + 'static) -> Self { Self::try_new(move |v| Ok(key(v))) }

  /// A key selector that may fail; its error becomes a stream error.
  pub fn try_new(key: impl Fn(&Item) -> Result<Key, Err> + 'static) -> Self {
    GroupBy { key: Rc::new(key), element: Rc::new(Ok), duration: None, subject: default_subject() }
  }
}

impl<Item, Key, Value, Err> GroupBy<Item, Key, Value, Err>
where
  Item: 'static,
  Key: 'static,
  Value: Clone + 'static,
  Err: Clone + 'static,
{
  /// Maps each value before it enters its group.
  ///
  /// The element type changes, so any duration or subject selector set so
  /// far is reset: set the element selector first.
  pub fn element<V>(self, element: impl Fn(Item) -> V + 'static) -> GroupBy<Item, Key, V, Err>
  where
    V: Clone + 'static,
  {
    self.try_element(move |v| Ok(element(v)))
  }

  pub fn try_element<V>(
    self, element: impl Fn(Item) -> Result<V, Err> + 'static,
  ) -> GroupBy<Item, Key, V, Err>
  where
    V: Clone + 'static,
  {
    GroupBy { key: self.key, element: Rc::new(element), duration: None, subject: default_subject() }
  }

  /// Closes a group (completing it) when the observable returned for it
  /// first emits or completes. An error from that observable errors the
  /// group. A later value with the same key opens a new group.
  pub fn duration<D: 'static>(
    mut self,
    duration: impl Fn(&GroupedObservable<Key, Value, Err>) -> Observable<D, Err> + 'static,
  ) -> Self {
    self.duration = Some(Rc::new(move |group: &GroupedObservable<Key, Value, Err>| {
      duration(group).map(|_| ())
    }));
    self
  }

  /// Makes the subject backing each group.
  pub fn subject<S>(mut self, subject: impl Fn() -> S + 'static) -> Self
  where
    S: SubjectLike<Value, Err> + 'static,
  {
    self.subject = Rc::new(move || Rc::new(subject()) as SubjectRef<Value, Err>);
    self
  }
}

struct GroupState<Key, Value, Err> {
  groups: HashMap<Key, SubjectRef<Value, Err>>,
  /// Live subscribers across all groups.
  subscribers: usize,
  attempted_to_unsubscribe: bool,
}

type SharedState<Key, Value, Err> = Rc<RefCell<GroupState<Key, Value, Err>>>;

fn attempt_unsubscribe<Key, Value, Err>(
  state: &SharedState<Key, Value, Err>, source: Subscription,
) {
  let release = {
    let mut state = state.borrow_mut();
    state.attempted_to_unsubscribe = true;
    state.subscribers == 0
  };
  if release {
    source.dispose();
  }
}

fn group_subscriber_left<Key, Value, Err>(
  state: &Weak<RefCell<GroupState<Key, Value, Err>>>, source: Subscription,
) {
  let Some(state) = state.upgrade() else { return };
  if source.is_closed() {
    return;
  }
  let release = {
    let mut state = state.borrow_mut();
    state.subscribers = state.subscribers.saturating_sub(1);
    state.subscribers == 0 && state.attempted_to_unsubscribe
  };
  if release {
    log::trace!("group_by releasing its source after the last group subscriber left");
    source.dispose();
  }
}

/// A group observable counting its subscribers against `state`.
fn counted_group<Key, Value, Err>(
  subject: SubjectRef<Value, Err>, state: Weak<RefCell<GroupState<Key, Value, Err>>>,
  source: Subscription,
) -> Observable<Value, Err>
where
  Key: 'static,
  Value: 'static,
  Err: 'static,
{
  Observable::new(move |subscriber: Subscriber<Value, Err>| {
    if let Some(shared) = state.upgrade().filter(|_| !source.is_closed()) {
      shared.borrow_mut().subscribers += 1;
      let state = state.clone();
      subscriber.add_fn(move || group_subscriber_left(&state, source));
    }
    match subject.subscribe_subscriber(subscriber) {
      Ok(subscription) => TeardownLogic::Subscription(subscription),
      Err(err) => {
        report_unhandled_error(err);
        TeardownLogic::Empty
      }
    }
  })
}

pub struct GroupByOp<Item, Key, Value, Err> {
  options: GroupBy<Item, Key, Value, Err>,
}

struct GroupByObserver<Item, Key, Value, Err> {
  options: GroupBy<Item, Key, Value, Err>,
  state: SharedState<Key, Value, Err>,
  downstream: Subscriber<GroupedObservable<Key, Value, Err>, Err>,
  source: Subscription,
  stopped: bool,
}

impl<Item, Key, Value, Err> GroupByObserver<Item, Key, Value, Err>
where
  Item: 'static,
  Key: Hash + Eq + Clone + 'static,
  Value: Clone + 'static,
  Err: Clone + 'static,
{
  fn open_group(&self, key: &Key) -> SubjectRef<Value, Err> {
    let subject = (self.options.subject)();
    self.state.borrow_mut().groups.insert(key.clone(), subject.clone());

    let observable = counted_group(subject.clone(), Rc::downgrade(&self.state), self.source);
    self.downstream.next(GroupedObservable { key: key.clone(), observable });

    if let Some(duration) = &self.options.duration {
      let plain = GroupedObservable { key: key.clone(), observable: subject.as_observable() };
      let node = Subscription::new();
      self.source.add(node);
      duration(&plain).subscribe_child(
        node,
        DurationObserver {
          key: key.clone(),
          group: subject.clone(),
          state: Rc::downgrade(&self.state),
          node,
        },
      );
    }
    subject
  }

  fn fail(&mut self, err: Err) {
    self.stopped = true;
    let groups: Vec<_> = self.state.borrow_mut().groups.drain().map(|(_, g)| g).collect();
    for group in groups {
      if let Err(e) = group.error(err.clone()) {
        report_unhandled_error(e);
      }
    }
    self.downstream.error(err);
  }
}

impl<Item, Key, Value, Err> Observer<Item, Err> for GroupByObserver<Item, Key, Value, Err>
where
  Item: 'static,
  Key: Hash + Eq + Clone + 'static,
  Value: Clone + 'static,
  Err: Clone + 'static,
{
  fn next(&mut self, value: Item) {
    if self.stopped {
      return;
    }
    let key = match (self.options.key)(&value) {
      Ok(key) => key,
      Err(err) => return self.fail(err),
    };
    let element = match (self.options.element)(value) {
      Ok(element) => element,
      Err(err) => return self.fail(err),
    };

    let existing = self.state.borrow().groups.get(&key).cloned();
    let group = match existing {
      Some(group) => group,
      None if self.state.borrow().attempted_to_unsubscribe => return,
      None => self.open_group(&key),
    };
    if !group.is_closed() {
      if let Err(err) = group.next(element) {
        report_unhandled_error(err);
      }
    }
  }

  fn error(&mut self, err: Err) {
    if !self.stopped {
      self.fail(err);
    }
  }

  fn complete(&mut self) {
    if self.stopped {
      return;
    }
    self.stopped = true;
    let groups: Vec<_> = self.state.borrow_mut().groups.drain().map(|(_, g)| g).collect();
    for group in groups {
      if let Err(err) = group.complete() {
        report_unhandled_error(err);
      }
    }
    self.downstream.complete();
  }
}

/// Closes one group on the first signal of its duration observable.
struct DurationObserver<Key, Value, Err> {
  key: Key,
  group: SubjectRef<Value, Err>,
  state: Weak<RefCell<GroupState<Key, Value, Err>>>,
  node: Subscription,
}

impl<Key: Hash + Eq, Value, Err> DurationObserver<Key, Value, Err> {
  fn close(
    &self, notify: impl FnOnce(&SubjectRef<Value, Err>) -> Result<(), crate::error::RxError>,
  ) {
    if let Some(state) = self.state.upgrade() {
      let mut state = state.borrow_mut();
      if state.groups.get(&self.key).is_some_and(|g| Rc::ptr_eq(g, &self.group)) {
        state.groups.remove(&self.key);
      }
    }
    if let Err(err) = notify(&self.group) {
      report_unhandled_error(err);
    }
    self.node.dispose();
  }
}

impl<Key: Hash + Eq, Value, Err> Observer<(), Err> for DurationObserver<Key, Value, Err> {
  fn next(&mut self, _: ()) { self.close(|group| group.complete()) }

  fn error(&mut self, err: Err) { self.close(move |group| group.error(err)) }

  fn complete(&mut self) { self.close(|group| group.complete()) }
}

impl<Item, Key, Value, Err> Operator<Item, Err, GroupedObservable<Key, Value, Err>, Err>
  for GroupByOp<Item, Key, Value, Err>
where
  Item: 'static,
  Key: Hash + Eq + Clone + 'static,
  Value: Clone + 'static,
  Err: Clone + 'static,
{
  fn call(
    &self, downstream: Subscriber<GroupedObservable<Key, Value, Err>, Err>,
    source: &Observable<Item, Err>,
  ) -> TeardownLogic {
    let state = Rc::new(RefCell::new(GroupState {
      groups: HashMap::new(),
      subscribers: 0,
      attempted_to_unsubscribe: false,
    }));
    let source_subscription = Subscription::new();
    let c_state = state.clone();
    downstream.add_fn(move || attempt_unsubscribe(&c_state, source_subscription));

    let observer = GroupByObserver {
      options: self.options.clone(),
      state,
      downstream,
      source: source_subscription,
      stopped: false,
    };
    source.subscribe_child(source_subscription, observer);
    TeardownLogic::Empty
  }
}

impl<Item: 'static, Err: Clone + 'static> Observable<Item, Err> {
  /// Groups values by `key`.
  pub fn group_by<Key>(
    &self, key: impl Fn(&Item) -> Key + 'static,
  ) -> Observable<GroupedObservable<Key, Item, Err>, Err>
  where
    Item: Clone,
    Key: Hash + Eq + Clone + 'static,
  {
    self.group_by_with(GroupBy::new(key))
  }

  /// Groups values by a fallible `key`. A key error errors every open group
  /// and the output.
  pub fn try_group_by<Key>(
    &self, key: impl Fn(&Item) -> Result<Key, Err> + 'static,
  ) -> Observable<GroupedObservable<Key, Item, Err>, Err>
  where
    Item: Clone,
    Key: Hash + Eq + Clone + 'static,
  {
    self.group_by_with(GroupBy::try_new(key))
  }

  /// Groups values with the full set of selectors.
  pub fn group_by_with<Key, Value>(
    &self, options: GroupBy<Item, Key, Value, Err>,
  ) -> Observable<GroupedObservable<Key, Value, Err>, Err>
  where
    Key: Hash + Eq + Clone + 'static,
    Value: Clone + 'static,
  {
    self.lift(GroupByOp { options })
  }
}
