//! Disposal tree.
//!
//! A [`Subscription`] is a `Copy` handle to a node in a thread-local arena.
//! Each node owns an optional teardown and an ordered list of children;
//! unsubscribing a node runs its own teardown first, then disposes every
//! child in the order it was added. Teardown failures never stop the
//! cascade, they are collected and returned as one
//! [`UnsubscriptionError`](crate::error::UnsubscriptionError).

mod arena;

use arena::{with_arena, Node, NodeId};

use crate::{
  config::report_unhandled_error,
  error::{BoxError, RxError, UnsubscriptionError},
};

/// A teardown that may fail.
pub type Teardown = Box<dyn FnOnce() -> Result<(), BoxError>>;

/// Handle to a node of the disposal tree.
///
/// Handles are cheap to copy and never keep a node alive: once a node has
/// been unsubscribed every copy of its handle reports `is_closed() == true`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Subscription(NodeId);

impl Default for Subscription {
  fn default() -> Self { Self::new() }
}

impl Subscription {
  /// The shared "nothing to clean up" sentinel. Permanently closed.
  pub const EMPTY: Subscription = Subscription(NodeId::EMPTY);

  /// A live node without a teardown of its own.
  pub fn new() -> Self { Self::with_teardown(None) }

  #[inline]
  pub fn empty() -> Self { Self::EMPTY }

  /// A live node that runs `f` when it is unsubscribed.
  pub fn from_fn(f: impl FnOnce() + 'static) -> Self {
    Self::with_teardown(Some(Box::new(move || {
      f();
      Ok(())
    })))
  }

  /// Like [`Subscription::from_fn`] for a teardown that can fail.
  pub fn try_from_fn(f: impl FnOnce() -> Result<(), BoxError> + 'static) -> Self {
    Self::with_teardown(Some(Box::new(f)))
  }

  fn with_teardown(teardown: Option<Teardown>) -> Self {
    let node = Node { teardown, ..Node::default() };
    Subscription(with_arena(|arena| arena.insert(node)))
  }

  #[inline]
  pub fn is_closed(&self) -> bool { !with_arena(|arena| arena.contains(self.0)) }

  /// Whether this is the [`Subscription::EMPTY`] sentinel.
  #[inline]
  pub fn is_empty(&self) -> bool { self.0 == NodeId::EMPTY }

  /// Number of children currently tracked by this node.
  pub fn child_count(&self) -> usize {
    with_arena(|arena| arena.get(self.0).map_or(0, |node| node.children.len()))
  }

  /// Tracks `teardown` as a child of this node and returns the subscription
  /// actually tracked.
  ///
  /// - the empty sentinel, or `self`, is ignored and `EMPTY` is returned;
  /// - an already closed child is returned untouched;
  /// - if this node is already closed the child is disposed right away, any
  ///   failure going to the unhandled-error reporter;
  /// - adding the same child twice tracks it once.
  pub fn add(&self, teardown: impl Into<TeardownLogic>) -> Subscription {
    let child = match teardown.into() {
      TeardownLogic::Empty => return Self::EMPTY,
      TeardownLogic::Subscription(s) => s,
      TeardownLogic::Fn(f) => Self::with_teardown(Some(f)),
    };
    if child.is_empty() || child == *self {
      return Self::EMPTY;
    }

    let parent = self.0;
    let attached = with_arena(|arena| {
      if !arena.contains(child.0) {
        return true;
      }
      let Some(node) = arena.get_mut(parent) else {
        return false;
      };
      if !node.children.contains(&child.0) {
        node.children.push(child.0);
      }
      if let Some(child_node) = arena.get_mut(child.0) {
        if !child_node.parents.contains(&parent) {
          child_node.parents.push(parent);
        }
      }
      true
    });
    if !attached {
      child.dispose();
    }
    child
  }

  /// Shorthand for adding a closure teardown.
  pub fn add_fn(&self, f: impl FnOnce() + 'static) -> Subscription {
    self.add(TeardownLogic::from_fn(f))
  }

  pub fn try_add_fn(&self, f: impl FnOnce() -> Result<(), BoxError> + 'static) -> Subscription {
    self.add(TeardownLogic::Fn(Box::new(f)))
  }

  /// Detaches `child` from this node without disposing it.
  pub fn remove(&self, child: Subscription) {
    let parent = self.0;
    with_arena(|arena| {
      if let Some(node) = arena.get_mut(parent) {
        node.children.retain(|c| *c != child.0);
      }
      if let Some(node) = arena.get_mut(child.0) {
        node.parents.retain(|p| *p != parent);
      }
    });
  }

  /// Closes this node, detaches it from its parents, runs its own teardown
  /// and then disposes its children in insertion order.
  ///
  /// Calling it on a closed node is a no-op returning `Ok(())`. Every
  /// teardown runs even when an earlier one fails; the failures are returned
  /// together.
  pub fn unsubscribe(&self) -> Result<(), RxError> {
    let id = self.0;
    let Some(node) = with_arena(|arena| {
      let node = arena.release(id)?;
      for parent in node.parents.iter() {
        if let Some(p) = arena.get_mut(*parent) {
          p.children.retain(|c| *c != id);
        }
      }
      for child in node.children.iter() {
        if let Some(c) = arena.get_mut(*child) {
          c.parents.retain(|p| *p != id);
        }
      }
      Some(node)
    }) else {
      return Ok(());
    };

    let mut errors: Vec<BoxError> = vec![];
    if let Some(teardown) = node.teardown {
      if let Err(err) = teardown() {
        errors.push(err);
      }
    }
    for child in node.children {
      if let Err(err) = Subscription(child).unsubscribe() {
        errors.push(Box::new(err));
      }
    }

    if errors.is_empty() {
      Ok(())
    } else {
      let err = UnsubscriptionError::flatten(errors);
      log::debug!("{} teardown(s) failed during unsubscribe", err.errors.len());
      Err(err.into())
    }
  }

  /// Unsubscribes and hands any failure to the unhandled-error reporter.
  pub(crate) fn dispose(&self) {
    if let Err(err) = self.unsubscribe() {
      report_unhandled_error(err);
    }
  }

  /// Activates "RAII" behavior for this subscription: it is disposed as soon
  /// as the returned guard goes out of scope.
  ///
  /// **Attention:** If you don't assign the return value to a variable,
  /// the subscription is disposed immediately.
  pub fn unsubscribe_when_dropped(self) -> SubscriptionGuard { SubscriptionGuard(self) }
}

/// What a subscribe function leaves behind to clean up.
pub enum TeardownLogic {
  Empty,
  Subscription(Subscription),
  Fn(Teardown),
}

impl TeardownLogic {
  pub fn from_fn(f: impl FnOnce() + 'static) -> Self {
    TeardownLogic::Fn(Box::new(move || {
      f();
      Ok(())
    }))
  }
}

impl From<()> for TeardownLogic {
  fn from(_: ()) -> Self { TeardownLogic::Empty }
}

impl From<Subscription> for TeardownLogic {
  fn from(s: Subscription) -> Self { TeardownLogic::Subscription(s) }
}

impl From<Option<Subscription>> for TeardownLogic {
  fn from(s: Option<Subscription>) -> Self {
    s.map_or(TeardownLogic::Empty, TeardownLogic::Subscription)
  }
}

/// An RAII implementation of a "scoped subscribed" of a subscription.
/// When this structure is dropped (falls out of scope), the subscription will
/// be unsubscribed.
///
/// If you want to drop it immediately, wrap it in its own scope
#[derive(Debug)]
#[must_use]
pub struct SubscriptionGuard(Subscription);

impl SubscriptionGuard {
  pub fn new(subscription: Subscription) -> Self { SubscriptionGuard(subscription) }

  pub fn subscription(&self) -> Subscription { self.0 }
}

impl Drop for SubscriptionGuard {
  fn drop(&mut self) { self.0.dispose() }
}

#[cfg(test)]
pub(crate) fn live_nodes() -> usize { with_arena(|arena| arena.len()) }

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use super::*;

  fn log_teardown(log: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> Subscription {
    let log = log.clone();
    Subscription::from_fn(move || log.borrow_mut().push(name))
  }

  #[rxengine_macro::test]
  fn empty_is_closed() {
    assert!(Subscription::EMPTY.is_closed());
    assert!(Subscription::EMPTY.is_empty());
    assert!(Subscription::EMPTY.unsubscribe().is_ok());
    assert_eq!(Subscription::EMPTY.add_fn(|| {}), Subscription::EMPTY);
  }

  #[rxengine_macro::test]
  fn unsubscribe_is_idempotent() {
    let count = Rc::new(RefCell::new(0));
    let c_count = count.clone();
    let s = Subscription::from_fn(move || *c_count.borrow_mut() += 1);
    assert!(!s.is_closed());
    s.unsubscribe().unwrap();
    s.unsubscribe().unwrap();
    assert!(s.is_closed());
    assert_eq!(*count.borrow(), 1);
  }

  #[rxengine_macro::test]
  fn own_teardown_runs_before_children_in_order() {
    let log = Rc::new(RefCell::new(vec![]));
    let c_log = log.clone();
    let parent = Subscription::from_fn(move || c_log.borrow_mut().push("own"));
    parent.add(log_teardown(&log, "first"));
    parent.add(log_teardown(&log, "second"));
    parent.unsubscribe().unwrap();
    assert_eq!(*log.borrow(), ["own", "first", "second"]);
  }

  #[rxengine_macro::test]
  fn add_ignores_self_and_empty() {
    let s = Subscription::new();
    assert_eq!(s.add(s), Subscription::EMPTY);
    assert_eq!(s.add(Subscription::EMPTY), Subscription::EMPTY);
    assert_eq!(s.add(()), Subscription::EMPTY);
    assert_eq!(s.child_count(), 0);
  }

  #[rxengine_macro::test]
  fn adding_to_closed_parent_disposes_child() {
    let parent = Subscription::new();
    parent.unsubscribe().unwrap();
    let child = Subscription::new();
    assert_eq!(parent.add(child), child);
    assert!(child.is_closed());
  }

  #[rxengine_macro::test]
  fn adding_closed_child_is_not_retained() {
    let parent = Subscription::new();
    let child = Subscription::new();
    child.unsubscribe().unwrap();
    parent.add(child);
    assert_eq!(parent.child_count(), 0);
  }

  #[rxengine_macro::test]
  fn duplicate_add_is_tracked_once() {
    let parent = Subscription::new();
    let child = Subscription::new();
    parent.add(child);
    parent.add(child);
    assert_eq!(parent.child_count(), 1);
  }

  #[rxengine_macro::test]
  fn remove_detaches_without_disposing() {
    let parent = Subscription::new();
    let child = Subscription::new();
    parent.add(child);
    parent.remove(child);
    parent.unsubscribe().unwrap();
    assert!(!child.is_closed());
    child.unsubscribe().unwrap();
  }

  #[rxengine_macro::test]
  fn child_unsubscribe_detaches_from_every_parent() {
    let a = Subscription::new();
    let b = Subscription::new();
    let child = Subscription::new();
    a.add(child);
    b.add(child);
    child.unsubscribe().unwrap();
    assert_eq!(a.child_count(), 0);
    assert_eq!(b.child_count(), 0);
  }

  #[rxengine_macro::test]
  fn failing_teardown_does_not_stop_siblings() {
    let log = Rc::new(RefCell::new(vec![]));
    let parent = Subscription::new();
    parent.add(log_teardown(&log, "one"));
    parent.try_add_fn(|| Err("two failed".into()));
    parent.add(log_teardown(&log, "three"));

    let err = parent.unsubscribe().unwrap_err();
    assert_eq!(*log.borrow(), ["one", "three"]);
    let errors = err.teardown_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].to_string(), "two failed");
  }

  #[rxengine_macro::test]
  fn nested_failures_are_flattened() {
    let root = Subscription::new();
    let mid = Subscription::try_from_fn(|| Err("mid".into()));
    mid.try_add_fn(|| Err("leaf".into()));
    root.add(mid);
    root.try_add_fn(|| Err("sibling".into()));

    let err = root.unsubscribe().unwrap_err();
    let msgs: Vec<_> = err.teardown_errors().iter().map(|e| e.to_string()).collect();
    assert_eq!(msgs, ["mid", "leaf", "sibling"]);
  }

  #[rxengine_macro::test]
  fn guard_disposes_on_drop() {
    let s = Subscription::new();
    {
      let _guard = s.unsubscribe_when_dropped();
      assert!(!s.is_closed());
    }
    assert!(s.is_closed());
  }

  #[rxengine_macro::test]
  fn released_nodes_are_reclaimed() {
    let before = live_nodes();
    let parent = Subscription::new();
    for _ in 0..10 {
      parent.add(Subscription::new());
    }
    assert_eq!(live_nodes(), before + 11);
    parent.unsubscribe().unwrap();
    assert_eq!(live_nodes(), before);
  }
}
