use super::Observable;
use crate::{subscriber::Subscriber, subscription::TeardownLogic};

/// Same as [`Observable::new`].
pub fn create<Item, Err, F, T>(subscribe: F) -> Observable<Item, Err>
where
  Item: 'static,
  Err: 'static,
  F: Fn(Subscriber<Item, Err>) -> T + 'static,
  T: Into<TeardownLogic>,
{
  Observable::new(subscribe)
}

/// Emits `values` in order, then completes.
pub fn of<Item, Err>(values: impl IntoIterator<Item = Item>) -> Observable<Item, Err>
where
  Item: Clone + 'static,
  Err: 'static,
{
  let values: Vec<Item> = values.into_iter().collect();
  from_iter(values)
}

/// Emits every item of `iter`, then completes. Iteration stops as soon as
/// the subscriber is closed.
pub fn from_iter<Item, Err, I>(iter: I) -> Observable<Item, Err>
where
  Item: 'static,
  Err: 'static,
  I: IntoIterator<Item = Item> + Clone + 'static,
{
  Observable::new(move |subscriber: Subscriber<Item, Err>| {
    for value in iter.clone() {
      if subscriber.is_stopped() {
        return;
      }
      subscriber.next(value);
    }
    subscriber.complete();
  })
}

/// Completes immediately.
pub fn empty<Item: 'static, Err: 'static>() -> Observable<Item, Err> {
  Observable::new(|subscriber: Subscriber<Item, Err>| subscriber.complete())
}

/// Never emits anything.
pub fn never<Item: 'static, Err: 'static>() -> Observable<Item, Err> { Observable::new(|_| ()) }

/// Errors immediately with `err`.
pub fn throw_error<Item, Err>(err: Err) -> Observable<Item, Err>
where
  Item: 'static,
  Err: Clone + 'static,
{
  Observable::new(move |subscriber: Subscriber<Item, Err>| subscriber.error(err.clone()))
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use super::*;
  use crate::{observer::FnMutObserver, subscription::Subscription};

  #[rxengine_macro::test]
  fn of_emits_then_completes() {
    let seen = Rc::new(RefCell::new(vec![]));
    let (n, c) = (seen.clone(), seen.clone());
    of::<_, ()>([1, 2, 3]).subscribe_all(
      move |v| n.borrow_mut().push(v),
      |_| {},
      move || c.borrow_mut().push(-1),
    );
    assert_eq!(*seen.borrow(), [1, 2, 3, -1]);
  }

  #[rxengine_macro::test]
  fn from_iter_stops_once_unsubscribed() {
    let seen = Rc::new(RefCell::new(vec![]));
    let c_seen = seen.clone();
    let parent = Subscription::new();
    from_iter::<_, (), _>(0..).subscribe_child(
      parent,
      FnMutObserver(move |v: i32| {
        c_seen.borrow_mut().push(v);
        if v == 2 {
          parent.unsubscribe().unwrap();
        }
      }),
    );
    assert_eq!(*seen.borrow(), [0, 1, 2]);
  }

  #[rxengine_macro::test]
  fn throw_error_errors_each_subscriber() {
    let errors = Rc::new(RefCell::new(vec![]));
    let c_errors = errors.clone();
    let obs = throw_error::<i32, _>("bad");
    obs.subscribe_err(|_| {}, {
      let c_errors = c_errors.clone();
      move |e| c_errors.borrow_mut().push(e)
    });
    obs.subscribe_err(|_| {}, move |e| c_errors.borrow_mut().push(e));
    assert_eq!(*errors.borrow(), ["bad", "bad"]);
  }
}
