use std::rc::Rc;

use super::forward;
use crate::{
  observable::{Observable, Operator},
  subscriber::Subscriber,
  subscription::TeardownLogic,
};

pub struct FilterOp<F> {
  predicate: Rc<F>,
}

impl<Item, Err, F> Operator<Item, Err, Item, Err> for FilterOp<F>
where
  Item: 'static,
  Err: 'static,
  F: Fn(&Item) -> bool + 'static,
{
  fn call(
    &self, downstream: Subscriber<Item, Err>, source: &Observable<Item, Err>,
  ) -> TeardownLogic {
    let predicate = self.predicate.clone();
    let parent = downstream.subscription();
    let observer = forward(downstream, move |v: Item, d: &Subscriber<Item, Err>| {
      if predicate(&v) {
        d.next(v)
      }
    });
    source.subscribe_child(parent, observer).into()
  }
}

impl<Item: 'static, Err: 'static> Observable<Item, Err> {
  /// Emits only the values for which `predicate` returns `true`.
  pub fn filter(&self, predicate: impl Fn(&Item) -> bool + 'static) -> Observable<Item, Err> {
    self.lift(FilterOp { predicate: Rc::new(predicate) })
  }
}
