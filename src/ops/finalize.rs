use std::rc::Rc;

use super::forward;
use crate::{
  observable::{Observable, Operator},
  subscriber::Subscriber,
  subscription::TeardownLogic,
};

pub struct FinalizeOp<F> {
  f: Rc<F>,
}

impl<Item, Err, F> Operator<Item, Err, Item, Err> for FinalizeOp<F>
where
  Item: 'static,
  Err: 'static,
  F: Fn() + 'static,
{
  fn call(
    &self, downstream: Subscriber<Item, Err>, source: &Observable<Item, Err>,
  ) -> TeardownLogic {
    let f = self.f.clone();
    downstream.add_fn(move || f());
    let parent = downstream.subscription();
    let observer = forward(downstream, |v: Item, d: &Subscriber<Item, Err>| d.next(v));
    source.subscribe_child(parent, observer).into()
  }
}

impl<Item: 'static, Err: 'static> Observable<Item, Err> {
  /// Calls `f` once the subscription ends, whether by completion, error or
  /// unsubscription.
  pub fn finalize(&self, f: impl Fn() + 'static) -> Observable<Item, Err> {
    self.lift(FinalizeOp { f: Rc::new(f) })
  }
}
