use std::rc::Rc;

use super::forward;
use crate::{
  observable::{Observable, Operator},
  subscriber::Subscriber,
  subscription::TeardownLogic,
};

pub struct MapOp<F> {
  f: Rc<F>,
}

impl<In, Out, Err, F> Operator<In, Err, Out, Err> for MapOp<F>
where
  In: 'static,
  Out: 'static,
  Err: 'static,
  F: Fn(In) -> Out + 'static,
{
  fn call(&self, downstream: Subscriber<Out, Err>, source: &Observable<In, Err>) -> TeardownLogic {
    let f = self.f.clone();
    let parent = downstream.subscription();
    source
      .subscribe_child(parent, forward(downstream, move |v, d: &Subscriber<Out, Err>| d.next(f(v))))
      .into()
  }
}

impl<Item: 'static, Err: 'static> Observable<Item, Err> {
  /// Applies `f` to every value.
  pub fn map<Out: 'static>(&self, f: impl Fn(Item) -> Out + 'static) -> Observable<Out, Err> {
    self.lift(MapOp { f: Rc::new(f) })
  }
}
