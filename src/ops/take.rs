use super::forward;
use crate::{
  observable::{Observable, Operator},
  subscriber::Subscriber,
  subscription::TeardownLogic,
};

pub struct TakeOp {
  count: usize,
}

impl<Item: 'static, Err: 'static> Operator<Item, Err, Item, Err> for TakeOp {
  fn call(
    &self, downstream: Subscriber<Item, Err>, source: &Observable<Item, Err>,
  ) -> TeardownLogic {
    if self.count == 0 {
      downstream.complete();
      return TeardownLogic::Empty;
    }
    let (count, mut taken) = (self.count, 0);
    let parent = downstream.subscription();
    let observer = forward(downstream, move |v: Item, d: &Subscriber<Item, Err>| {
      taken += 1;
      if taken <= count {
        d.next(v);
        if taken == count {
          d.complete();
        }
      }
    });
    source.subscribe_child(parent, observer).into()
  }
}

impl<Item: 'static, Err: 'static> Observable<Item, Err> {
  /// Emits the first `count` values, then completes and unsubscribes from
  /// the source.
  pub fn take(&self, count: usize) -> Observable<Item, Err> { self.lift(TakeOp { count }) }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use crate::observable::{from_iter, of};

  #[rxengine_macro::test]
  fn stops_an_endless_source() {
    let seen = Rc::new(RefCell::new(vec![]));
    let c_seen = seen.clone();
    from_iter::<_, (), _>(0..).take(3).subscribe(move |v| c_seen.borrow_mut().push(v));
    assert_eq!(*seen.borrow(), [0, 1, 2]);
  }

  #[rxengine_macro::test]
  fn take_zero_completes_without_subscribing() {
    let completed = Rc::new(RefCell::new(false));
    let c_completed = completed.clone();
    of::<i32, ()>([1]).take(0).subscribe_all(
      |_| unreachable!(),
      |_| {},
      move || *c_completed.borrow_mut() = true,
    );
    assert!(*completed.borrow());
  }
}
