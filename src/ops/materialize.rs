use crate::{
  notification::Notification,
  observable::{Observable, Operator},
  observer::Observer,
  subscriber::Subscriber,
  subscription::TeardownLogic,
};

pub struct MaterializeOp;

struct MaterializeObserver<Item, Err> {
  downstream: Subscriber<Notification<Item, Err>, Err>,
}

impl<Item: 'static, Err: 'static> Observer<Item, Err> for MaterializeObserver<Item, Err> {
  fn next(&mut self, value: Item) { self.downstream.next(Notification::Next(value)) }

  fn error(&mut self, err: Err) {
    self.downstream.next(Notification::Error(err));
    self.downstream.complete();
  }

  fn complete(&mut self) {
    self.downstream.next(Notification::Complete);
    self.downstream.complete();
  }
}

impl<Item, Err> Operator<Item, Err, Notification<Item, Err>, Err> for MaterializeOp
where
  Item: 'static,
  Err: 'static,
{
  fn call(
    &self, downstream: Subscriber<Notification<Item, Err>, Err>, source: &Observable<Item, Err>,
  ) -> TeardownLogic {
    let parent = downstream.subscription();
    source.subscribe_child(parent, MaterializeObserver { downstream }).into()
  }
}

pub struct DematerializeOp;

struct DematerializeObserver<Item, Err> {
  downstream: Subscriber<Item, Err>,
}

impl<Item: 'static, Err: 'static> Observer<Notification<Item, Err>, Err>
  for DematerializeObserver<Item, Err>
{
  fn next(&mut self, notification: Notification<Item, Err>) { self.downstream.notify(notification) }

  fn error(&mut self, err: Err) { self.downstream.error(err) }

  fn complete(&mut self) { self.downstream.complete() }
}

impl<Item, Err> Operator<Notification<Item, Err>, Err, Item, Err> for DematerializeOp
where
  Item: 'static,
  Err: 'static,
{
  fn call(
    &self, downstream: Subscriber<Item, Err>, source: &Observable<Notification<Item, Err>, Err>,
  ) -> TeardownLogic {
    let parent = downstream.subscription();
    source.subscribe_child(parent, DematerializeObserver { downstream }).into()
  }
}

impl<Item: 'static, Err: 'static> Observable<Item, Err> {
  /// Wraps every notification, terminal ones included, into a
  /// [`Notification`] value. The output completes right after the wrapped
  /// terminal notification and never errors on its own.
  pub fn materialize(&self) -> Observable<Notification<Item, Err>, Err> { self.lift(MaterializeOp) }
}

impl<Item: 'static, Err: 'static> Observable<Notification<Item, Err>, Err> {
  /// Turns [`Notification`] values back into the notifications they stand
  /// for. A wrapped terminal notification ends the output.
  pub fn dematerialize(&self) -> Observable<Item, Err> { self.lift(DematerializeOp) }
}
