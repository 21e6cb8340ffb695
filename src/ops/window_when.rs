use std::{cell::RefCell, rc::Rc};

use crate::{
  config::report_unhandled_error,
  observable::{Observable, Operator},
  observer::Observer,
  subject::{Subject, SubjectLike},
  subscriber::Subscriber,
  subscription::{Subscription, TeardownLogic},
};

type ClosingSelector<C, Err> = dyn Fn() -> Result<Observable<C, Err>, Err>;

pub struct WindowWhenOp<C, Err> {
  closing: Rc<ClosingSelector<C, Err>>,
}

struct WindowWhenCtx<Item, Err, C> {
  downstream: Subscriber<Observable<Item, Err>, Err>,
  closing: Rc<ClosingSelector<C, Err>>,
  window: RefCell<Option<Subject<Item, Err>>>,
  closing_node: RefCell<Option<Subscription>>,
}

fn check(result: Result<(), crate::error::RxError>) {
  if let Err(err) = result {
    report_unhandled_error(err);
  }
}

impl<Item, Err, C> WindowWhenCtx<Item, Err, C>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
  C: 'static,
{
  /// Closes the current window and its notifier, then opens the next window
  /// and subscribes a fresh closing notifier for it.
  fn open_window(self: &Rc<Self>) {
    if let Some(node) = self.closing_node.borrow_mut().take() {
      node.dispose();
    }
    let previous = self.window.borrow_mut().take();
    if let Some(previous) = previous {
      check(previous.complete());
    }
    if self.downstream.is_stopped() {
      return;
    }

    let window = Subject::new();
    *self.window.borrow_mut() = Some(window.clone());
    self.downstream.next(window.as_observable());
    if self.downstream.is_closed() {
      return;
    }

    let closing = match (self.closing)() {
      Ok(closing) => closing,
      Err(err) => return self.fail(err),
    };
    let node = Subscription::new();
    self.downstream.add(node);
    if node.is_closed() {
      return;
    }
    *self.closing_node.borrow_mut() = Some(node);
    closing.subscribe_child(node, ClosingObserver { ctx: self.clone() });
  }

  /// Errors the output first, then the open window.
  fn fail(&self, err: Err) {
    let window = self.window.borrow_mut().take();
    self.downstream.error(err.clone());
    if let Some(window) = window {
      check(window.error(err));
    }
  }
}

struct ClosingObserver<Item, Err, C> {
  ctx: Rc<WindowWhenCtx<Item, Err, C>>,
}

impl<Item, Err, C> Observer<C, Err> for ClosingObserver<Item, Err, C>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
  C: 'static,
{
  fn next(&mut self, _: C) { self.ctx.open_window() }

  fn error(&mut self, err: Err) { self.ctx.fail(err) }

  fn complete(&mut self) { self.ctx.open_window() }
}

struct WindowWhenObserver<Item, Err, C> {
  ctx: Rc<WindowWhenCtx<Item, Err, C>>,
}

impl<Item, Err, C> Observer<Item, Err> for WindowWhenObserver<Item, Err, C>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
  C: 'static,
{
  fn next(&mut self, value: Item) {
    let window = self.ctx.window.borrow().clone();
    if let Some(window) = window {
      check(window.next(value));
    }
  }

  fn error(&mut self, err: Err) { self.ctx.fail(err) }

  fn complete(&mut self) {
    let window = self.ctx.window.borrow_mut().take();
    if let Some(window) = window {
      check(window.complete());
    }
    self.ctx.downstream.complete();
  }
}

impl<Item, Err, C> Operator<Item, Err, Observable<Item, Err>, Err> for WindowWhenOp<C, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
  C: 'static,
{
  fn call(
    &self, downstream: Subscriber<Observable<Item, Err>, Err>, source: &Observable<Item, Err>,
  ) -> TeardownLogic {
    let ctx = Rc::new(WindowWhenCtx {
      downstream: downstream.clone(),
      closing: self.closing.clone(),
      window: RefCell::new(None),
      closing_node: RefCell::new(None),
    });
    ctx.open_window();
    source.subscribe_child(downstream.subscription(), WindowWhenObserver { ctx }).into()
  }
}

impl<Item: Clone + 'static, Err: Clone + 'static> Observable<Item, Err> {
  /// Splits the source into consecutive windows. The first window opens on
  /// subscription; `closing` is called for every window and the window
  /// closes, and the next one opens, when the returned notifier emits or
  /// completes.
  ///
  /// A notifier that emits synchronously on subscription reopens windows
  /// without end; give it some delay.
  pub fn window_when<C: 'static>(
    &self, closing: impl Fn() -> Observable<C, Err> + 'static,
  ) -> Observable<Observable<Item, Err>, Err> {
    self.try_window_when(move || Ok(closing()))
  }

  /// [`window_when`](Self::window_when) with a selector that can fail. A
  /// failure errors the open window and the output.
  pub fn try_window_when<C: 'static>(
    &self, closing: impl Fn() -> Result<Observable<C, Err>, Err> + 'static,
  ) -> Observable<Observable<Item, Err>, Err> {
    self.lift(WindowWhenOp { closing: Rc::new(closing) })
  }
}

#[cfg(test)]
mod tests {
  use std::{
    cell::{Cell, RefCell},
    rc::Rc,
  };

  use crate::{
    observable::never,
    scheduler::TestScheduler,
    subject::{Subject, SubjectLike},
  };

  const V: [(char, i32); 5] = [('a', 1), ('b', 2), ('c', 3), ('d', 4), ('e', 5)];

  #[rxengine_macro::test]
  fn windows_close_when_notifier_emits() {
    let ts = TestScheduler::new();
    let source = ts.hot::<i32, &str, _>("^-a-b--c-d--e-|", &V, None);
    let closing = ts.cold::<(), &str, _>("-----x", &[('x', ())], None);
    let c_closing = closing.observable();
    let windows = source.window_when(move || c_closing.clone());

    ts.expect_observable_of_observables(&windows, None).to_be(
      "x----y----z---|",
      &[('x', "--a-b|"), ('y', "--c-d|"), ('z', "--e-|")],
      &V,
      None,
    );
    ts.expect_subscriptions(&source.subscriptions()).to_be("^-------------!");
    ts.expect_subscriptions(&closing.subscriptions()).to_be_all(&[
      "^----!",
      "-----^----!",
      "----------^---!",
    ]);
    ts.flush();
  }

  #[rxengine_macro::test]
  fn notifier_completion_also_reopens() {
    let ts = TestScheduler::new();
    let source = ts.hot::<i32, &str, _>("^-a-b--c-|", &V, None);
    let closing = ts.cold::<(), &str, _>("---|", &[('x', ())], None);
    let c_closing = closing.observable();
    let windows = source.window_when(move || c_closing.clone());

    ts.expect_observable_of_observables(&windows, None).to_be(
      "x--y--z--|",
      &[('x', "--a|"), ('y', "-b-|"), ('z', "-c-|")],
      &V,
      None,
    );
    ts.flush();
  }

  #[rxengine_macro::test]
  fn selector_failure_errors_window_and_output() {
    let ts = TestScheduler::new();
    let source = ts.hot::<i32, &str, _>("^-a-b-|", &V, None);
    let calls = Rc::new(Cell::new(0));
    let c_calls = calls.clone();
    let closing = ts.cold::<(), &str, _>("-x", &[('x', ())], None);
    let c_closing = closing.observable();
    let windows = source.try_window_when(move || {
      c_calls.set(c_calls.get() + 1);
      if c_calls.get() > 1 { Err("no notifier") } else { Ok(c_closing.clone()) }
    });

    ts.expect_observable_of_observables(&windows, None).to_be(
      "x(y#)",
      &[('x', "-|"), ('y', "#")],
      &V,
      Some("no notifier"),
    );
    ts.expect_subscriptions(&source.subscriptions()).to_be("^!");
    ts.flush();
    assert_eq!(calls.get(), 2);
  }

  #[rxengine_macro::test]
  fn source_error_reaches_the_output_before_the_window() {
    let source = Subject::<i32, &str>::new();
    let windows = source.as_observable().window_when(never::<(), &str>);
    let log = Rc::new(RefCell::new(vec![]));
    let (c_log, w_log) = (log.clone(), log.clone());
    windows.subscribe_err(
      move |window| {
        let w_log = w_log.clone();
        window.subscribe_err(|_| {}, move |e| w_log.borrow_mut().push(format!("window:{e}")));
      },
      move |e| c_log.borrow_mut().push(format!("output:{e}")),
    );
    source.error("boom").unwrap();
    assert_eq!(*log.borrow(), ["output:boom", "window:boom"]);
  }
}
