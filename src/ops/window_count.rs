use std::collections::VecDeque;

use crate::{
  config::report_unhandled_error,
  observable::{Observable, Operator},
  observer::Observer,
  subject::{Subject, SubjectLike},
  subscriber::Subscriber,
  subscription::TeardownLogic,
};

pub struct WindowCountOp {
  size: usize,
  start_every: usize,
}

/// The open windows, oldest first.
struct WindowCountObserver<Item, Err> {
  downstream: Subscriber<Observable<Item, Err>, Err>,
  windows: VecDeque<Subject<Item, Err>>,
  size: usize,
  start_every: usize,
  count: usize,
}

impl<Item, Err> WindowCountObserver<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  fn open_window(&mut self) {
    let window = Subject::new();
    self.windows.push_back(window.clone());
    self.downstream.next(window.as_observable());
  }
}

fn check(result: Result<(), crate::error::RxError>) {
  if let Err(err) = result {
    report_unhandled_error(err);
  }
}

impl<Item, Err> Observer<Item, Err> for WindowCountObserver<Item, Err>
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  fn next(&mut self, value: Item) {
    let open: Vec<_> = self.windows.iter().cloned().collect();
    for window in open {
      if self.downstream.is_closed() {
        break;
      }
      check(window.next(value.clone()));
    }

    // `count + 1` values seen so far, the oldest window is full when
    // `count + 1 - size` is a multiple of `start_every`
    if let Some(filled) = (self.count + 1).checked_sub(self.size) {
      if filled % self.start_every == 0 && !self.downstream.is_closed() {
        if let Some(window) = self.windows.pop_front() {
          check(window.complete());
        }
      }
    }
    self.count += 1;
    if self.count % self.start_every == 0 && !self.downstream.is_closed() {
      self.open_window();
    }
  }

  fn error(&mut self, err: Err) {
    while let Some(window) = self.windows.pop_front() {
      check(window.error(err.clone()));
    }
    self.downstream.error(err);
  }

  fn complete(&mut self) {
    while let Some(window) = self.windows.pop_front() {
      check(window.complete());
    }
    self.downstream.complete();
  }
}

impl<Item, Err> Operator<Item, Err, Observable<Item, Err>, Err> for WindowCountOp
where
  Item: Clone + 'static,
  Err: Clone + 'static,
{
  fn call(
    &self, downstream: Subscriber<Observable<Item, Err>, Err>, source: &Observable<Item, Err>,
  ) -> TeardownLogic {
    let mut observer = WindowCountObserver {
      downstream: downstream.clone(),
      windows: VecDeque::new(),
      size: self.size,
      start_every: self.start_every,
      count: 0,
    };
    observer.open_window();
    source.subscribe_child(downstream.subscription(), observer).into()
  }
}

impl<Item: Clone + 'static, Err: Clone + 'static> Observable<Item, Err> {
  /// Splits the source into windows of `size` values each.
  ///
  /// A new window opens every `start_every` values (`None` or `0` means
  /// `size`, i.e. back to back windows). The first window opens on
  /// subscription. `size` is at least one.
  pub fn window_count(
    &self, size: usize, start_every: Option<usize>,
  ) -> Observable<Observable<Item, Err>, Err> {
    let size = size.max(1);
    let start_every = start_every.filter(|n| *n > 0).unwrap_or(size);
    self.lift(WindowCountOp { size, start_every })
  }
}

#[cfg(test)]
mod tests {
  use std::{cell::RefCell, rc::Rc};

  use super::*;
  use crate::{observable::of, scheduler::TestScheduler};

  fn windows(source: Observable<char, ()>, size: usize, every: Option<usize>) -> Vec<Vec<char>> {
    let all: Rc<RefCell<Vec<Rc<RefCell<Vec<char>>>>>> = Rc::default();
    let c_all = all.clone();
    source.window_count(size, every).subscribe(move |window| {
      let values = Rc::new(RefCell::new(vec![]));
      let c_values = values.clone();
      window.subscribe(move |v| c_values.borrow_mut().push(v));
      c_all.borrow_mut().push(values);
    });
    let all = all.borrow();
    all.iter().map(|w| w.borrow().clone()).collect()
  }

  #[rxengine_macro::test]
  fn back_to_back_windows() {
    let result = windows(of("abcde".chars()), 2, None);
    assert_eq!(result, [vec!['a', 'b'], vec!['c', 'd'], vec!['e']]);
  }

  #[rxengine_macro::test]
  fn overlapping_windows() {
    let result = windows(of("abcde".chars()), 3, Some(1));
    assert_eq!(
      result,
      [
        vec!['a', 'b', 'c'],
        vec!['b', 'c', 'd'],
        vec!['c', 'd', 'e'],
        vec!['d', 'e'],
        vec!['e'],
        vec![],
      ]
    );
  }

  #[rxengine_macro::test]
  fn skipping_windows() {
    let result = windows(of("abcdefg".chars()), 2, Some(3));
    assert_eq!(result, [vec!['a', 'b'], vec!['d', 'e'], vec!['g']]);
  }

  #[rxengine_macro::test]
  fn zero_size_is_clamped() {
    let result = windows(of("ab".chars()), 0, None);
    assert_eq!(result, [vec!['a'], vec!['b'], vec![]]);
  }

  #[rxengine_macro::test]
  fn windows_in_marbles() {
    let ts = TestScheduler::new();
    let values = [('a', 1), ('b', 2), ('c', 3), ('d', 4), ('e', 5)];
    let source = ts.hot::<i32, &str, _>("^-a--b--c--d--e--|", &values, None);
    ts.expect_observable_of_observables(&source.window_count(2, None), None).to_be(
      "x----y-----z-----|",
      &[('x', "--a--(b|)"), ('y', "---c--(d|)"), ('z', "---e--|")],
      &values,
      None,
    );
    ts.expect_subscriptions(&source.subscriptions()).to_be("^----------------!");
    ts.flush();
  }
}
