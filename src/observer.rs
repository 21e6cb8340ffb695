//! The consumer side of a stream.

/// Receives the notifications of a stream.
///
/// The engine guarantees at most one terminal call (`error` or `complete`)
/// and no calls after it; implementations don't need to guard themselves.
pub trait Observer<Item, Err> {
  fn next(&mut self, value: Item);

  fn error(&mut self, err: Err);

  fn complete(&mut self);

  /// Whether `error` actually handles errors. Errors sent to an observer
  /// that doesn't are escalated to the unhandled-error reporter.
  #[inline]
  fn handles_errors(&self) -> bool { true }
}

impl<Item, Err, O> Observer<Item, Err> for Box<O>
where
  O: Observer<Item, Err> + ?Sized,
{
  #[inline]
  fn next(&mut self, value: Item) { (**self).next(value) }

  #[inline]
  fn error(&mut self, err: Err) { (**self).error(err) }

  #[inline]
  fn complete(&mut self) { (**self).complete() }

  #[inline]
  fn handles_errors(&self) -> bool { (**self).handles_errors() }
}

/// Observer built from a `next` closure only.
pub struct FnMutObserver<N>(pub N);

impl<Item, Err, N> Observer<Item, Err> for FnMutObserver<N>
where
  N: FnMut(Item),
{
  #[inline]
  fn next(&mut self, value: Item) { (self.0)(value) }

  #[inline]
  fn error(&mut self, _: Err) {}

  #[inline]
  fn complete(&mut self) {}

  #[inline]
  fn handles_errors(&self) -> bool { false }
}

/// Observer built from `next` and `error` closures.
pub struct ErrObserver<N, E> {
  pub next: N,
  pub error: E,
}

impl<Item, Err, N, E> Observer<Item, Err> for ErrObserver<N, E>
where
  N: FnMut(Item),
  E: FnMut(Err),
{
  #[inline]
  fn next(&mut self, value: Item) { (self.next)(value) }

  #[inline]
  fn error(&mut self, err: Err) { (self.error)(err) }

  #[inline]
  fn complete(&mut self) {}
}

/// Observer built from `next`, `error` and `complete` closures.
pub struct AllObserver<N, E, C> {
  pub next: N,
  pub error: E,
  pub complete: C,
}

impl<Item, Err, N, E, C> Observer<Item, Err> for AllObserver<N, E, C>
where
  N: FnMut(Item),
  E: FnMut(Err),
  C: FnMut(),
{
  #[inline]
  fn next(&mut self, value: Item) { (self.next)(value) }

  #[inline]
  fn error(&mut self, err: Err) { (self.error)(err) }

  #[inline]
  fn complete(&mut self) { (self.complete)() }
}

/// Observer that ignores everything it receives but still counts as handling
/// errors.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl<Item, Err> Observer<Item, Err> for NoopObserver {
  fn next(&mut self, _: Item) {}

  fn error(&mut self, _: Err) {}

  fn complete(&mut self) {}
}
