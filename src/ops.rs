//! Operators, as inherent methods on [`Observable`].
//!
//! Each operator is an [`Operator`](crate::observable::Operator) applied with
//! [`Observable::lift`]. Operators subscribe their source with
//! [`Observable::subscribe_child`], so disposing the output subscriber stops
//! the source synchronously.

pub mod delay;
pub mod filter;
pub mod finalize;
pub mod group_by;
pub mod map;
pub mod materialize;
pub mod multicast;
pub mod take;
pub mod window_count;
pub mod window_when;

use crate::{observer::Observer, subscriber::Subscriber};

/// Observer handling `next` with a closure and passing errors and completion
/// through to `downstream`.
pub(crate) struct ForwardObserver<Out, Err, N> {
  downstream: Subscriber<Out, Err>,
  next: N,
}

pub(crate) fn forward<In, Out, Err, N>(
  downstream: Subscriber<Out, Err>, next: N,
) -> ForwardObserver<Out, Err, N>
where
  N: FnMut(In, &Subscriber<Out, Err>),
{
  ForwardObserver { downstream, next }
}

impl<In, Out, Err, N> Observer<In, Err> for ForwardObserver<Out, Err, N>
where
  Out: 'static,
  Err: 'static,
  N: FnMut(In, &Subscriber<Out, Err>),
{
  #[inline]
  fn next(&mut self, value: In) { (self.next)(value, &self.downstream) }

  #[inline]
  fn error(&mut self, err: Err) { self.downstream.error(err) }

  #[inline]
  fn complete(&mut self) { self.downstream.complete() }
}
