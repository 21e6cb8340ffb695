use smallvec::SmallVec;

use crate::subscriber::Subscriber;

pub(crate) type Snapshot<Item, Err> = SmallVec<[Subscriber<Item, Err>; 2]>;

/// The live observer list of a subject.
///
/// Entries are keyed by a per-list id so a removal subscription can find its
/// subscriber again. Delivery always works on a [`snapshot`](Self::snapshot),
/// never on the list itself, so observers may subscribe or unsubscribe while
/// a value is being broadcast.
pub(crate) struct Subscribers<Item, Err> {
  next_id: usize,
  entries: SmallVec<[(usize, Subscriber<Item, Err>); 2]>,
}

impl<Item, Err> Default for Subscribers<Item, Err> {
  fn default() -> Self { Subscribers { next_id: 0, entries: SmallVec::new() } }
}

impl<Item, Err> Subscribers<Item, Err> {
  /// Appends `subscriber` and returns its id.
  pub(crate) fn add(&mut self, subscriber: Subscriber<Item, Err>) -> usize {
    let id = self.next_id;
    self.next_id += 1;
    self.entries.push((id, subscriber));
    id
  }

  pub(crate) fn remove(&mut self, id: usize) -> Option<Subscriber<Item, Err>> {
    let pos = self.entries.iter().position(|(i, _)| *i == id)?;
    Some(self.entries.remove(pos).1)
  }

  #[inline]
  pub(crate) fn len(&self) -> usize { self.entries.len() }

  pub(crate) fn snapshot(&self) -> Snapshot<Item, Err> {
    self.entries.iter().map(|(_, s)| s.clone()).collect()
  }

  /// Empties the list, returning what it held.
  pub(crate) fn take(&mut self) -> Snapshot<Item, Err> {
    self.entries.drain(..).map(|(_, s)| s).collect()
  }
}

/// Sends `value` to every target: the last one receives the value itself, the
/// others a clone.
pub(crate) fn broadcast_value<Item, Err>(targets: &[Subscriber<Item, Err>], value: Item)
where
  Item: Clone + 'static,
  Err: 'static,
{
  let mut iter = targets.iter().peekable();
  while let Some(subscriber) = iter.next() {
    if iter.peek().is_some() {
      subscriber.next(value.clone());
    } else {
      subscriber.next(value);
      break;
    }
  }
}

pub(crate) fn broadcast_error<Item, Err>(targets: &[Subscriber<Item, Err>], err: Err)
where
  Item: 'static,
  Err: Clone + 'static,
{
  let mut iter = targets.iter().peekable();
  while let Some(subscriber) = iter.next() {
    if iter.peek().is_some() {
      subscriber.error(err.clone());
    } else {
      subscriber.error(err);
      break;
    }
  }
}
