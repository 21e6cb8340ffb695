//! Thread-local storage for disposal nodes.
//!
//! Nodes live in a generational arena. A [`NodeId`] is an `(index,
//! generation)` pair; releasing a node bumps the slot generation so every id
//! still pointing at it reads as closed, and the slot goes back on the free
//! list. Parent links are plain ids, so the tree never forms an `Rc` cycle.
//!
//! The arena is never borrowed while user code runs: callers take what they
//! need out of a node inside [`with_arena`] and invoke teardowns afterwards.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::Teardown;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct NodeId {
  index: u32,
  generation: u32,
}

impl NodeId {
  pub(crate) const EMPTY: NodeId = NodeId { index: u32::MAX, generation: 0 };
}

#[derive(Default)]
pub(crate) struct Node {
  pub(crate) teardown: Option<Teardown>,
  pub(crate) children: SmallVec<[NodeId; 2]>,
  pub(crate) parents: SmallVec<[NodeId; 1]>,
}

struct Slot {
  generation: u32,
  node: Option<Node>,
}

#[derive(Default)]
pub(crate) struct Arena {
  slots: Vec<Slot>,
  free: Vec<u32>,
}

impl Arena {
  pub(crate) fn insert(&mut self, node: Node) -> NodeId {
    if let Some(index) = self.free.pop() {
      let slot = &mut self.slots[index as usize];
      slot.node = Some(node);
      NodeId { index, generation: slot.generation }
    } else {
      let index = self.slots.len() as u32;
      self.slots.push(Slot { generation: 0, node: Some(node) });
      NodeId { index, generation: 0 }
    }
  }

  pub(crate) fn get(&self, id: NodeId) -> Option<&Node> {
    self
      .slots
      .get(id.index as usize)
      .filter(|slot| slot.generation == id.generation)
      .and_then(|slot| slot.node.as_ref())
  }

  pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
    self
      .slots
      .get_mut(id.index as usize)
      .filter(|slot| slot.generation == id.generation)
      .and_then(|slot| slot.node.as_mut())
  }

  #[inline]
  pub(crate) fn contains(&self, id: NodeId) -> bool { self.get(id).is_some() }

  /// Takes the node out of the arena. The id and every copy of it are closed
  /// from here on.
  pub(crate) fn release(&mut self, id: NodeId) -> Option<Node> {
    let slot = self.slots.get_mut(id.index as usize)?;
    if slot.generation != id.generation {
      return None;
    }
    let node = slot.node.take()?;
    slot.generation = slot.generation.wrapping_add(1);
    self.free.push(id.index);
    Some(node)
  }

  /// Number of live nodes.
  #[cfg(test)]
  pub(crate) fn len(&self) -> usize { self.slots.len() - self.free.len() }
}

thread_local! {
  static ARENA: RefCell<Arena> = RefCell::new(Arena::default());
}

pub(crate) fn with_arena<R>(f: impl FnOnce(&mut Arena) -> R) -> R {
  ARENA.with(|arena| f(&mut arena.borrow_mut()))
}
