//! The `Repeat` list reconciler (§4.7): keyed or positional diffing that
//! turns one slot list into another with a minimal sequence of inserts,
//! moves, and removes.
//!
//! Grounded on `dom/src/memo_node.rs`'s `ensure_child_attached` /
//! `remove_trailing_children`, which reuse a child by comparing it against
//! the value it last rendered and trim anything left over; `Repeat`
//! generalizes that single-child reuse check into a keyed multiset walk.

use crate::backend::Backend;
use crate::error::RuntimeError;
use crate::part::{NodeId, NodeKind, Part};
use crate::slot::{Slot, SlotKind};
use crate::value::Value;
use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/// One reconciled item: the key it was created under (a stable identity for
/// keyed mode, or nothing for positional mode), the slot rendering its
/// value, and the node that slot inserted -- the handle `Repeat` moves
/// around to reorder items without recreating them.
struct Item {
    key: Option<ItemKey>,
    slot: Slot,
    node: NodeId,
}

/// `Value` is not `Eq`/`Hash` (it carries floats and `Rc<dyn Any>`), so keyed
/// reconciliation projects keys through a small hashable wrapper covering
/// the key shapes a selector can reasonably produce.
#[derive(Clone, PartialEq, Eq, Hash)]
enum ItemKey {
    Int(i64),
    Str(Rc<str>),
    Bool(bool),
}

impl ItemKey {
    fn from_value(value: &Value) -> ItemKey {
        match value {
            Value::Int(i) => ItemKey::Int(*i),
            Value::Bool(b) => ItemKey::Bool(*b),
            Value::Str(s) => ItemKey::Str(s.clone()),
            other => panic!("Repeat key selector returned a non-hashable value: {other:?}"),
        }
    }
}

/// Owns the live slot list rendered at one `ChildNode` part and reconciles
/// it against successive item arrays.
pub struct Repeat {
    anchor: NodeId,
    anchor_node: Rc<Cell<NodeId>>,
    namespace: NodeKind,
    items: Vec<Item>,
}

impl Repeat {
    pub fn new(part: &Part) -> Repeat {
        match part {
            Part::ChildNode { anchor, anchor_node, namespace } => {
                Repeat { anchor: *anchor, anchor_node: anchor_node.clone(), namespace: *namespace, items: Vec::new() }
            }
            _ => panic!("Repeat can only be mounted at a ChildNode part"),
        }
    }

    /// A `ChildNode` part whose `anchor` is the node the new item's binding
    /// should insert itself before -- `ChildNodePrimitive::resolve_binding`
    /// creates and inserts the item's node as a side effect of resolution,
    /// so `before` must already be the correct insertion point.
    fn child_part(&self, before: NodeId) -> Part {
        Part::ChildNode { anchor: before, anchor_node: Rc::new(Cell::new(before)), namespace: self.namespace }
    }

    /// The node a freshly resolved `ChildNode` slot created and inserted, so
    /// `Repeat` can track it without creating a second node of its own.
    fn slot_node(slot: &Slot) -> NodeId {
        match slot.part() {
            Part::ChildNode { anchor_node, .. } => anchor_node.get(),
            _ => unreachable!("Repeat only ever builds ChildNode slots"),
        }
    }

    fn parent(&self, backend: &dyn Backend) -> NodeId {
        backend.parent_of(self.anchor).unwrap_or(self.anchor)
    }

    fn sync_anchor_node(&self) {
        let first = self.items.first().map(|i| i.node).unwrap_or(self.anchor);
        self.anchor_node.set(first);
    }

    /// Positional reconciliation: align by index; mutate slots whose index
    /// still exists; create slots for new tail indices; detach slots past
    /// the new length.
    pub fn reconcile_positional(&mut self, values: Vec<Value>, backend: &dyn Backend) -> Result<(), RuntimeError> {
        let parent = self.parent(backend);
        for (item, value) in self.items.iter_mut().zip(values.iter()) {
            if item.slot.reconcile(value.clone(), backend)? {
                let ctx = crate::binding::CommitContext { backend };
                item.slot.commit(&ctx);
            }
        }
        for stale in self.items.drain(values.len().min(self.items.len())..).collect::<Vec<_>>() {
            backend.remove_child(parent, stale.node);
        }
        for value in values.into_iter().skip(self.items.len()) {
            let slot = Slot::new(SlotKind::Loose, value, self.child_part(self.anchor), backend)?;
            let node = Self::slot_node(&slot);
            self.items.push(Item { key: None, slot, node });
        }
        self.sync_anchor_node();
        Ok(())
    }

    /// Keyed reconciliation per §4.7: a multiset map from key to a FIFO
    /// queue of old items, walked in the new order; unclaimed old items are
    /// detached once the walk completes.
    pub fn reconcile_keyed(
        &mut self,
        values: Vec<Value>,
        key_selector: impl Fn(&Value) -> Value,
        backend: &dyn Backend,
    ) -> Result<(), RuntimeError> {
        let parent = self.parent(backend);
        let mut by_key: HashMap<ItemKey, VecDeque<Item>> = HashMap::new();
        for item in std::mem::take(&mut self.items) {
            if let Some(key) = item.key.clone() {
                by_key.entry(key).or_default().push_back(item);
            }
        }

        let mut running_anchor = self.anchor;
        let mut next_items = Vec::with_capacity(values.len());
        for value in values.into_iter().rev() {
            let key = ItemKey::from_value(&key_selector(&value));
            let mut item = match by_key.get_mut(&key).and_then(|q| q.pop_front()) {
                Some(mut reused) => {
                    if backend.next_sibling(reused.node) != Some(running_anchor) && reused.node != running_anchor {
                        backend.insert_before(parent, reused.node, running_anchor);
                    }
                    if reused.slot.reconcile(value, backend)? {
                        let ctx = crate::binding::CommitContext { backend };
                        reused.slot.commit(&ctx);
                    }
                    reused
                }
                None => {
                    let slot = Slot::new(SlotKind::Loose, value, self.child_part(running_anchor), backend)?;
                    let node = Self::slot_node(&slot);
                    Item { key: Some(key.clone()), slot, node }
                }
            };
            item.key = Some(key);
            running_anchor = item.node;
            next_items.push(item);
        }
        next_items.reverse();

        for (_key, mut leftover) in by_key {
            for stale in leftover.drain(..) {
                backend.remove_child(parent, stale.node);
            }
        }

        self.items = next_items;
        self.sync_anchor_node();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TestBackend;

    fn mount(be: &Rc<TestBackend>) -> (NodeId, Repeat) {
        let container = be.create_element("ul", NodeKind::Html);
        let anchor = be.create_comment("repeat");
        be.append_child(container, anchor);
        let part = Part::ChildNode { anchor, anchor_node: Rc::new(Cell::new(anchor)), namespace: NodeKind::Html };
        (container, Repeat::new(&part))
    }

    #[test]
    fn positional_reconcile_grows_and_shrinks() {
        let be = TestBackend::new();
        let (container, mut repeat) = mount(&be);
        repeat.reconcile_positional(vec![Value::str("a"), Value::str("b")], be.as_ref()).unwrap();
        assert_eq!(be.children_of(container).len(), 3); // 2 items + anchor comment
        repeat.reconcile_positional(vec![Value::str("a")], be.as_ref()).unwrap();
        assert_eq!(be.children_of(container).len(), 2);
    }

    #[test]
    fn keyed_reconcile_reorders_without_recreating_nodes() {
        let be = TestBackend::new();
        let (container, mut repeat) = mount(&be);
        let keyed = |v: &Value| match v {
            Value::Int(n) => Value::Int(*n),
            _ => unreachable!(),
        };
        repeat.reconcile_keyed(vec![Value::Int(1), Value::Int(2), Value::Int(3)], keyed, be.as_ref()).unwrap();
        let nodes_before: Vec<NodeId> = repeat.items.iter().map(|i| i.node).collect();

        repeat.reconcile_keyed(vec![Value::Int(3), Value::Int(1), Value::Int(2)], keyed, be.as_ref()).unwrap();
        let nodes_after: Vec<NodeId> = repeat.items.iter().map(|i| i.node).collect();

        let mut sorted_before = nodes_before.clone();
        sorted_before.sort_by_key(|n| n.0);
        let mut sorted_after = nodes_after.clone();
        sorted_after.sort_by_key(|n| n.0);
        assert_eq!(sorted_before, sorted_after, "no new nodes should have been allocated");
        assert_eq!(be.children_of(container).len(), 4);
    }
}
