//! The slot (§3): a binding wrapper with directive-aware reconciliation.
//!
//! Grounded on `dom/src/memo_node.rs`'s `ensure_child_attached`, which
//! decides whether to reuse or replace a child node keyed by the value it
//! last rendered; `Slot::reconcile` generalizes that reuse-or-replace
//! decision from "same tag name" to "same resolved directive".

use crate::backend::Backend;
use crate::binding::{Binding, CommitContext};
use crate::directive::{resolve_directive, Memo};
use crate::error::RuntimeError;
use crate::frame::RenderFrame;
use crate::part::Part;
use crate::value::Value;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SlotKind {
    /// The value must remain under the same directive for the slot's
    /// lifetime; a directive change rebinds eagerly (no state preservation).
    Strict,
    /// Permits swapping the underlying binding when the directive changes,
    /// preserving state for directives seen before via a `Memo` park table.
    /// Used at `ChildNode` parts so the anchor comment's identity survives a
    /// conditional swap between, say, a text node and a component.
    Loose,
}

pub struct Slot {
    kind: SlotKind,
    part: Part,
    binding: Box<dyn Binding>,
    memo: Memo,
}

impl Slot {
    pub fn new(kind: SlotKind, value: Value, part: Part, backend: &dyn Backend) -> Result<Slot, RuntimeError> {
        let directive = resolve_directive(&value, &part);
        let binding = directive.resolve_binding(value, part.clone(), backend)?;
        Ok(Slot { kind, part, binding, memo: Memo::new() })
    }

    pub fn part(&self) -> &Part {
        &self.part
    }

    pub fn binding(&self) -> &dyn Binding {
        self.binding.as_ref()
    }

    /// Apply a new value, swapping the underlying binding if its directive
    /// differs from the one currently installed. Returns `true` if the new
    /// value actually requires a `commit` (the caller enqueues one).
    pub fn reconcile(&mut self, value: Value, backend: &dyn Backend) -> Result<bool, RuntimeError> {
        let directive = resolve_directive(&value, &self.part);
        if directive.name() == self.binding.directive_name() {
            let changed = self.binding.should_bind(&value);
            if changed {
                self.binding.rebind(value);
            }
            return Ok(changed);
        }

        match self.kind {
            SlotKind::Strict => {
                let mut fresh = directive.resolve_binding(value, self.part.clone(), backend)?;
                let ctx = CommitContext { backend };
                self.binding.rollback(&ctx);
                std::mem::swap(&mut self.binding, &mut fresh);
                Ok(true)
            }
            SlotKind::Loose => {
                let ctx = CommitContext { backend };
                self.binding.rollback(&ctx);
                // Resolve the new directive first (reusing a previously parked
                // binding of its type if one exists), then swap it in and park
                // the old one under its own directive name -- exactly one
                // rollback, exactly one swap, no throwaway binding created.
                let mut next = self.memo.resolve(&directive, value, self.part.clone(), backend)?;
                std::mem::swap(&mut self.binding, &mut next);
                self.memo.park(next);
                Ok(true)
            }
        }
    }

    pub fn attach(&mut self, frame: &mut RenderFrame) {
        self.binding.attach(frame);
    }

    pub fn detach(&mut self, frame: &mut RenderFrame) {
        self.binding.detach(frame);
    }

    pub fn commit(&mut self, ctx: &CommitContext) {
        self.binding.commit(ctx);
    }

    /// Mark this slot's binding as already reflecting its value, because
    /// `Template::hydrate` matched it against existing markup; the next
    /// `commit` is then a no-op as long as the value doesn't change.
    pub fn mark_hydrated(&mut self) {
        self.binding.mark_hydrated();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TestBackend;
    use crate::part::NodeKind;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn strict_slot_rebinds_in_place_for_same_directive() {
        let be = TestBackend::new();
        let el = be.create_element("div", NodeKind::Html);
        let part = Part::Attribute { element: el, name: "title" };
        let mut slot = Slot::new(SlotKind::Strict, Value::str("a"), part, be.as_ref()).unwrap();
        let ctx = CommitContext { backend: be.as_ref() };
        slot.commit(&ctx);
        assert!(slot.reconcile(Value::str("b"), be.as_ref()).unwrap());
        slot.commit(&ctx);
        assert_eq!(be.attribute_of(el, "title"), Some("b".into()));
    }

    #[test]
    fn loose_slot_switches_directives_without_leaking_a_placeholder_node() {
        let be = TestBackend::new();
        let container = be.create_element("div", NodeKind::Html);
        let anchor = be.create_comment("slot");
        be.append_child(container, anchor);
        let part = Part::ChildNode { anchor, anchor_node: Rc::new(Cell::new(anchor)), namespace: NodeKind::Html };
        let mut slot = Slot::new(SlotKind::Loose, Value::str("a"), part, be.as_ref()).unwrap();
        assert_eq!(be.children_of(container).len(), 2, "anchor plus the text node");

        assert!(slot.reconcile(Value::Null, be.as_ref()).unwrap());
        assert_eq!(be.children_of(container).len(), 2, "switching to blackhole must not create a placeholder node");

        assert!(slot.reconcile(Value::str("a"), be.as_ref()).unwrap());
        assert_eq!(be.children_of(container).len(), 2, "switching back reuses the parked binding, not a fresh node");
    }
}
