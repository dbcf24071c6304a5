//! The `Binding` trait (§3): a live connection between a value and a part,
//! capable of committing and rolling back host mutations.
//!
//! Grounded on `dom/src/memo_node.rs`'s `memo_attribute`, which pairs a
//! value write with a `scopeguard`-based rollback closure; `Binding::commit`
//! / `Binding::rollback` generalize that pairing into an explicit trait
//! rather than an ad hoc guard, since the design requires many distinct
//! binding shapes (attribute, event, live, ...) to share one reconciliation
//! surface (`Slot`).

use crate::backend::Backend;
use crate::frame::RenderFrame;
use crate::part::Part;
use crate::value::Value;

pub struct CommitContext<'a> {
    pub backend: &'a dyn Backend,
}

/// Holds `(type, value, part)` plus commit state, per §3.
pub trait Binding {
    fn directive_name(&self) -> &'static str;
    fn part(&self) -> &Part;

    /// Identity or structural equality check against a candidate new value.
    /// `false` means a repeat `commit` would be a no-op and must be elided
    /// (§8: "subsequent `bind(v)` with `shouldBind(v) == false` does not
    /// mutate the DOM").
    fn should_bind(&self, new_value: &Value) -> bool;

    /// Replace the binding's stored value ahead of the next `commit`. Called
    /// only when `should_bind` returned `true`.
    fn rebind(&mut self, new_value: Value);

    /// Lifecycle notification letting a binding enqueue itself into one of
    /// the frame's effect buckets (e.g. an event binding queuing a listener
    /// attach as a mutation effect). Default: no-op.
    fn attach(&mut self, _frame: &mut RenderFrame) {}
    fn detach(&mut self, _frame: &mut RenderFrame) {}

    /// Synchronous DOM mutation during a commit phase.
    fn commit(&mut self, ctx: &CommitContext);

    /// Synchronous DOM mutation undoing the most recent `commit`, used when
    /// a `Slot` parks this binding in favor of a new directive (§4.3) or
    /// when a `Live` part needs to restore its pre-binding baseline.
    fn rollback(&mut self, _ctx: &CommitContext) {}

    /// Mark this binding as already reflecting its bound value without
    /// performing a write, because `Template::hydrate` found matching
    /// pre-rendered markup. Default: no-op, appropriate for bindings with no
    /// "already committed" bookkeeping of their own.
    fn mark_hydrated(&mut self) {}
}
