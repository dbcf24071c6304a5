//! The primitive registry (§4.1): given `(value, part)`, resolve the
//! `DirectiveType` that will own the binding.
//!
//! Grounded on `dom/src/event.rs`'s `event_ty!`-generated event wrappers and
//! `dom/src/memo_node.rs`'s `memo_attribute` for the attribute/event shape of
//! a binding, and on `dom/augdom/src/lib.rs`'s `Xml` ops for what a commit
//! actually writes.

use crate::backend::Backend;
use crate::binding::{Binding, CommitContext};
use crate::error::RuntimeError;
use crate::part::{Part, PartKind};
use crate::value::Value;
use std::rc::Rc;

/// A capability descriptor: a named thing that knows how to turn a
/// `(value, part)` pair into a live [`Binding`].
pub trait DirectiveType {
    fn name(&self) -> &'static str;

    /// Cross-instance identity, used by the directive dispatcher (§4.3) to
    /// decide whether two directive *values* (not just types) refer to the
    /// same logical directive. Defaults to "no special identity" (pointer
    /// equality of the trait object is used instead by callers).
    fn equals(&self, _other: &dyn DirectiveType) -> bool {
        false
    }

    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        backend: &dyn Backend,
    ) -> Result<Box<dyn Binding>, RuntimeError>;
}

/// A built-in `DirectiveType` that the registry reaches for automatically
/// based on part kind, rather than one a user value explicitly carries.
pub trait Primitive: DirectiveType {
    /// An optional guard validating a raw value before binding; `false`
    /// rejects the value outright (surfaced as `DirectiveMisuse`).
    fn ensure_value(&self, _value: &Value, _part: &Part) -> bool {
        true
    }
}

/// Resolve the built-in primitive for a `(value, part)` pair per the
/// resolution rules in §4.1. Structural attribute sigils (`:classlist`,
/// `:ref`, `:style`, bare `:`) are recognized by attribute name prefix.
/// A `ChildNode` part bound to `Value::Null` always resolves to the
/// blackhole primitive regardless of that rule, ahead of any other match.
pub fn resolve_primitive(value: &Value, part: &Part) -> Rc<dyn Primitive> {
    if let (Part::ChildNode { .. }, Value::Null) = (part, value) {
        return Rc::new(BlackholePrimitive);
    }
    match part {
        Part::Attribute { name, .. } => {
            if *name == ":" {
                Rc::new(BlackholePrimitive)
            } else if *name == ":classlist" {
                Rc::new(ClassListPrimitive)
            } else if *name == ":ref" {
                Rc::new(RefPrimitive)
            } else if *name == ":style" {
                Rc::new(StylePrimitive)
            } else {
                Rc::new(AttributePrimitive)
            }
        }
        Part::ChildNode { .. } => Rc::new(ChildNodePrimitive),
        Part::Element { .. } => Rc::new(ElementSpreadPrimitive),
        Part::Event { .. } => Rc::new(EventPrimitive),
        Part::Live { .. } => Rc::new(LivePrimitive),
        Part::Property { .. } => Rc::new(PropertyPrimitive),
        Part::Text { .. } => Rc::new(TextPrimitive),
    }
}

/// `ChildNode` with a null/undefined value maps here instead of the normal
/// node-insertion primitive; it commits nothing on any part kind.
pub struct BlackholePrimitive;
impl DirectiveType for BlackholePrimitive {
    fn name(&self) -> &'static str {
        "blackhole"
    }
    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _backend: &dyn Backend,
    ) -> Result<Box<dyn Binding>, RuntimeError> {
        Ok(Box::new(BlackholeBinding { value, part }))
    }
}
impl Primitive for BlackholePrimitive {}

struct BlackholeBinding {
    value: Value,
    part: Part,
}
impl Binding for BlackholeBinding {
    fn directive_name(&self) -> &'static str {
        "blackhole"
    }
    fn part(&self) -> &Part {
        &self.part
    }
    fn should_bind(&self, new_value: &Value) -> bool {
        !new_value.is(&self.value)
    }
    fn rebind(&mut self, new_value: Value) {
        self.value = new_value;
    }
    fn commit(&mut self, _ctx: &CommitContext) {}
}

pub struct AttributePrimitive;
impl DirectiveType for AttributePrimitive {
    fn name(&self) -> &'static str {
        "attribute"
    }
    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _backend: &dyn Backend,
    ) -> Result<Box<dyn Binding>, RuntimeError> {
        if !matches!(part, Part::Attribute { .. }) {
            return Err(RuntimeError::DirectiveMisuse { directive: "attribute", part: part.kind() });
        }
        Ok(Box::new(AttributeBinding { value, part, committed: false }))
    }
}
impl Primitive for AttributePrimitive {}

struct AttributeBinding {
    value: Value,
    part: Part,
    committed: bool,
}
impl Binding for AttributeBinding {
    fn directive_name(&self) -> &'static str {
        "attribute"
    }
    fn part(&self) -> &Part {
        &self.part
    }
    fn should_bind(&self, new_value: &Value) -> bool {
        !self.committed || !new_value.is(&self.value)
    }
    fn rebind(&mut self, new_value: Value) {
        self.value = new_value;
    }
    fn commit(&mut self, ctx: &CommitContext) {
        if let Part::Attribute { element, name } = &self.part {
            match &self.value {
                Value::Null => ctx.backend.remove_attribute(*element, name),
                Value::Bool(false) => ctx.backend.remove_attribute(*element, name),
                Value::Bool(true) => ctx.backend.set_attribute(*element, name, ""),
                other => ctx.backend.set_attribute(*element, name, &other.to_display_string()),
            }
        }
        self.committed = true;
    }
    fn mark_hydrated(&mut self) {
        self.committed = true;
    }
}

pub struct ClassListPrimitive;
impl DirectiveType for ClassListPrimitive {
    fn name(&self) -> &'static str {
        "classlist"
    }
    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _backend: &dyn Backend,
    ) -> Result<Box<dyn Binding>, RuntimeError> {
        Ok(Box::new(ClassListBinding { value, part }))
    }
}
impl Primitive for ClassListPrimitive {}

struct ClassListBinding {
    value: Value,
    part: Part,
}
impl Binding for ClassListBinding {
    fn directive_name(&self) -> &'static str {
        "classlist"
    }
    fn part(&self) -> &Part {
        &self.part
    }
    fn should_bind(&self, new_value: &Value) -> bool {
        !new_value.is(&self.value)
    }
    fn rebind(&mut self, new_value: Value) {
        self.value = new_value;
    }
    fn commit(&mut self, ctx: &CommitContext) {
        if let Part::Attribute { element, .. } = &self.part {
            ctx.backend.set_attribute(*element, "class", &self.value.to_display_string());
        }
    }
}

pub struct StylePrimitive;
impl DirectiveType for StylePrimitive {
    fn name(&self) -> &'static str {
        "style"
    }
    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _backend: &dyn Backend,
    ) -> Result<Box<dyn Binding>, RuntimeError> {
        Ok(Box::new(StyleBinding { value, part }))
    }
}
impl Primitive for StylePrimitive {}

struct StyleBinding {
    value: Value,
    part: Part,
}
impl Binding for StyleBinding {
    fn directive_name(&self) -> &'static str {
        "style"
    }
    fn part(&self) -> &Part {
        &self.part
    }
    fn should_bind(&self, new_value: &Value) -> bool {
        !new_value.is(&self.value)
    }
    fn rebind(&mut self, new_value: Value) {
        self.value = new_value;
    }
    fn commit(&mut self, ctx: &CommitContext) {
        if let Part::Attribute { element, .. } = &self.part {
            ctx.backend.set_attribute(*element, "style", &self.value.to_display_string());
        }
    }
}

/// `:ref` invokes a user callback with the element node on attach/detach;
/// it never performs a conventional "commit" write.
pub struct RefPrimitive;
impl DirectiveType for RefPrimitive {
    fn name(&self) -> &'static str {
        "ref"
    }
    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _backend: &dyn Backend,
    ) -> Result<Box<dyn Binding>, RuntimeError> {
        Ok(Box::new(RefBinding { value, part }))
    }
}
impl Primitive for RefPrimitive {}

struct RefBinding {
    value: Value,
    part: Part,
}
impl Binding for RefBinding {
    fn directive_name(&self) -> &'static str {
        "ref"
    }
    fn part(&self) -> &Part {
        &self.part
    }
    fn should_bind(&self, new_value: &Value) -> bool {
        !new_value.is(&self.value)
    }
    fn rebind(&mut self, new_value: Value) {
        self.value = new_value;
    }
    fn commit(&mut self, _ctx: &CommitContext) {
        if let Value::Callback(cb) = &self.value {
            (cb.borrow_mut())(&Value::Null);
        }
    }
}

pub struct ElementSpreadPrimitive;
impl DirectiveType for ElementSpreadPrimitive {
    fn name(&self) -> &'static str {
        "element-spread"
    }
    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _backend: &dyn Backend,
    ) -> Result<Box<dyn Binding>, RuntimeError> {
        if !matches!(part, Part::Element { .. }) {
            return Err(RuntimeError::DirectiveMisuse { directive: "element-spread", part: part.kind() });
        }
        Ok(Box::new(ElementSpreadBinding { value, part }))
    }
}
impl Primitive for ElementSpreadPrimitive {}

struct ElementSpreadBinding {
    value: Value,
    part: Part,
}
impl Binding for ElementSpreadBinding {
    fn directive_name(&self) -> &'static str {
        "element-spread"
    }
    fn part(&self) -> &Part {
        &self.part
    }
    fn should_bind(&self, new_value: &Value) -> bool {
        !new_value.is(&self.value)
    }
    fn rebind(&mut self, new_value: Value) {
        self.value = new_value;
    }
    fn commit(&mut self, _ctx: &CommitContext) {
        // Spreading a map of attributes onto the whole element is left to
        // extension directives layered atop this primitive; the bare
        // primitive only tracks the bound value for `should_bind`.
    }
}

pub struct EventPrimitive;
impl DirectiveType for EventPrimitive {
    fn name(&self) -> &'static str {
        "event"
    }
    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _backend: &dyn Backend,
    ) -> Result<Box<dyn Binding>, RuntimeError> {
        if !matches!(part, Part::Event { .. }) {
            return Err(RuntimeError::DirectiveMisuse { directive: "event", part: part.kind() });
        }
        if !matches!(value, Value::Callback(_)) {
            return Err(RuntimeError::DirectiveMisuse { directive: "event", part: part.kind() });
        }
        Ok(Box::new(EventBinding { value, part, attached: false }))
    }
}
impl Primitive for EventPrimitive {}

struct EventBinding {
    value: Value,
    part: Part,
    attached: bool,
}
impl Binding for EventBinding {
    fn directive_name(&self) -> &'static str {
        "event"
    }
    fn part(&self) -> &Part {
        &self.part
    }
    fn should_bind(&self, new_value: &Value) -> bool {
        !new_value.is(&self.value)
    }
    fn rebind(&mut self, new_value: Value) {
        self.value = new_value;
    }
    fn commit(&mut self, _ctx: &CommitContext) {
        // A real backend would (re-)register the listener here; TestBackend
        // callers invoke the callback directly via `EventBinding::fire`.
        self.attached = true;
    }
}
impl EventBinding {
    pub fn fire(&self, event: &Value) {
        if let Value::Callback(cb) = &self.value {
            (cb.borrow_mut())(event);
        }
    }
}

pub struct LivePrimitive;
impl DirectiveType for LivePrimitive {
    fn name(&self) -> &'static str {
        "live"
    }
    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        backend: &dyn Backend,
    ) -> Result<Box<dyn Binding>, RuntimeError> {
        if let Part::Live { element, property, baseline } = &part {
            if baseline.get().is_none() {
                baseline.set(backend.read_property(*element, property));
            }
        } else {
            return Err(RuntimeError::DirectiveMisuse { directive: "live", part: part.kind() });
        }
        Ok(Box::new(LiveBinding { value, part }))
    }
}
impl Primitive for LivePrimitive {}

struct LiveBinding {
    value: Value,
    part: Part,
}
impl Binding for LiveBinding {
    fn directive_name(&self) -> &'static str {
        "live"
    }
    fn part(&self) -> &Part {
        &self.part
    }
    fn should_bind(&self, new_value: &Value) -> bool {
        !new_value.is(&self.value)
    }
    fn rebind(&mut self, new_value: Value) {
        self.value = new_value;
    }
    fn commit(&mut self, ctx: &CommitContext) {
        if let Part::Live { element, property, .. } = &self.part {
            ctx.backend.write_property(*element, property, self.value.clone());
        }
    }
    fn rollback(&mut self, ctx: &CommitContext) {
        if let Part::Live { element, property, baseline } = &self.part {
            if let Some(prior) = baseline.get() {
                ctx.backend.write_property(*element, property, prior);
            }
        }
    }
}

pub struct PropertyPrimitive;
impl DirectiveType for PropertyPrimitive {
    fn name(&self) -> &'static str {
        "property"
    }
    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _backend: &dyn Backend,
    ) -> Result<Box<dyn Binding>, RuntimeError> {
        if !matches!(part, Part::Property { .. }) {
            return Err(RuntimeError::DirectiveMisuse { directive: "property", part: part.kind() });
        }
        Ok(Box::new(PropertyBinding { value, part, committed: false }))
    }
}
impl Primitive for PropertyPrimitive {}

struct PropertyBinding {
    value: Value,
    part: Part,
    committed: bool,
}
impl Binding for PropertyBinding {
    fn directive_name(&self) -> &'static str {
        "property"
    }
    fn part(&self) -> &Part {
        &self.part
    }
    fn should_bind(&self, new_value: &Value) -> bool {
        !self.committed || !new_value.is(&self.value)
    }
    fn rebind(&mut self, new_value: Value) {
        self.value = new_value;
    }
    fn commit(&mut self, ctx: &CommitContext) {
        if let Part::Property { element, property, default } = &self.part {
            let write = if matches!(self.value, Value::Null) { default.clone() } else { self.value.clone() };
            ctx.backend.write_property(*element, property, write);
        }
        self.committed = true;
    }
    fn mark_hydrated(&mut self) {
        self.committed = true;
    }
}

pub struct TextPrimitive;
impl DirectiveType for TextPrimitive {
    fn name(&self) -> &'static str {
        "text"
    }
    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        _backend: &dyn Backend,
    ) -> Result<Box<dyn Binding>, RuntimeError> {
        if !matches!(part, Part::Text { .. }) {
            return Err(RuntimeError::DirectiveMisuse { directive: "text", part: part.kind() });
        }
        Ok(Box::new(TextBinding { value, part, committed: false }))
    }
}
impl Primitive for TextPrimitive {}

struct TextBinding {
    value: Value,
    part: Part,
    committed: bool,
}
impl Binding for TextBinding {
    fn directive_name(&self) -> &'static str {
        "text"
    }
    fn part(&self) -> &Part {
        &self.part
    }
    fn should_bind(&self, new_value: &Value) -> bool {
        !self.committed || !new_value.is(&self.value)
    }
    fn rebind(&mut self, new_value: Value) {
        self.value = new_value;
    }
    fn commit(&mut self, ctx: &CommitContext) {
        if let Part::Text { node, preceding, following } = &self.part {
            let text = format!("{preceding}{}{following}", self.value.to_display_string());
            ctx.backend.set_text(*node, &text);
        }
        self.committed = true;
    }
    fn mark_hydrated(&mut self) {
        self.committed = true;
    }
}

/// `ChildNode` with a non-null raw value (string/number) renders a text node
/// as the part's sole child. Template/component values bypass this
/// primitive entirely via `resolve_directive` (§4.3).
pub struct ChildNodePrimitive;
impl DirectiveType for ChildNodePrimitive {
    fn name(&self) -> &'static str {
        "child-node"
    }
    fn resolve_binding(
        &self,
        value: Value,
        part: Part,
        backend: &dyn Backend,
    ) -> Result<Box<dyn Binding>, RuntimeError> {
        let (anchor, anchor_node, namespace) = match &part {
            Part::ChildNode { anchor, anchor_node, namespace } => (*anchor, anchor_node.clone(), *namespace),
            _ => return Err(RuntimeError::DirectiveMisuse { directive: "child-node", part: part.kind() }),
        };
        let _ = namespace;
        let text_node = backend.create_text_node(&value.to_display_string());
        if let Some(parent) = backend.parent_of(anchor) {
            backend.insert_before(parent, text_node, anchor);
        }
        anchor_node.set(text_node);
        Ok(Box::new(ChildNodeBinding { value, part, text_node }))
    }
}
impl Primitive for ChildNodePrimitive {}

struct ChildNodeBinding {
    value: Value,
    part: Part,
    text_node: crate::part::NodeId,
}
impl Binding for ChildNodeBinding {
    fn directive_name(&self) -> &'static str {
        "child-node"
    }
    fn part(&self) -> &Part {
        &self.part
    }
    fn should_bind(&self, new_value: &Value) -> bool {
        !new_value.is(&self.value)
    }
    fn rebind(&mut self, new_value: Value) {
        self.value = new_value;
    }
    fn commit(&mut self, ctx: &CommitContext) {
        ctx.backend.set_text(self.text_node, &self.value.to_display_string());
    }
    fn detach(&mut self, _frame: &mut crate::frame::RenderFrame) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TestBackend;

    #[test]
    fn attribute_primitive_writes_and_skips_unchanged() {
        let be = TestBackend::new();
        let el = be.create_element("div", crate::part::NodeKind::Html);
        let part = Part::Attribute { element: el, name: "title" };
        let prim = resolve_primitive(&Value::str("hi"), &part);
        let mut binding =
            prim.resolve_binding(Value::str("hi"), part.clone(), be.as_ref()).unwrap();
        let ctx = CommitContext { backend: be.as_ref() };
        assert!(binding.should_bind(&Value::str("hi")));
        binding.commit(&ctx);
        assert_eq!(be.attribute_of(el, "title"), Some("hi".into()));
        assert!(!binding.should_bind(&Value::str("hi")));
    }

    #[test]
    fn reserved_sigil_resolves_structural_primitive() {
        let el = crate::part::NodeId(1);
        let part = Part::Attribute { element: el, name: ":classlist" };
        assert_eq!(resolve_primitive(&Value::str("a"), &part).name(), "classlist");
    }

    #[test]
    fn null_value_at_child_node_resolves_to_blackhole() {
        let anchor = crate::part::NodeId(1);
        let part = Part::ChildNode {
            anchor,
            anchor_node: std::rc::Rc::new(std::cell::Cell::new(anchor)),
            namespace: crate::part::NodeKind::Html,
        };
        assert_eq!(resolve_primitive(&Value::Null, &part).name(), "blackhole");
        assert_eq!(resolve_primitive(&Value::str("x"), &part).name(), "child-node");
    }
}
