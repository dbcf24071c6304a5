//! Directive dispatch & Memo (§4.3): turning a raw value into a binding,
//! and preserving bindings across directive-type changes.
//!
//! Grounded on `runtime/context.rs`'s `memo_with`'s parked-value reuse and
//! `dyn-cache`'s `Liveness`-gated eviction for the "keep the old thing around
//! keyed by its type" shape; `Memo` generalizes that into a directive-type
//! keyed park table rather than a single slot.
//!
//! This port does not carry the source design's `DirectiveElement`/
//! `Bindable` value wrappers (an object a user value can carry to bypass
//! primitive resolution): `Value` is a closed, dynamically-typed enum rather
//! than an open object system, so there is nothing for such a wrapper to be
//! made of without widening `Value` itself. `resolve_directive` therefore
//! always resolves through the built-in primitive registry; recorded as an
//! open-question resolution in the design ledger.

use crate::backend::Backend;
use crate::binding::Binding;
use crate::error::RuntimeError;
use crate::part::Part;
use crate::primitive::{resolve_primitive, Primitive};
use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

pub fn resolve_directive(value: &Value, part: &Part) -> Rc<dyn Primitive> {
    resolve_primitive(value, part)
}

/// Parks bindings by the name of the directive that produced them, so that
/// toggling between directive kinds at the same part (e.g. conditionally
/// rendering an `<input>` vs. plain text) doesn't tear down and recreate
/// state that directive kind had accumulated.
#[derive(Default)]
pub struct Memo {
    parked: HashMap<&'static str, Box<dyn Binding>>,
}

impl Memo {
    pub fn new() -> Self {
        Memo { parked: HashMap::new() }
    }

    /// Resolve a binding for `directive_name`, reusing a parked one if this
    /// memo has seen that directive before, otherwise constructing fresh via
    /// `make`.
    pub fn resolve(
        &mut self,
        directive: &Rc<dyn Primitive>,
        value: Value,
        part: Part,
        backend: &dyn Backend,
    ) -> Result<Box<dyn Binding>, RuntimeError> {
        if let Some(mut parked) = self.parked.remove(directive.name()) {
            parked.rebind(value);
            Ok(parked)
        } else {
            directive.resolve_binding(value, part, backend)
        }
    }

    pub fn park(&mut self, binding: Box<dyn Binding>) {
        self.parked.insert(binding.directive_name(), binding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TestBackend;
    use crate::binding::CommitContext;

    #[test]
    fn memo_reuses_parked_binding_for_same_directive() {
        let be = TestBackend::new();
        let el = be.create_element("input", crate::part::NodeKind::Html);
        let part = Part::Attribute { element: el, name: "value" };
        let directive = resolve_directive(&Value::str("a"), &part);
        let mut memo = Memo::new();
        let mut first = memo.resolve(&directive, Value::str("a"), part.clone(), be.as_ref()).unwrap();
        let ctx = CommitContext { backend: be.as_ref() };
        first.commit(&ctx);
        memo.park(first);

        let second = memo.resolve(&directive, Value::str("a"), part.clone(), be.as_ref()).unwrap();
        assert!(!second.should_bind(&Value::str("a")));
        assert_eq!(be.attribute_of(el, "value"), Some("a".into()));
    }
}
