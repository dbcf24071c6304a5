//! Templates (§4.2): a compiled skeleton producing child nodes and a slot
//! list, either by building fresh DOM or by hydrating markup a server
//! already produced.
//!
//! Grounded on `dom/src/memo_node.rs`'s child-walking helpers for "visit the
//! expected node sequence and fail loudly on divergence", and on
//! `dyn-cache::Cache`'s identity-keyed storage for the template cache below.
//!
//! This port has no tagged-template-literal compiler (§4.8 is explicitly out
//! of deep scope), so a `Template` is constructed from two author-supplied
//! recipes rather than derived from template-literal strings at macro time:
//! one that builds a fresh fragment against a `Backend`, and one that walks
//! a `HydrationWalker` over existing markup, raising `RuntimeError::
//! HydrationMismatch` the moment the visited sequence diverges from what
//! `render` would have produced.

use crate::backend::Backend;
use crate::error::RuntimeError;
use crate::part::{NodeId, Part, PartKind};
use crate::scope::HydrationWalker;
use crate::slot::{Slot, SlotKind};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// The fragment a template recipe produces: its top-level child nodes (in
/// document order) and the ordered part descriptors for each hole.
pub struct TemplateSkeleton {
    pub child_nodes: Vec<NodeId>,
    pub holes: Vec<Part>,
}

type RenderBuild = dyn Fn(&dyn Backend) -> TemplateSkeleton;
type HydrateBuild = dyn Fn(&mut dyn HydrationWalker, &dyn Backend) -> Result<TemplateSkeleton, RuntimeError>;

pub struct Template {
    render_build: Box<RenderBuild>,
    hydrate_build: Box<HydrateBuild>,
}

impl Template {
    pub fn new(render_build: Box<RenderBuild>, hydrate_build: Box<HydrateBuild>) -> Rc<Template> {
        Rc::new(Template { render_build, hydrate_build })
    }

    fn slot_kind_for(part: &Part) -> SlotKind {
        match part.kind() {
            PartKind::ChildNode => SlotKind::Loose,
            _ => SlotKind::Strict,
        }
    }

    fn zip_into_slots(
        skeleton: TemplateSkeleton,
        binds: Vec<Value>,
        backend: &dyn Backend,
    ) -> Result<(Vec<NodeId>, Vec<Slot>), RuntimeError> {
        if binds.len() != skeleton.holes.len() {
            return Err(RuntimeError::Unhandled(format!(
                "template expected {} binds, got {}",
                skeleton.holes.len(),
                binds.len()
            )));
        }
        let mut slots = Vec::with_capacity(skeleton.holes.len());
        for (part, value) in skeleton.holes.into_iter().zip(binds.into_iter()) {
            let kind = Self::slot_kind_for(&part);
            slots.push(Slot::new(kind, value, part, backend)?);
        }
        Ok((skeleton.child_nodes, slots))
    }

    /// `render(binds, part, runtime) → {childNodes, slots}`. `part` is
    /// unused here (it identifies where the caller will graft the result,
    /// not anything the template itself needs) but kept in the signature to
    /// mirror the documented contract.
    pub fn render(&self, binds: Vec<Value>, _part: &Part, backend: &dyn Backend) -> Result<(Vec<NodeId>, Vec<Slot>), RuntimeError> {
        let skeleton = (self.render_build)(backend);
        Self::zip_into_slots(skeleton, binds, backend)
    }

    /// `hydrate(binds, part, walker, runtime) → {childNodes, slots}`.
    /// Successfully hydrated slots are marked connected-but-uncommitted so a
    /// subsequent `commit` with an unchanged value is a no-op.
    pub fn hydrate(
        &self,
        binds: Vec<Value>,
        _part: &Part,
        walker: &mut dyn HydrationWalker,
        backend: &dyn Backend,
    ) -> Result<(Vec<NodeId>, Vec<Slot>), RuntimeError> {
        let skeleton = (self.hydrate_build)(walker, backend)?;
        let (nodes, mut slots) = Self::zip_into_slots(skeleton, binds, backend)?;
        for slot in &mut slots {
            slot.mark_hydrated();
        }
        Ok((nodes, slots))
    }
}

/// Cache key: the pointer identity of a tagged template literal's strings
/// array, per §4.2 ("keyed by identity ... not by contents -- the compiler
/// guarantees identity stability across invocations at the same source
/// site"). Callers without a compiler-stable strings array can key by any
/// other stable pointer (e.g. a `'static` ID baked into a `const`).
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct TemplateKey(usize);

impl TemplateKey {
    pub fn of(strings: &'static [&'static str]) -> TemplateKey {
        TemplateKey(strings.as_ptr() as usize)
    }
}

/// Process-wide (per-runtime) cache of compiled templates. Read-heavy;
/// writes only happen the first time a given call site is reached.
#[derive(Default)]
pub struct TemplateCache {
    entries: RefCell<HashMap<TemplateKey, Rc<Template>>>,
}

impl TemplateCache {
    pub fn new() -> Self {
        TemplateCache { entries: RefCell::new(HashMap::new()) }
    }

    pub fn get_or_insert(&self, key: TemplateKey, make: impl FnOnce() -> Rc<Template>) -> Rc<Template> {
        if let Some(existing) = self.entries.borrow().get(&key) {
            return existing.clone();
        }
        let template = make();
        self.entries.borrow_mut().insert(key, template.clone());
        template
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TestBackend;
    use crate::part::NodeKind;

    fn greeting_template() -> Rc<Template> {
        Template::new(
            Box::new(|backend: &dyn Backend| {
                let div = backend.create_element("div", NodeKind::Html);
                let text = backend.create_text_node("");
                backend.append_child(div, text);
                TemplateSkeleton {
                    child_nodes: vec![div],
                    holes: vec![Part::Text { node: text, preceding: "".into(), following: "".into() }],
                }
            }),
            Box::new(|walker: &mut dyn HydrationWalker, _backend: &dyn Backend| {
                let div = walker.expect_node().ok_or(RuntimeError::HydrationMismatch {
                    hole_index: 0,
                    expected: "div".into(),
                    found: "<missing>".into(),
                })?;
                let text = walker.expect_node().ok_or(RuntimeError::HydrationMismatch {
                    hole_index: 0,
                    expected: "text".into(),
                    found: "<missing>".into(),
                })?;
                Ok(TemplateSkeleton {
                    child_nodes: vec![div],
                    holes: vec![Part::Text { node: text, preceding: "".into(), following: "".into() }],
                })
            }),
        )
    }

    #[test]
    fn render_produces_one_slot_per_hole() {
        let be = TestBackend::new();
        let el = be.create_element("section", NodeKind::Html);
        let part = Part::ChildNode { anchor: el, anchor_node: Rc::new(std::cell::Cell::new(el)), namespace: NodeKind::Html };
        let template = greeting_template();
        let (nodes, slots) = template.render(vec![Value::str("hi")], &part, be.as_ref()).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn template_cache_returns_same_instance_for_same_key() {
        static STRINGS: &[&str] = &["<div>", "</div>"];
        let cache = TemplateCache::new();
        let key = TemplateKey::of(STRINGS);
        let a = cache.get_or_insert(key, greeting_template);
        let b = cache.get_or_insert(key, greeting_template);
        assert!(Rc::ptr_eq(&a, &b));
    }

    /// Feeds a fixed sequence of nodes to `expect_node`, standing in for a
    /// walker over markup a server already produced.
    struct VecWalker(std::collections::VecDeque<NodeId>);

    impl HydrationWalker for VecWalker {
        fn expect_node(&mut self) -> Option<NodeId> {
            self.0.pop_front()
        }
    }

    #[test]
    fn hydrate_reuses_existing_nodes_when_the_walker_matches() {
        let be = TestBackend::new();
        let div = be.create_element("div", NodeKind::Html);
        let text = be.create_text_node("hi");
        be.append_child(div, text);
        let mut walker = VecWalker(std::collections::VecDeque::from([div, text]));
        let part = Part::ChildNode { anchor: div, anchor_node: Rc::new(std::cell::Cell::new(div)), namespace: NodeKind::Html };
        let (nodes, slots) = greeting_template().hydrate(vec![Value::str("hi")], &part, &mut walker, be.as_ref()).unwrap();
        assert_eq!(nodes, vec![div]);
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn hydrate_reports_a_mismatch_when_the_walker_runs_dry() {
        let be = TestBackend::new();
        let div = be.create_element("div", NodeKind::Html);
        let mut walker = VecWalker(std::collections::VecDeque::from([div]));
        let part = Part::ChildNode { anchor: div, anchor_node: Rc::new(std::cell::Cell::new(div)), namespace: NodeKind::Html };
        let err = greeting_template().hydrate(vec![Value::str("hi")], &part, &mut walker, be.as_ref()).unwrap_err();
        assert!(matches!(err, RuntimeError::HydrationMismatch { .. }));
    }
}
