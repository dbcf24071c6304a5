//! The `Backend` contract: the sole abstraction over the DOM/environment
//! (§6). Grounded directly on `dom/augdom/src/lib.rs`'s `Xml` trait
//! (`write_xml`, `set_attribute`, `remove_attribute`, `append_child`,
//! `remove_child`, `replace_child`, `next_sibling`, `create_text_node`,
//! `create_element`) for the DOM-shaped half, and on `src/embed.rs`'s
//! `Runtime`/`InBandExecutor` split for the scheduling half
//! (`request_callback`/`yield_to_main`/`should_yield_to_main` stand in for
//! a `requestAnimationFrame`-driven host loop).
//!
//! A real browser backend is explicitly out of scope (§1: "the concrete DOM
//! primitives ... only their contract surface is specified"); this module
//! therefore ships exactly one implementation, [`TestBackend`], a
//! deterministic virtual tree in the spirit of a hand-rolled `VirtNode` tree.

use crate::lane::Priority;
use crate::part::NodeId;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TemplateMode {
    Html,
    Svg,
    MathMl,
    Textarea,
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// The host/environment contract. All DOM/scheduling side effects in the
/// runtime go through this trait; nothing else is permitted to touch the
/// outside world, which is what lets `TestBackend` make the scheduler and
/// reconciler fully deterministic under test.
pub trait Backend {
    // -- node construction & mutation, grounded on augdom::Xml --
    fn create_element(&self, tag: &str, namespace: crate::part::NodeKind) -> NodeId;
    fn create_text_node(&self, data: &str) -> NodeId;
    fn create_comment(&self, data: &str) -> NodeId;
    fn set_text(&self, node: NodeId, data: &str);
    fn set_attribute(&self, element: NodeId, name: &str, value: &str);
    fn remove_attribute(&self, element: NodeId, name: &str);
    fn read_property(&self, element: NodeId, name: &str) -> Option<Value>;
    fn write_property(&self, element: NodeId, name: &str, value: Value);
    fn append_child(&self, parent: NodeId, child: NodeId);
    fn insert_before(&self, parent: NodeId, child: NodeId, before: NodeId);
    fn remove_child(&self, parent: NodeId, child: NodeId);
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;
    fn parent_of(&self, node: NodeId) -> Option<NodeId>;

    // -- scheduling, grounded on src/embed.rs's Runtime/InBandExecutor --
    fn request_callback(&self, priority: Priority, callback: Box<dyn FnOnce()>);
    fn yield_to_main(&self, priority: Priority) -> BoxFuture<'_, ()>;
    fn should_yield_to_main(&self, elapsed_ms: f64) -> bool;
    fn start_view_transition(&self, callback: Box<dyn FnOnce()>) -> BoxFuture<'_, ()>;
    fn get_current_priority(&self) -> Priority;
}

/// A single node in [`TestBackend`]'s virtual tree, grounded on
/// `dom/src/node.rs`'s `VirtData::{Elem, Text}` split.
struct VNode {
    data: VData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

enum VData {
    Element { tag: String, attrs: HashMap<String, String>, props: HashMap<String, Value> },
    Text(String),
    Comment(String),
}

/// A deterministic, allocation-cheap stand-in for a real DOM, used by every
/// test in this crate. `request_callback`/`yield_to_main` run their
/// callbacks (or resolve their futures) immediately rather than actually
/// yielding, since there is no real main thread to cooperate with in tests.
pub struct TestBackend {
    nodes: RefCell<HashMap<NodeId, VNode>>,
    next_id: RefCell<u64>,
    pub pending_callbacks: RefCell<Vec<(Priority, Box<dyn FnOnce()>)>>,
    pub view_transition_calls: Cell<u32>,
}

impl Default for TestBackend {
    fn default() -> Self {
        TestBackend {
            nodes: RefCell::new(HashMap::new()),
            next_id: RefCell::new(1),
            pending_callbacks: RefCell::new(Vec::new()),
            view_transition_calls: Cell::new(0),
        }
    }
}

impl TestBackend {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    fn alloc(&self, data: VData) -> NodeId {
        let mut next = self.next_id.borrow_mut();
        let id = NodeId(*next);
        *next += 1;
        self.nodes.borrow_mut().insert(id, VNode { data, parent: None, children: Vec::new() });
        id
    }

    /// Render the subtree rooted at `node` as a small debug-friendly XML
    /// string, mirroring `augdom::Xml::inner_html` closely enough for
    /// hydration/reconciliation tests to assert against.
    pub fn to_xml(&self, node: NodeId) -> String {
        let nodes = self.nodes.borrow();
        fn go(nodes: &HashMap<NodeId, VNode>, id: NodeId, out: &mut String) {
            let n = &nodes[&id];
            match &n.data {
                VData::Text(t) => out.push_str(t),
                VData::Comment(_) => out.push_str("<!---->"),
                VData::Element { tag, attrs, .. } => {
                    out.push('<');
                    out.push_str(tag);
                    for (k, v) in attrs {
                        out.push_str(&format!(" {k}=\"{v}\""));
                    }
                    out.push('>');
                    for child in &n.children {
                        go(nodes, *child, out);
                    }
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
            }
        }
        let mut out = String::new();
        go(&nodes, node, &mut out);
        out
    }

    pub fn text_of(&self, node: NodeId) -> String {
        match &self.nodes.borrow()[&node].data {
            VData::Text(t) => t.clone(),
            _ => String::new(),
        }
    }

    pub fn attribute_of(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.nodes.borrow()[&node].data {
            VData::Element { attrs, .. } => attrs.get(name).cloned(),
            _ => None,
        }
    }

    pub fn children_of(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes.borrow()[&node].children.clone()
    }

    /// Drain and run every callback queued via `request_callback`, in FIFO
    /// order, regardless of priority -- tests that care about priority
    /// ordering inspect `pending_callbacks` directly before draining.
    pub fn run_pending(&self) {
        let callbacks = self.pending_callbacks.borrow_mut().drain(..).collect::<Vec<_>>();
        for (_, cb) in callbacks {
            cb();
        }
    }
}

impl Backend for TestBackend {
    fn create_element(&self, tag: &str, _namespace: crate::part::NodeKind) -> NodeId {
        self.alloc(VData::Element {
            tag: tag.to_string(),
            attrs: HashMap::new(),
            props: HashMap::new(),
        })
    }

    fn create_text_node(&self, data: &str) -> NodeId {
        self.alloc(VData::Text(data.to_string()))
    }

    fn create_comment(&self, data: &str) -> NodeId {
        self.alloc(VData::Comment(data.to_string()))
    }

    fn set_text(&self, node: NodeId, data: &str) {
        if let VData::Text(t) = &mut self.nodes.borrow_mut().get_mut(&node).unwrap().data {
            *t = data.to_string();
        }
    }

    fn set_attribute(&self, element: NodeId, name: &str, value: &str) {
        if let VData::Element { attrs, .. } = &mut self.nodes.borrow_mut().get_mut(&element).unwrap().data {
            attrs.insert(name.to_string(), value.to_string());
        }
    }

    fn remove_attribute(&self, element: NodeId, name: &str) {
        if let VData::Element { attrs, .. } = &mut self.nodes.borrow_mut().get_mut(&element).unwrap().data {
            attrs.remove(name);
        }
    }

    fn read_property(&self, element: NodeId, name: &str) -> Option<Value> {
        match &self.nodes.borrow()[&element].data {
            VData::Element { props, .. } => props.get(name).cloned(),
            _ => None,
        }
    }

    fn write_property(&self, element: NodeId, name: &str, value: Value) {
        if let VData::Element { props, .. } = &mut self.nodes.borrow_mut().get_mut(&element).unwrap().data {
            props.insert(name.to_string(), value);
        }
    }

    fn append_child(&self, parent: NodeId, child: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(old_parent) = nodes[&child].parent {
            nodes.get_mut(&old_parent).unwrap().children.retain(|c| *c != child);
        }
        nodes.get_mut(&parent).unwrap().children.push(child);
        nodes.get_mut(&child).unwrap().parent = Some(parent);
    }

    fn insert_before(&self, parent: NodeId, child: NodeId, before: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(old_parent) = nodes[&child].parent {
            nodes.get_mut(&old_parent).unwrap().children.retain(|c| *c != child);
        }
        let siblings = &mut nodes.get_mut(&parent).unwrap().children;
        let idx = siblings.iter().position(|c| *c == before).unwrap_or(siblings.len());
        siblings.insert(idx, child);
        nodes.get_mut(&child).unwrap().parent = Some(parent);
    }

    fn remove_child(&self, parent: NodeId, child: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        nodes.get_mut(&parent).unwrap().children.retain(|c| *c != child);
        nodes.get_mut(&child).unwrap().parent = None;
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let nodes = self.nodes.borrow();
        let parent = nodes[&node].parent?;
        let siblings = &nodes[&parent].children;
        let idx = siblings.iter().position(|c| *c == node)?;
        siblings.get(idx + 1).copied()
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.borrow()[&node].parent
    }

    fn request_callback(&self, priority: Priority, callback: Box<dyn FnOnce()>) {
        self.pending_callbacks.borrow_mut().push((priority, callback));
    }

    fn yield_to_main(&self, _priority: Priority) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }

    fn should_yield_to_main(&self, elapsed_ms: f64) -> bool {
        elapsed_ms >= 5.0
    }

    fn start_view_transition(&self, callback: Box<dyn FnOnce()>) -> BoxFuture<'_, ()> {
        self.view_transition_calls.set(self.view_transition_calls.get() + 1);
        callback();
        Box::pin(async {})
    }

    fn get_current_priority(&self) -> Priority {
        Priority::UserBlocking
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_small_tree() {
        let be = TestBackend::new();
        let div = be.create_element("div", crate::part::NodeKind::Html);
        let text = be.create_text_node("hi");
        be.append_child(div, text);
        assert_eq!(be.to_xml(div), "<div>hi</div>");
    }

    #[test]
    fn insert_before_orders_children() {
        let be = TestBackend::new();
        let div = be.create_element("div", crate::part::NodeKind::Html);
        let a = be.create_text_node("a");
        let b = be.create_text_node("b");
        be.append_child(div, a);
        be.insert_before(div, b, a);
        assert_eq!(be.children_of(div), vec![b, a]);
    }
}
