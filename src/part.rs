//! The tagged union of DOM insertion sites a value can be bound to.
//!
//! Grounded on `dom/augdom/src/lib.rs`'s `Xml`/`Node` split: the concrete DOM
//! is abstracted behind a small enum of node shapes and a trait of mutation
//! operations; `Part` plays the analogous role here, identifying *where* a
//! binding writes rather than *what* the underlying node looks like (the
//! backend owns that).

use std::cell::Cell;
use std::rc::Rc;

/// An opaque handle to a host-owned node. The runtime never inspects this;
/// it is threaded through to `Backend` calls, which are free to interpret it
/// (index into a vector, a `web_sys::Node`, whatever).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct NodeId(pub u64);

/// Which kind of document tree a template was parsed for, needed because
/// `<svg>`/`<math>` children require namespace-aware element creation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeKind {
    Html,
    Svg,
    MathMl,
}

/// The discriminant of a [`Part`], used for error messages and primitive
/// resolution without needing to match the full enum (and without cloning
/// the part's payload).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PartKind {
    Attribute,
    ChildNode,
    Element,
    Event,
    Live,
    Property,
    Text,
}

/// Where a value is bound in the host tree.
#[derive(Clone, Debug)]
pub enum Part {
    Attribute {
        element: NodeId,
        name: &'static str,
    },
    /// `anchor` is an inert marker (a comment node in a real DOM) that never
    /// moves; `anchor_node` is the mutable cell tracking the *first*
    /// currently-rendered child, satisfying the anchor invariant that it
    /// always points at the first rendered child or equals `anchor` when
    /// empty.
    ChildNode {
        anchor: NodeId,
        anchor_node: Rc<Cell<NodeId>>,
        namespace: NodeKind,
    },
    Element {
        element: NodeId,
    },
    Event {
        element: NodeId,
        name: &'static str,
    },
    /// `baseline` is populated by reading the live property off the host
    /// node before the first write, so a later `rollback` can restore it.
    Live {
        element: NodeId,
        property: &'static str,
        baseline: Rc<Cell<Option<crate::value::Value>>>,
    },
    Property {
        element: NodeId,
        property: &'static str,
        default: crate::value::Value,
    },
    Text {
        node: NodeId,
        preceding: &'static str,
        following: &'static str,
    },
}

impl Part {
    pub fn kind(&self) -> PartKind {
        match self {
            Part::Attribute { .. } => PartKind::Attribute,
            Part::ChildNode { .. } => PartKind::ChildNode,
            Part::Element { .. } => PartKind::Element,
            Part::Event { .. } => PartKind::Event,
            Part::Live { .. } => PartKind::Live,
            Part::Property { .. } => PartKind::Property,
            Part::Text { .. } => PartKind::Text,
        }
    }

    /// The node a directive should mutate: the element for
    /// attribute/element/event/live/property parts, the anchor's current
    /// first child for a child-node part, or the text node itself.
    pub fn target_node(&self) -> NodeId {
        match self {
            Part::Attribute { element, .. }
            | Part::Element { element }
            | Part::Event { element, .. }
            | Part::Live { element, .. }
            | Part::Property { element, .. } => *element,
            Part::ChildNode { anchor_node, .. } => anchor_node.get(),
            Part::Text { node, .. } => *node,
        }
    }

    /// `ChildNode` parts expose their mutable anchor cell so `Slot`/`Repeat`
    /// can maintain the "first rendered child" invariant in §4.7.
    pub fn anchor_node_cell(&self) -> Option<&Rc<Cell<NodeId>>> {
        match self {
            Part::ChildNode { anchor_node, .. } => Some(anchor_node),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_node_anchor_defaults_to_anchor_itself() {
        let anchor = NodeId(1);
        let part = Part::ChildNode {
            anchor,
            anchor_node: Rc::new(Cell::new(anchor)),
            namespace: NodeKind::Html,
        };
        assert_eq!(part.target_node(), anchor);
    }
}
