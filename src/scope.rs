//! The scope/boundary chain (§3, §4.5): a linked frame inherited by child
//! components unless a new one is pushed, carrying error handlers,
//! hydration walkers, and shared-context entries.
//!
//! Grounded on `illicit/src/lib.rs`'s `Layer` (an `Rc`-linked stack frame
//! with a parent back-pointer, entered via `Layer::new().offer(val).enter`)
//! -- but made an explicit, addressable value rather than a thread-local
//! stack, since §4.5 requires a scope to be threaded through a render
//! session as ordinary data ("a scope inherited from the parent"), not
//! pushed/popped around a closure the way `illicit`'s contexts are.

use crate::error::Thrown;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

/// One entry in a scope's boundary list.
pub enum Boundary {
    Error(Box<dyn Fn(&Thrown) -> Result<(), Thrown>>),
    Hydration(Rc<RefCell<dyn HydrationWalker>>),
    SharedContext { key: &'static str, value: Rc<dyn Any> },
}

/// Consumes the pre-rendered DOM in document order during `Template::hydrate`.
/// A trait so tests can substitute a fake walker without depending on a real
/// tree; `TestBackend`-backed code implements this over the virtual tree.
pub trait HydrationWalker {
    fn expect_node(&mut self) -> Option<crate::part::NodeId>;
}

struct ScopeInner {
    parent: Option<Scope>,
    boundaries: RefCell<Vec<Boundary>>,
    detached: bool,
}

/// A frame in the linked context chain. Cheaply `Clone`-able (an `Rc`
/// handle); child components share their parent's `Scope` unless they push
/// a new boundary, at which point `Scope::child` forks a fresh frame whose
/// parent back-pointer is the original.
#[derive(Clone)]
pub struct Scope(Rc<ScopeInner>);

impl Scope {
    pub fn root() -> Scope {
        Scope(Rc::new(ScopeInner { parent: None, boundaries: RefCell::new(Vec::new()), detached: false }))
    }

    /// The single frozen sentinel marking a torn-down coroutine. Equality is
    /// by `Rc` identity, so every caller must obtain it from
    /// `Scope::detached_sentinel()` rather than constructing their own.
    pub fn detached_sentinel() -> Scope {
        thread_local! {
            static SENTINEL: Scope = Scope(Rc::new(ScopeInner {
                parent: None,
                boundaries: RefCell::new(Vec::new()),
                detached: true,
            }));
        }
        SENTINEL.with(|s| s.clone())
    }

    pub fn is_detached(&self) -> bool {
        self.0.detached
    }

    /// Fork a child scope inheriting this one as parent. Used whenever a
    /// component pushes a boundary (`catchError`, a hydration walker, or a
    /// first `setSharedContext` call) so the push doesn't mutate the parent
    /// scope other components may still be reading.
    pub fn child(&self) -> Scope {
        Scope(Rc::new(ScopeInner { parent: Some(self.clone()), boundaries: RefCell::new(Vec::new()), detached: false }))
    }

    pub fn push_error_boundary(&self, handler: Box<dyn Fn(&Thrown) -> Result<(), Thrown>>) {
        self.0.boundaries.borrow_mut().push(Boundary::Error(handler));
    }

    pub fn push_hydration_walker(&self, walker: Rc<RefCell<dyn HydrationWalker>>) {
        self.0.boundaries.borrow_mut().push(Boundary::Hydration(walker));
    }

    pub fn set_shared_context(&self, key: &'static str, value: Rc<dyn Any>) {
        let mut boundaries = self.0.boundaries.borrow_mut();
        for boundary in boundaries.iter_mut() {
            if let Boundary::SharedContext { key: k, value: v } = boundary {
                if *k == key {
                    *v = value;
                    return;
                }
            }
        }
        boundaries.push(Boundary::SharedContext { key, value });
    }

    /// `getSharedContext`: walk this scope's boundaries, then the parent
    /// chain, until a matching key is found.
    pub fn get_shared_context(&self, key: &'static str) -> Option<Rc<dyn Any>> {
        for boundary in self.0.boundaries.borrow().iter() {
            if let Boundary::SharedContext { key: k, value } = boundary {
                if *k == key {
                    return Some(value.clone());
                }
            }
        }
        self.0.parent.as_ref().and_then(|p| p.get_shared_context(key))
    }

    /// Walk boundaries upward looking for an `Error` handler willing to
    /// recover `thrown`. Returns `Err` again if no boundary recovers it,
    /// matching §7's "unhandled errors propagate to the runtime root".
    pub fn catch_error(&self, thrown: Thrown) -> Result<(), Thrown> {
        let boundaries = self.0.boundaries.borrow();
        for boundary in boundaries.iter().rev() {
            if let Boundary::Error(handler) = boundary {
                match handler(&thrown) {
                    Ok(()) => return Ok(()),
                    Err(_) => continue,
                }
            }
        }
        drop(boundaries);
        match &self.0.parent {
            Some(parent) => parent.catch_error(thrown),
            None => Err(thrown),
        }
    }

    pub fn hydration_walker(&self) -> Option<Rc<RefCell<dyn HydrationWalker>>> {
        for boundary in self.0.boundaries.borrow().iter().rev() {
            if let Boundary::Hydration(w) = boundary {
                return Some(w.clone());
            }
        }
        self.0.parent.as_ref().and_then(|p| p.hydration_walker())
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_sentinel_is_stable_by_identity() {
        assert_eq!(Scope::detached_sentinel(), Scope::detached_sentinel());
        assert!(Scope::detached_sentinel().is_detached());
        assert_ne!(Scope::root(), Scope::detached_sentinel());
    }

    #[test]
    fn shared_context_walks_to_parent() {
        let root = Scope::root();
        root.set_shared_context("theme", Rc::new("dark"));
        let child = root.child();
        let got = child.get_shared_context("theme").unwrap();
        assert_eq!(*got.downcast_ref::<&str>().unwrap(), "dark");
    }

    #[test]
    fn error_boundary_recovers_and_stops_propagation() {
        let root = Scope::root();
        root.push_error_boundary(Box::new(|_t| Ok(())));
        let child = root.child();
        assert!(child.catch_error(Thrown::new(42)).is_ok());
    }
}
