//! The coroutine (§3, §4.4): one resumable component instance, pairing an
//! ordered hook list with the closure that renders it.
//!
//! Grounded on `runtime/context.rs`'s per-callsite `Context`, which bundles a
//! `dyn_cache::Cache` with a revision counter and is handed to the component
//! closure on each re-run; `Coroutine::resume` generalizes that single-cache
//! bundle into the hook list plus pending-lanes bookkeeping a laned
//! scheduler requires (a single global revision counter becomes a
//! per-coroutine lane set here).

use crate::frame::RenderFrame;
use crate::hook::HookList;
use crate::lane::Lanes;
use crate::scheduler::Scheduling;
use crate::scope::Scope;
use crate::session::Session;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct CoroutineId(pub u64);

pub type RenderFn = dyn FnMut(&mut Session) -> Value;

/// A component instance: its identity, inherited scope, hook slots, and the
/// closure that produces its next output when resumed.
pub struct Coroutine {
    pub id: CoroutineId,
    pub scope: RefCell<Scope>,
    /// The union of lanes some update has scheduled against this coroutine.
    /// Cleared at the *start* of `resume`, before the render closure runs,
    /// per the resolved open question in §9: a `scheduleUpdate` that fires
    /// from inside the render closure itself schedules a genuine follow-up
    /// rather than being silently absorbed by the in-flight resume.
    pub pending_lanes: Cell<Lanes>,
    pub hooks: RefCell<HookList>,
    render: RefCell<Box<RenderFn>>,
    /// Wakers registered by `waitForUpdate` (§4.5), woken once a `resume`
    /// finishes and this coroutine has no outstanding pending lanes left.
    update_waiters: RefCell<Vec<Waker>>,
}

pub type CoroutineHandle = Rc<Coroutine>;

impl Coroutine {
    pub fn new(id: CoroutineId, scope: Scope, render: Box<RenderFn>) -> CoroutineHandle {
        Rc::new(Coroutine {
            id,
            scope: RefCell::new(scope),
            pending_lanes: Cell::new(Lanes::NONE),
            hooks: RefCell::new(HookList::default()),
            render: RefCell::new(render),
            update_waiters: RefCell::new(Vec::new()),
        })
    }

    pub fn schedule(&self, lanes: Lanes) {
        let mut merged = self.pending_lanes.get();
        merged.merge(lanes);
        self.pending_lanes.set(merged);
    }

    /// A future resolving once this coroutine has resumed with no pending
    /// lanes left outstanding (§4.5's `waitForUpdate`).
    pub fn wait_for_update(self: &CoroutineHandle) -> UpdateHandle {
        UpdateHandle { coroutine: self.clone() }
    }

    /// Re-run the component for the given frame, returning its output value
    /// and depositing any newly-eligible effects into the frame's queues.
    pub fn resume(self: &CoroutineHandle, frame: &mut RenderFrame, runtime: Rc<dyn Scheduling>) -> Value {
        self.pending_lanes.set(Lanes::NONE);
        let scope = self.scope.borrow().clone();
        let mut session = Session::new(self.clone(), frame, scope, runtime);
        let output = (self.render.borrow_mut())(&mut session);
        let deposits = self.hooks.borrow_mut().finalize();
        for (phase, run) in deposits {
            session.frame_mut().deposit_effect(phase, run);
        }
        if self.pending_lanes.get().is_empty() {
            for waiter in self.update_waiters.borrow_mut().drain(..) {
                waiter.wake();
            }
        }
        output
    }
}

/// The handle `Session::wait_for_update` hands back: pending while its
/// coroutine still has lanes scheduled against it, ready once a `resume`
/// clears them.
pub struct UpdateHandle {
    coroutine: CoroutineHandle,
}

impl Future for UpdateHandle {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.coroutine.pending_lanes.get().is_empty() {
            Poll::Ready(())
        } else {
            self.coroutine.update_waiters.borrow_mut().push(cx.waker().clone());
            Poll::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{Runtime, Scheduling};
    use crate::{
        backend::TestBackend,
        config::RuntimeConfig,
        lane::{Priority, UpdateOptions},
    };

    #[test]
    fn wait_for_update_resolves_once_pending_lanes_clear() {
        let backend = TestBackend::new();
        let rt = Runtime::new(backend, RuntimeConfig::default(), "t");
        let (coroutine, _) = rt.mount(Box::new(|_session| Value::Null));

        let waker = futures::task::waker(crate::testing::BoolWaker::new());
        let mut cx = Context::from_waker(&waker);
        let mut handle = coroutine.wait_for_update();
        assert_eq!(Pin::new(&mut handle).poll(&mut cx), Poll::Ready(()));

        rt.schedule_update(coroutine.clone(), UpdateOptions::new(Priority::UserBlocking));
        let mut handle = coroutine.wait_for_update();
        assert_eq!(Pin::new(&mut handle).poll(&mut cx), Poll::Pending);

        rt.flush_sync();
        assert_eq!(Pin::new(&mut handle).poll(&mut cx), Poll::Ready(()));
    }
}
