//! The render session (§4.5): the API surface a component body sees while
//! its coroutine is being resumed.
//!
//! Grounded on `runtime/context.rs`'s `Context`, the object threaded into a
//! component closure that exposes the revision-scoped cache and the
//! surrounding `illicit` environment; `Session` generalizes that into the
//! explicit `forceUpdate`/`getSharedContext`/`catchError` surface §4.5 lists,
//! backed by this crate's own `Scope` chain instead of a thread-local one.

use crate::coroutine::CoroutineHandle;
use crate::frame::RenderFrame;
use crate::hook::HookList;
use crate::lane::{Lanes, UpdateOptions};
use crate::scheduler::Scheduling;
use crate::scope::Scope;
use std::any::Any;
use std::rc::Rc;

pub struct Session<'a> {
    coroutine: CoroutineHandle,
    frame: &'a mut RenderFrame,
    scope: Scope,
    cursor: usize,
    runtime: Rc<dyn Scheduling>,
}

impl<'a> Session<'a> {
    pub fn new(coroutine: CoroutineHandle, frame: &'a mut RenderFrame, scope: Scope, runtime: Rc<dyn Scheduling>) -> Self {
        Session { coroutine, frame, scope, cursor: 0, runtime }
    }

    pub fn next_hook_index(&mut self) -> usize {
        let index = self.cursor;
        self.cursor += 1;
        index
    }

    pub fn hooks(&self) -> &mut HookList {
        // SAFETY: `hooks` is a `RefCell` owned by the coroutine this session
        // resumes; nothing else touches it while the session is alive, and a
        // plain `borrow_mut()` would tie the returned reference's lifetime to
        // a temporary `RefMut` rather than `self`. Hook accessor functions in
        // `hook.rs` only ever hold the reference for the duration of one call.
        unsafe { &mut *self.coroutine.hooks.as_ptr() }
    }

    pub fn frame_lanes(&self) -> Lanes {
        self.frame.lanes
    }

    pub fn frame_mut(&mut self) -> &mut RenderFrame {
        self.frame
    }

    pub fn coroutine_handle(&self) -> CoroutineHandle {
        self.coroutine.clone()
    }

    pub fn scheduling_handle(&self) -> Rc<dyn Scheduling> {
        self.runtime.clone()
    }

    pub fn allocate_id(&self) -> Rc<str> {
        self.runtime.allocate_id()
    }

    /// The spawner a `use_effect` callback should clone onto for ordinary
    /// futures (§5a) rather than blocking the render pass on them.
    pub fn task_spawner(&self) -> crate::executor::TaskSpawner {
        self.runtime.task_spawner()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// `forceUpdate`: schedule this coroutine's own re-render at the given
    /// options (or the runtime's default priority if `None`), regardless of
    /// any reducer hook's pending state. A detached coroutine no-ops; a
    /// request already covered by the frame currently rendering folds into
    /// that frame instead of scheduling a fresh one.
    pub fn force_update(&mut self, options: Option<UpdateOptions>) {
        if self.scope.is_detached() {
            return;
        }
        let options = options.unwrap_or_else(|| UpdateOptions::new(self.runtime.default_priority()));
        if self.frame.lanes.contains(options.lanes()) {
            let handle = self.coroutine.clone();
            self.frame.enqueue_coroutine(handle);
            return;
        }
        self.coroutine.schedule(options.lanes());
        self.runtime.schedule_update(self.coroutine.clone(), options);
    }

    pub fn is_update_pending(&self) -> bool {
        !self.coroutine.pending_lanes.get().is_empty()
    }

    /// `waitForUpdate`: a future resolving once this coroutine's pending
    /// lanes have been resumed and cleared.
    pub fn wait_for_update(&self) -> crate::coroutine::UpdateHandle {
        self.coroutine.wait_for_update()
    }

    pub fn get_shared_context(&self, key: &'static str) -> Option<Rc<dyn Any>> {
        self.scope.get_shared_context(key)
    }

    /// `setSharedContext`: values are installed on a *child* scope so
    /// siblings sharing the parent don't observe this component's writes,
    /// matching §4.5's "establishes or updates a value visible to
    /// descendants of the current render point".
    pub fn set_shared_context(&mut self, key: &'static str, value: Rc<dyn Any>) {
        let child = self.scope.child();
        child.set_shared_context(key, value);
        self.scope = child;
        *self.coroutine.scope.borrow_mut() = self.scope.clone();
    }

    pub fn catch_error(&self, thrown: crate::error::Thrown) -> Result<(), crate::error::Thrown> {
        self.scope.catch_error(thrown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TestBackend;
    use crate::config::RuntimeConfig;
    use crate::coroutine::{Coroutine, CoroutineId};
    use crate::frame::FrameId;
    use crate::lane::Priority;
    use crate::scheduler::Runtime;
    use crate::value::Value;

    fn coroutine(scope: Scope) -> CoroutineHandle {
        Coroutine::new(CoroutineId(0), scope, Box::new(|_session| Value::Null))
    }

    fn runtime() -> Rc<Runtime> {
        Runtime::new(TestBackend::new(), RuntimeConfig::default(), "t")
    }

    #[test]
    fn force_update_on_a_detached_coroutine_is_a_no_op() {
        let rt = runtime();
        let handle = coroutine(Scope::detached_sentinel());
        let mut frame = RenderFrame::new(FrameId(0), Lanes::NONE);
        let mut session = Session::new(handle.clone(), &mut frame, Scope::detached_sentinel(), rt as Rc<dyn Scheduling>);
        session.force_update(Some(UpdateOptions::new(Priority::UserBlocking)));
        assert!(frame.pending_coroutines.is_empty());
        assert!(handle.pending_lanes.get().is_empty());
    }

    #[test]
    fn force_update_folds_into_a_frame_that_already_covers_the_request() {
        let rt = runtime();
        let handle = coroutine(Scope::root());
        let mut frame = RenderFrame::new(FrameId(0), Lanes::USER_BLOCKING);
        let mut session = Session::new(handle.clone(), &mut frame, Scope::root(), rt as Rc<dyn Scheduling>);
        session.force_update(Some(UpdateOptions::new(Priority::UserBlocking)));
        assert_eq!(frame.pending_coroutines.len(), 1);
    }

    #[test]
    fn force_update_schedules_a_fresh_update_outside_the_covering_frame() {
        let rt = runtime();
        let handle = coroutine(Scope::root());
        let mut frame = RenderFrame::new(FrameId(0), Lanes::NONE);
        let mut session = Session::new(handle.clone(), &mut frame, Scope::root(), rt as Rc<dyn Scheduling>);
        session.force_update(Some(UpdateOptions::new(Priority::UserBlocking)));
        assert!(frame.pending_coroutines.is_empty());
        assert!(handle.pending_lanes.get().contains(Lanes::USER_BLOCKING));
    }
}
