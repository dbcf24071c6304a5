//! The hook state machine (§4.4): per-component ordered hook slots with
//! type-checked positional reuse.
//!
//! Grounded on `runtime/context.rs`'s `memo_with`/`memo_state` (get-or-init
//! storage keyed by call position) and `runtime/var.rs`'s `Var`/`Commit`
//! double-buffering (`pending` vs `current`, flushed on `root`), generalized
//! from a single implicit per-callsite slot into an explicit,
//! positionally-indexed list as required by §9's design note ("hooks as
//! ordered slot arrays, not dictionaries").

use crate::lane::{Lanes, UpdateOptions};
use crate::session::Session;
use crate::value::Value;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EffectPhase {
    Insertion,
    Layout,
    Passive,
}

type EffectCallback = Box<dyn FnMut() -> Option<Box<dyn FnOnce()>>>;

/// One ordered slot in a component's hook list.
pub enum Hook {
    /// Sentinel appended once a component has fully rendered for the first
    /// time; its presence freezes the list against further growth.
    Finalizer,
    Effect {
        phase: EffectPhase,
        callback: RefCell<EffectCallback>,
        pending_deps: RefCell<Option<Vec<Value>>>,
        memoized_deps: RefCell<Option<Vec<Value>>>,
        cleanup: RefCell<Option<Box<dyn FnOnce()>>>,
    },
    Id(Rc<str>),
    Memo {
        value: RefCell<Rc<dyn Any>>,
        deps: RefCell<Option<Vec<Value>>>,
    },
    Reducer {
        pending_lanes: Cell<Lanes>,
        pending_state: RefCell<Rc<dyn Any>>,
        memoized_state: RefCell<Rc<dyn Any>>,
    },
}

impl Hook {
    fn kind_name(&self) -> &'static str {
        match self {
            Hook::Finalizer => "finalizer",
            Hook::Effect { .. } => "effect",
            Hook::Id(_) => "id",
            Hook::Memo { .. } => "memo",
            Hook::Reducer { .. } => "reducer",
        }
    }
}

/// The ordered, positionally-stable list of hook slots owned by one
/// component instance.
#[derive(Default)]
pub struct HookList {
    slots: Vec<Hook>,
    finalized: bool,
}

impl HookList {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Read-or-insert a slot at `index`. If a slot already exists there,
    /// assert its kind matches `expected_kind`; a mismatch is the fatal
    /// "hook-order violation" from §4.4/§7, reported as a panic because the
    /// design marks it fatal and distinct from the catchable error taxonomy.
    fn slot_at(&mut self, index: usize, expected_kind: &'static str, make: impl FnOnce() -> Hook) -> &Hook {
        if index == self.slots.len() {
            assert!(!self.finalized, "hook list already finalized: cannot add hook #{index}");
            self.slots.push(make());
        }
        let got = &self.slots[index];
        assert_eq!(
            got.kind_name(),
            expected_kind,
            "Unexpected hook type at position {index}: expected {expected_kind}, found {}",
            got.kind_name()
        );
        got
    }

    /// Append a `Finalizer` if absent, then return effects to enqueue in
    /// reverse hook order (tail to head), so that when multiple components'
    /// sessions finalize bottom-up, child-added effects end up appended
    /// before parent-added effects in each phase bucket (§4.4, §9).
    pub fn finalize(&mut self) -> Vec<(EffectPhase, Box<dyn FnOnce()>)> {
        if !self.finalized {
            self.slots.push(Hook::Finalizer);
            self.finalized = true;
        }
        let mut deposits = Vec::new();
        for hook in self.slots.iter().rev() {
            if let Hook::Effect { phase, callback, pending_deps, memoized_deps, cleanup } = hook {
                let pending = pending_deps.borrow_mut().take();
                let changed = match (&pending, &*memoized_deps.borrow()) {
                    (None, _) => true,
                    (_, None) => true,
                    (Some(a), Some(b)) => {
                        a.len() != b.len() || a.iter().zip(b.iter()).any(|(x, y)| !x.is(y))
                    }
                };
                if changed {
                    *memoized_deps.borrow_mut() = pending;
                    let prior_cleanup = cleanup.borrow_mut().take();
                    let invoke: Box<dyn FnOnce()> = {
                        // SAFETY: the hook list outlives the frame that drains these
                        // deposits; these raw pointers point into `self.slots`, which is
                        // not mutated again before the frame commits.
                        let callback = callback as *const RefCell<EffectCallback>;
                        let cleanup = cleanup as *const RefCell<Option<Box<dyn FnOnce()>>>;
                        Box::new(move || {
                            if let Some(c) = prior_cleanup {
                                c();
                            }
                            let callback = unsafe { &*callback };
                            let cleanup = unsafe { &*cleanup };
                            *cleanup.borrow_mut() = callback.borrow_mut()();
                        })
                    };
                    deposits.push((*phase, invoke));
                }
            }
        }
        deposits
    }
}

fn deps_changed(a: &Option<Vec<Value>>, b: &Option<Vec<Value>>) -> bool {
    match (a, b) {
        (None, _) | (_, None) => true,
        (Some(a), Some(b)) => a.len() != b.len() || a.iter().zip(b.iter()).any(|(x, y)| !x.is(y)),
    }
}

/// `useMemo`: re-run `factory` only when `deps` differ from the previous
/// call's deps (sequentially, under `Value::is`); a `None` deps array means
/// "always changed".
pub fn use_memo<T: 'static>(session: &mut Session, deps: Option<Vec<Value>>, factory: impl FnOnce() -> T) -> Rc<T> {
    let index = session.next_hook_index();
    let hooks = session.hooks();
    hooks.slot_at(index, "memo", || Hook::Memo {
        value: RefCell::new(Rc::new(())),
        deps: RefCell::new(None),
    });
    if let Hook::Memo { value, deps: stored_deps } = &hooks.slots[index] {
        if deps_changed(&deps, &stored_deps.borrow()) {
            let fresh: Rc<dyn Any> = Rc::new(factory());
            *value.borrow_mut() = fresh;
            *stored_deps.borrow_mut() = deps;
        }
        value.borrow().clone().downcast::<T>().unwrap_or_else(|_| panic!("Unexpected hook type"))
    } else {
        unreachable!()
    }
}

/// A stable handle for dispatching actions against a `Reducer` hook. Cloning
/// is cheap (an `Rc` to the owning coroutine plus a hook index); unlike a
/// JS closure's referential identity, Rust callers compare `Dispatch` values
/// structurally via `PartialEq` rather than by pointer when that matters.
pub struct Dispatch<S, A> {
    coroutine: crate::coroutine::CoroutineHandle,
    index: usize,
    reducer: Rc<dyn Fn(&S, &A) -> S>,
    comparator: Rc<dyn Fn(&S, &S) -> bool>,
    runtime: Rc<dyn crate::scheduler::Scheduling>,
}

impl<S: 'static, A: 'static> Clone for Dispatch<S, A> {
    fn clone(&self) -> Self {
        Dispatch {
            coroutine: self.coroutine.clone(),
            index: self.index,
            reducer: self.reducer.clone(),
            comparator: self.comparator.clone(),
            runtime: self.runtime.clone(),
        }
    }
}

impl<S: 'static, A: 'static> Dispatch<S, A> {
    /// Dispatch at the runtime's default priority. Equivalent to
    /// `dispatch_with(action, None)`.
    pub fn dispatch(&self, action: A) {
        self.dispatch_with(action, None)
    }

    /// Dispatch with explicit update options (or the runtime's default
    /// priority if `None`), per §4.4: set `pendingLanes` from the options
    /// and schedule the update at the matching priority.
    pub fn dispatch_with(&self, action: A, options: impl Into<Option<UpdateOptions>>) {
        let options = options.into().unwrap_or_else(|| UpdateOptions::new(self.runtime.default_priority()));
        let hooks = self.coroutine.hooks.borrow();
        if let Hook::Reducer { pending_lanes, pending_state, .. } = &hooks.slots[self.index] {
            let current = pending_state.borrow().clone().downcast::<S>().unwrap_or_else(|_| panic!("Unexpected hook type"));
            let next = (self.reducer)(&current, &action);
            if (self.comparator)(&current, &next) {
                return;
            }
            *pending_state.borrow_mut() = Rc::new(next);
            let mut lanes = pending_lanes.get();
            lanes.merge(options.lanes());
            pending_lanes.set(lanes);
            drop(hooks);
            self.runtime.schedule_update(self.coroutine.clone(), options);
        }
    }
}

/// `useReducer`. Returns `(memoizedState, dispatch, has_pending_update)`.
pub fn use_reducer<S: 'static, A: 'static>(
    session: &mut Session,
    reducer: impl Fn(&S, &A) -> S + 'static,
    init: impl FnOnce() -> S,
    comparator: impl Fn(&S, &S) -> bool + 'static,
) -> (Rc<S>, Dispatch<S, A>, bool) {
    let index = session.next_hook_index();
    let hooks = session.hooks();
    hooks.slot_at(index, "reducer", || {
        let initial: Rc<dyn Any> = Rc::new(init());
        Hook::Reducer {
            pending_lanes: Cell::new(Lanes::NONE),
            pending_state: RefCell::new(initial.clone()),
            memoized_state: RefCell::new(initial),
        }
    });
    let frame_lanes = session.frame_lanes();
    if let Hook::Reducer { pending_lanes, pending_state, memoized_state } = &hooks.slots[index] {
        let pending = pending_lanes.get();
        let has_pending = !pending.is_empty();
        if has_pending && frame_lanes.contains(pending) {
            *memoized_state.borrow_mut() = pending_state.borrow().clone();
            pending_lanes.set(Lanes::NONE);
        }
        let value = memoized_state.borrow().clone().downcast::<S>().unwrap_or_else(|_| panic!("Unexpected hook type"));
        let dispatch = Dispatch {
            coroutine: session.coroutine_handle(),
            index,
            reducer: Rc::new(reducer),
            comparator: Rc::new(comparator),
            runtime: session.scheduling_handle(),
        };
        (value, dispatch, !pending_lanes.get().is_empty())
    } else {
        unreachable!()
    }
}

/// An action accepted by the reducer `useState` installs under the hood:
/// either a replacement value or an updater over the prior state.
pub enum StateAction<S> {
    Set(S),
    Update(Box<dyn FnOnce(&S) -> S>),
}

/// `useState`: `useReducer` with a reducer that resolves `StateAction`
/// against the prior state, and `PartialEq` as the default comparator
/// (`Object.is` for structural value types).
pub fn use_state<S: PartialEq + Clone + 'static>(session: &mut Session, init: impl FnOnce() -> S) -> (Rc<S>, Dispatch<S, StateAction<S>>, bool) {
    use_reducer(
        session,
        |state: &S, action: &StateAction<S>| match action {
            StateAction::Set(v) => v.clone(),
            StateAction::Update(_) => state.clone(),
        },
        init,
        |a, b| a == b,
    )
}

impl<S: Clone + 'static> Dispatch<S, StateAction<S>> {
    pub fn set(&self, value: S) {
        self.dispatch(StateAction::Set(value));
    }

    pub fn set_with(&self, value: S, options: impl Into<Option<UpdateOptions>>) {
        self.dispatch_with(StateAction::Set(value), options);
    }
}

/// `useEffect` / `useLayoutEffect` / `useInsertionEffect`: record a pending
/// callback and dependency array; `HookList::finalize` decides whether it
/// actually runs this render.
pub fn use_effect(
    session: &mut Session,
    phase: EffectPhase,
    deps: Option<Vec<Value>>,
    callback: impl FnMut() -> Option<Box<dyn FnOnce()>> + 'static,
) {
    let index = session.next_hook_index();
    let hooks = session.hooks();
    hooks.slot_at(index, "effect", || Hook::Effect {
        phase,
        callback: RefCell::new(Box::new(|| None)),
        pending_deps: RefCell::new(None),
        memoized_deps: RefCell::new(None),
        cleanup: RefCell::new(None),
    });
    if let Hook::Effect { callback: slot_cb, pending_deps, .. } = &hooks.slots[index] {
        *slot_cb.borrow_mut() = Box::new(callback);
        *pending_deps.borrow_mut() = deps;
    }
}

/// `useId`: allocate once, using the runtime's monotonically-increasing
/// counter prefixed by a per-runtime token.
pub fn use_id(session: &mut Session) -> Rc<str> {
    let index = session.next_hook_index();
    let hooks = session.hooks();
    if index == hooks.len() {
        let id = session.allocate_id();
        hooks.slots.push(Hook::Id(id));
    }
    match &hooks.slots[index] {
        Hook::Id(id) => id.clone(),
        other => panic!("Unexpected hook type: expected id, found {}", other.kind_name()),
    }
}

/// `useRef(initial)` is `useMemo(|| Cell::new(initial), [])`.
pub fn use_ref<T: 'static>(session: &mut Session, initial: T) -> Rc<RefCell<T>> {
    use_memo(session, Some(Vec::new()), move || RefCell::new(initial))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TestBackend;
    use crate::config::RuntimeConfig;
    use crate::lane::Priority;
    use crate::scheduler::Runtime;

    #[test]
    fn use_memo_recomputes_only_when_deps_change() {
        let backend = TestBackend::new();
        let rt = Runtime::new(backend, RuntimeConfig::default(), "t");
        let calls = Rc::new(Cell::new(0u32));
        let dep = Rc::new(Cell::new(1i64));
        let (calls_r, dep_r) = (calls.clone(), dep.clone());
        let (coroutine, _) = rt.mount(Box::new(move |session| {
            let calls = calls_r.clone();
            use_memo(session, Some(vec![Value::Int(dep_r.get())]), move || calls.set(calls.get() + 1));
            Value::Null
        }));
        assert_eq!(calls.get(), 1);

        rt.schedule_update(coroutine.clone(), UpdateOptions::new(Priority::UserBlocking));
        rt.flush_sync();
        assert_eq!(calls.get(), 1, "same dep must not recompute");

        dep.set(2);
        rt.schedule_update(coroutine, UpdateOptions::new(Priority::UserBlocking));
        rt.flush_sync();
        assert_eq!(calls.get(), 2, "changed dep must recompute");
    }

    /// Seed scenario: three synchronous dispatches against the same
    /// reducer coalesce into a single render with the final batched state.
    #[test]
    fn reducer_batches_synchronous_dispatches_into_one_render() {
        let backend = TestBackend::new();
        let rt = Runtime::new(backend, RuntimeConfig::default(), "t");
        let renders = Rc::new(Cell::new(0u32));
        let renders_r = renders.clone();
        let last = Rc::new(Cell::new(0i64));
        let last_r = last.clone();
        let dispatch_slot: Rc<RefCell<Option<Dispatch<i64, i64>>>> = Rc::new(RefCell::new(None));
        let dispatch_slot_r = dispatch_slot.clone();

        let (_coroutine, _) = rt.mount(Box::new(move |session| {
            renders_r.set(renders_r.get() + 1);
            let (state, dispatch, _pending) = use_reducer(session, |s: &i64, delta: &i64| s + delta, || 0i64, |a, b| a == b);
            last_r.set(*state);
            *dispatch_slot_r.borrow_mut() = Some(dispatch);
            Value::Null
        }));
        assert_eq!(renders.get(), 1);

        let dispatch = dispatch_slot.borrow().clone().unwrap();
        dispatch.dispatch(1);
        dispatch.dispatch(1);
        dispatch.dispatch(1);
        rt.flush_sync();

        assert_eq!(renders.get(), 2, "three coalesced dispatches settle in one extra render");
        assert_eq!(last.get(), 3);
    }

    #[test]
    fn use_state_set_replaces_value_and_schedules_a_rerender() {
        let backend = TestBackend::new();
        let rt = Runtime::new(backend, RuntimeConfig::default(), "t");
        let last = Rc::new(Cell::new(String::new()));
        let last_r = last.clone();
        let set_slot: Rc<RefCell<Option<Dispatch<String, StateAction<String>>>>> = Rc::new(RefCell::new(None));
        let set_slot_r = set_slot.clone();

        rt.mount(Box::new(move |session| {
            let (state, set, _pending) = use_state(session, || "a".to_string());
            last_r.set((*state).clone());
            *set_slot_r.borrow_mut() = Some(set);
            Value::Null
        }));
        assert_eq!(last.get(), "a");

        set_slot.borrow().as_ref().unwrap().set("b".to_string());
        rt.flush_sync();
        assert_eq!(last.get(), "b");
    }

    #[test]
    fn use_effect_reruns_only_when_deps_change_and_runs_cleanup_first() {
        let backend = TestBackend::new();
        let rt = Runtime::new(backend, RuntimeConfig::default(), "t");
        let runs = Rc::new(Cell::new(0u32));
        let cleanups = Rc::new(Cell::new(0u32));
        let dep = Rc::new(Cell::new(1i64));
        let (runs_r, cleanups_r, dep_r) = (runs.clone(), cleanups.clone(), dep.clone());

        let (coroutine, _) = rt.mount(Box::new(move |session| {
            let runs = runs_r.clone();
            let cleanups = cleanups_r.clone();
            use_effect(session, EffectPhase::Passive, Some(vec![Value::Int(dep_r.get())]), move || {
                runs.set(runs.get() + 1);
                let cleanups = cleanups.clone();
                Some(Box::new(move || cleanups.set(cleanups.get() + 1)))
            });
            Value::Null
        }));
        assert_eq!(runs.get(), 1);
        assert_eq!(cleanups.get(), 0);

        rt.schedule_update(coroutine.clone(), UpdateOptions::new(Priority::UserBlocking));
        rt.flush_sync();
        assert_eq!(runs.get(), 1, "unchanged dep must not rerun the effect");

        dep.set(2);
        rt.schedule_update(coroutine, UpdateOptions::new(Priority::UserBlocking));
        rt.flush_sync();
        assert_eq!(runs.get(), 2, "changed dep reruns the effect");
        assert_eq!(cleanups.get(), 1, "prior cleanup runs before the new effect body");
    }

    #[test]
    fn use_id_allocates_once_and_is_stable_across_rerenders() {
        let backend = TestBackend::new();
        let rt = Runtime::new(backend, RuntimeConfig::default(), "t");
        let seen: Rc<RefCell<Vec<Rc<str>>>> = Rc::new(RefCell::new(Vec::new()));
        let seen_r = seen.clone();

        let (coroutine, _) = rt.mount(Box::new(move |session| {
            let id = use_id(session);
            seen_r.borrow_mut().push(id);
            Value::Null
        }));
        rt.schedule_update(coroutine, UpdateOptions::new(Priority::UserBlocking));
        rt.flush_sync();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], seen[1]);
    }

    #[test]
    fn use_ref_holds_a_stable_cell_across_rerenders() {
        let backend = TestBackend::new();
        let rt = Runtime::new(backend, RuntimeConfig::default(), "t");
        let handle: Rc<RefCell<Option<Rc<RefCell<i64>>>>> = Rc::new(RefCell::new(None));
        let handle_r = handle.clone();

        let (coroutine, _) = rt.mount(Box::new(move |session| {
            let cell = use_ref(session, 0i64);
            *cell.borrow_mut() += 1;
            *handle_r.borrow_mut() = Some(cell);
            Value::Null
        }));
        let first = handle.borrow().clone().unwrap();
        assert_eq!(*first.borrow(), 1);

        rt.schedule_update(coroutine, UpdateOptions::new(Priority::UserBlocking));
        rt.flush_sync();
        let second = handle.borrow().clone().unwrap();
        assert!(Rc::ptr_eq(&first, &second), "useRef must return the same cell every render");
        assert_eq!(*second.borrow(), 2);
    }

    /// Seed scenario: calling a different hook at a position a prior render
    /// already committed to another kind is a fatal hook-order violation.
    #[test]
    #[should_panic(expected = "Unexpected hook type at position")]
    fn mismatched_hook_order_across_renders_panics() {
        let backend = TestBackend::new();
        let rt = Runtime::new(backend, RuntimeConfig::default(), "t");
        let first_render = Rc::new(Cell::new(true));
        let first_render_r = first_render.clone();

        let (coroutine, _) = rt.mount(Box::new(move |session| {
            if first_render_r.get() {
                let _ = use_memo(session, None, || 1i64);
            } else {
                let _ = use_id(session);
            }
            Value::Null
        }));
        first_render.set(false);
        rt.schedule_update(coroutine, UpdateOptions::new(Priority::UserBlocking));
        rt.flush_sync();
    }
}
