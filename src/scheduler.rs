//! The scheduler/runtime (§4.6): owns the pending-update queue, drives the
//! three-phase commit, and coalesces scheduled updates by lane.
//!
//! Grounded on `src/embed.rs`'s `Runtime`/`RootedRuntime` (a per-root handle
//! pairing a root closure with a `topo::Id`-rooted cache and a `Waker`) and
//! `src/embed/executor.rs`'s `InBandExecutor` (a `FuturesUnordered` drained
//! with `run_until_stalled`, yielding control back to the host loop between
//! stalls) -- generalized from "one root, one `Poll`" into §4.6's laned
//! queue with a cooperative-yield budget and an explicit sync escape hatch.

use crate::backend::Backend;
use crate::config::RuntimeConfig;
use crate::coroutine::{Coroutine, CoroutineHandle, CoroutineId};
use crate::executor::{InBandExecutor, TaskSpawner};
use crate::frame::{FrameId, RenderFrame};
use crate::lane::{Lanes, Priority, UpdateOptions};
use crate::scope::Scope;
use crate::session::Session;
use crate::value::Value;
use futures::task::{noop_waker, LocalSpawn};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::task::Waker;

/// The subset of runtime services a `Session`/`Dispatch` needs without
/// depending on the concrete `Runtime` type (kept as a trait so `hook.rs`
/// and `session.rs` don't need to know about the backend or commit phases).
pub trait Scheduling {
    fn schedule_update(&self, coroutine: CoroutineHandle, options: UpdateOptions);
    fn allocate_id(&self) -> Rc<str>;
    fn default_priority(&self) -> Priority;
    fn task_spawner(&self) -> TaskSpawner;
}

struct Pending {
    coroutine: CoroutineHandle,
    lanes: Lanes,
}

/// Owns the pending-update queue, the per-runtime template cache, and the
/// cooperative scheduling loop. One `Runtime` corresponds to one mounted
/// root coroutine tree.
pub struct Runtime {
    backend: Rc<dyn Backend>,
    config: RuntimeConfig,
    next_frame_id: Cell<u64>,
    next_coroutine_id: Cell<u64>,
    next_hook_id: Cell<u64>,
    id_prefix: String,
    pending: RefCell<HashMap<CoroutineId, Pending>>,
    root: RefCell<Option<CoroutineHandle>>,
    executor: RefCell<InBandExecutor>,
    spawner: RefCell<TaskSpawner>,
    task_waker: RefCell<Waker>,
}

impl Runtime {
    pub fn new(backend: Rc<dyn Backend>, config: RuntimeConfig, id_prefix: impl Into<String>) -> Rc<Self> {
        let executor = InBandExecutor::new();
        let spawner = executor.spawner();
        Rc::new(Runtime {
            backend,
            config,
            next_frame_id: Cell::new(0),
            next_coroutine_id: Cell::new(0),
            next_hook_id: Cell::new(0),
            id_prefix: id_prefix.into(),
            pending: RefCell::new(HashMap::new()),
            root: RefCell::new(None),
            executor: RefCell::new(executor),
            spawner: RefCell::new(spawner),
            task_waker: RefCell::new(noop_waker()),
        })
    }

    /// §5a: swap the default in-band executor's spawner for a more capable
    /// one (I/O- or compute-oriented). Spawned tasks already queued on the
    /// in-band executor keep running there; only future `task_spawner()`
    /// calls observe the swap.
    pub fn set_task_executor(&self, sp: impl LocalSpawn + 'static) {
        *self.spawner.borrow_mut() = TaskSpawner::from(Rc::new(sp) as Rc<dyn LocalSpawn>);
    }

    /// Sets the waker used to drive the in-band executor; a real host
    /// forwards wakeups into its own scheduling rather than relying on the
    /// no-op default.
    pub fn set_task_waker(&self, waker: Waker) {
        *self.task_waker.borrow_mut() = waker;
    }

    /// Drains the in-band executor to stalling, run immediately before and
    /// after a render pass so newly spawned futures get a chance to install
    /// their wakers.
    fn drain_tasks(&self) {
        let waker = self.task_waker.borrow().clone();
        self.executor.borrow_mut().run_until_stalled(&waker);
    }

    pub fn backend(&self) -> &Rc<dyn Backend> {
        &self.backend
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Mount a root component, running its first render synchronously
    /// (there is nothing meaningful to coalesce or yield around before a
    /// tree exists).
    pub fn mount(self: &Rc<Self>, render: Box<crate::coroutine::RenderFn>) -> (CoroutineHandle, Value) {
        let id = CoroutineId(self.next_coroutine_id());
        let coroutine = Coroutine::new(id, Scope::root(), render);
        *self.root.borrow_mut() = Some(coroutine.clone());
        self.drain_tasks();
        let mut frame = RenderFrame::new(self.next_frame_id(), Lanes::SYNC);
        let output = coroutine.resume(&mut frame, self.clone() as Rc<dyn Scheduling>);
        self.drain_tasks();
        self.commit(frame);
        (coroutine, output)
    }

    fn next_frame_id(&self) -> FrameId {
        let id = self.next_frame_id.get();
        self.next_frame_id.set(id + 1);
        FrameId(id)
    }

    fn next_coroutine_id(&self) -> u64 {
        let id = self.next_coroutine_id.get();
        self.next_coroutine_id.set(id + 1);
        id
    }

    /// `flushSync`: ignore the yield budget and cooperative scheduling
    /// entirely, resolving every pending coroutine (and anything they
    /// schedule in turn) in one pass before returning.
    pub fn flush_sync(self: &Rc<Self>) {
        while !self.pending.borrow().is_empty() {
            let batch = self.drain_pending();
            self.run_batch(batch);
        }
    }

    /// `flushAsync`: resume pending coroutines, yielding to the backend's
    /// main-thread scheduler between batches when `should_yield_to_main`
    /// says the cooperative budget has elapsed. Resolves once the pending
    /// queue is empty.
    pub async fn flush_async(self: &Rc<Self>) {
        let started = std::time::Instant::now();
        loop {
            if self.pending.borrow().is_empty() {
                return;
            }
            let batch = self.drain_pending();
            let priority = batch
                .iter()
                .fold(Lanes::NONE, |mut acc, p| {
                    acc.merge(p.lanes);
                    acc
                })
                .resolve_priority()
                .unwrap_or(self.config.default_priority);
            self.run_batch(batch);
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
            if self.backend.should_yield_to_main(elapsed_ms) {
                self.backend.yield_to_main(priority).await;
            }
        }
    }

    fn drain_pending(&self) -> Vec<Pending> {
        std::mem::take(&mut *self.pending.borrow_mut()).into_values().collect()
    }

    fn run_batch(self: &Rc<Self>, batch: Vec<Pending>) {
        let lanes = batch.iter().fold(Lanes::NONE, |mut acc, p| {
            acc.merge(p.lanes);
            acc
        });
        self.drain_tasks();
        let mut frame = RenderFrame::new(self.next_frame_id(), lanes);
        for pending in batch {
            pending.coroutine.resume(&mut frame, self.clone() as Rc<dyn Scheduling>);
        }
        self.drain_tasks();
        self.commit(frame);
    }

    /// The three-phase commit (§4.6): Mutation, then Layout, then Passive.
    /// Mutation and Layout effects run synchronously; Passive effects are
    /// handed to the backend's callback queue so the host can schedule them
    /// after paint, matching `useEffect`'s "after the browser paints"
    /// semantics without this crate hard-coding what "after paint" means.
    fn commit(self: &Rc<Self>, mut frame: RenderFrame) {
        let mutation_effects = std::mem::take(&mut frame.mutation_effects);
        let layout_effects = std::mem::take(&mut frame.layout_effects);
        let backend = self.backend.clone();
        let run_sync_phases = move || {
            let ctx = crate::binding::CommitContext { backend: backend.as_ref() };
            for effect in mutation_effects {
                effect(&ctx);
            }
            for effect in layout_effects {
                effect(&ctx);
            }
        };
        if self.config.view_transitions_enabled && frame.lanes.contains(Lanes::VIEW_TRANSITION) {
            // `TestBackend::start_view_transition` runs its callback inline;
            // a real backend's promise settles asynchronously, but nothing
            // here depends on observing that completion.
            let _ = self.backend.start_view_transition(Box::new(run_sync_phases));
        } else {
            run_sync_phases();
        }
        let passive = std::mem::take(&mut frame.passive_effects);
        if !passive.is_empty() {
            let rt = self.clone();
            self.backend.request_callback(
                Priority::Background,
                Box::new(move || {
                    let _rt = rt;
                    for effect in passive {
                        effect();
                    }
                }),
            );
        }
        for handle in frame.drain_pending_coroutines() {
            self.schedule_update(handle, UpdateOptions::new(self.config.default_priority));
        }
    }
}

impl Scheduling for Runtime {
    /// §4.6: compute lanes from `options.priority` plus modifier lanes,
    /// merge into this coroutine's pending lanes, and coalesce with any
    /// already-queued task for it.
    fn schedule_update(&self, coroutine: CoroutineHandle, options: UpdateOptions) {
        let lanes = options.lanes();
        let mut pending = self.pending.borrow_mut();
        pending
            .entry(coroutine.id)
            .and_modify(|p| p.lanes.merge(lanes))
            .or_insert_with(|| Pending { coroutine, lanes });
    }

    fn allocate_id(&self) -> Rc<str> {
        let n = self.next_hook_id.get();
        self.next_hook_id.set(n + 1);
        Rc::from(format!("{}-{n}", self.id_prefix))
    }

    fn default_priority(&self) -> Priority {
        self.config.default_priority
    }

    /// The spawner effects and `use()`-composed hooks should clone onto for
    /// ordinary futures (data fetches, timers bridged from the host, etc).
    fn task_spawner(&self) -> TaskSpawner {
        self.spawner.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TestBackend;
    use crate::hook::{use_state, Dispatch, StateAction};
    use crate::value::Value;

    #[test]
    fn mount_runs_root_synchronously() {
        let backend = TestBackend::new();
        let rt = Runtime::new(backend, RuntimeConfig::default(), "t");
        let (_coroutine, output) = rt.mount(Box::new(|_session| Value::Int(1)));
        assert!(matches!(output, Value::Int(1)));
    }

    #[test]
    fn scheduled_updates_coalesce_by_coroutine() {
        let backend = TestBackend::new();
        let rt = Runtime::new(backend, RuntimeConfig::default(), "t");
        let (coroutine, _) = rt.mount(Box::new(|_session| Value::Null));
        rt.schedule_update(coroutine.clone(), UpdateOptions::new(Priority::UserVisible));
        rt.schedule_update(coroutine.clone(), UpdateOptions::new(Priority::UserBlocking));
        assert_eq!(rt.pending.borrow().len(), 1);
        let merged = rt.pending.borrow().get(&coroutine.id).unwrap().lanes;
        assert!(merged.contains(Lanes::USER_VISIBLE));
        assert!(merged.contains(Lanes::USER_BLOCKING));
    }

    #[test]
    fn view_transition_lane_routes_commit_through_start_view_transition() {
        let backend = TestBackend::new();
        let rt = Runtime::new(backend.clone(), RuntimeConfig::default(), "t");
        let (coroutine, _) = rt.mount(Box::new(|_session| Value::Null));
        rt.schedule_update(coroutine, UpdateOptions::view_transition(Priority::UserBlocking));
        rt.flush_sync();
        assert_eq!(backend.view_transition_calls.get(), 1);
    }

    /// Seed scenario: two components each hold their own reducer; one is
    /// updated at background priority, the other at user-blocking, before
    /// either yields. A single flush must still settle both, with the
    /// background update's lane never promoted to user-blocking urgency.
    #[test]
    fn background_update_does_not_preempt_or_get_promoted_by_a_concurrent_user_blocking_one() {
        let backend = TestBackend::new();
        let rt = Runtime::new(backend, RuntimeConfig::default(), "t");

        let state_a = Rc::new(RefCell::new(String::new()));
        let dispatch_a: Rc<RefCell<Option<Dispatch<String, StateAction<String>>>>> = Rc::new(RefCell::new(None));
        let (state_a_r, dispatch_a_r) = (state_a.clone(), dispatch_a.clone());
        let (coroutine_a, _) = rt.mount(Box::new(move |session| {
            let (value, set, _pending) = use_state(session, || "a0".to_string());
            *state_a_r.borrow_mut() = (*value).clone();
            *dispatch_a_r.borrow_mut() = Some(set);
            Value::Null
        }));

        let state_b = Rc::new(RefCell::new(String::new()));
        let dispatch_b: Rc<RefCell<Option<Dispatch<String, StateAction<String>>>>> = Rc::new(RefCell::new(None));
        let (state_b_r, dispatch_b_r) = (state_b.clone(), dispatch_b.clone());
        let (coroutine_b, _) = rt.mount(Box::new(move |session| {
            let (value, set, _pending) = use_state(session, || "b0".to_string());
            *state_b_r.borrow_mut() = (*value).clone();
            *dispatch_b_r.borrow_mut() = Some(set);
            Value::Null
        }));

        dispatch_b.borrow().as_ref().unwrap().set_with("b1".to_string(), UpdateOptions::new(Priority::Background));
        dispatch_a.borrow().as_ref().unwrap().set_with("a1".to_string(), UpdateOptions::new(Priority::UserBlocking));

        let lanes_a = rt.pending.borrow().get(&coroutine_a.id).unwrap().lanes;
        let lanes_b = rt.pending.borrow().get(&coroutine_b.id).unwrap().lanes;
        assert_eq!(lanes_a.resolve_priority(), Some(Priority::UserBlocking));
        assert_eq!(lanes_b.resolve_priority(), Some(Priority::Background));

        rt.flush_sync();
        assert_eq!(*state_a.borrow(), "a1");
        assert_eq!(*state_b.borrow(), "b1");
    }

    /// §9's resolved open question: `pending_lanes` is cleared at the
    /// *start* of `resume`, before the render closure runs, so a
    /// `forceUpdate` issued from inside that very closure schedules a real
    /// follow-up rather than being wiped out by the end-of-resume clear.
    #[test]
    fn schedule_during_render_schedules_followup() {
        let backend = TestBackend::new();
        let rt = Runtime::new(backend, RuntimeConfig::default(), "t");
        let renders = Rc::new(Cell::new(0u32));
        let renders_r = renders.clone();
        let (coroutine, _) = rt.mount(Box::new(move |session| {
            renders_r.set(renders_r.get() + 1);
            if renders_r.get() == 1 {
                session.force_update(Some(UpdateOptions::new(Priority::UserBlocking)));
            }
            Value::Null
        }));
        assert!(!coroutine.pending_lanes.get().is_empty(), "the in-render forceUpdate must not be absorbed");
        rt.flush_sync();
        assert_eq!(renders.get(), 2);
        assert!(coroutine.pending_lanes.get().is_empty());
    }

    #[test]
    fn spawned_task_runs_by_the_next_render_pass() {
        use std::cell::Cell;
        use std::rc::Rc;

        let backend = TestBackend::new();
        let rt = Runtime::new(backend, RuntimeConfig::default(), "t");
        let ran = Rc::new(Cell::new(false));
        let ran_inner = ran.clone();
        rt.task_spawner().spawn_local(async move { ran_inner.set(true) }).unwrap();
        let (coroutine, _) = rt.mount(Box::new(|_session| Value::Null));
        assert!(ran.get());
        rt.schedule_update(coroutine, UpdateOptions::new(Priority::UserBlocking));
        rt.flush_sync();
    }
}
