//! The render frame (§3): the scratchpad for one update batch.
//!
//! Grounded on the `RuntimeHandle`/`Context` pairing in `runtime/context.rs`,
//! generalized from "one cache plus one revision counter" to the
//! three-phase effect queues and pending coroutine list the scheduler needs.

use crate::binding::CommitContext;
use crate::coroutine::CoroutineHandle;
use crate::hook::EffectPhase;
use crate::lane::Lanes;
use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct FrameId(pub u64);

pub type MutationEffect = Box<dyn FnOnce(&CommitContext)>;
pub type LayoutEffect = Box<dyn FnOnce(&CommitContext)>;
pub type PassiveEffect = Box<dyn FnOnce()>;

/// Per-update scratchpad. One `RenderFrame` is live for the duration of a
/// `flushAsync`/`flushSync` call.
pub struct RenderFrame {
    pub id: FrameId,
    pub lanes: Lanes,
    pub pending_coroutines: VecDeque<CoroutineHandle>,
    pub mutation_effects: Vec<MutationEffect>,
    pub layout_effects: Vec<LayoutEffect>,
    pub passive_effects: Vec<PassiveEffect>,
}

impl RenderFrame {
    pub fn new(id: FrameId, lanes: Lanes) -> Self {
        RenderFrame {
            id,
            lanes,
            pending_coroutines: VecDeque::new(),
            mutation_effects: Vec::new(),
            layout_effects: Vec::new(),
            passive_effects: Vec::new(),
        }
    }

    pub fn enqueue_coroutine(&mut self, coroutine: CoroutineHandle) {
        self.pending_coroutines.push_back(coroutine);
    }

    /// File a finalized hook effect into the phase bucket the three-phase
    /// commit (§4.6) will drain it from. `Insertion` effects run before the
    /// mutation phase commits parts, so they land in the same bucket as
    /// binding-level mutation effects, just run first by the scheduler.
    pub fn deposit_effect(&mut self, phase: EffectPhase, run: Box<dyn FnOnce()>) {
        match phase {
            EffectPhase::Insertion => self.mutation_effects.push(Box::new(move |_ctx: &CommitContext| run())),
            EffectPhase::Layout => self.layout_effects.push(Box::new(move |_ctx: &CommitContext| run())),
            EffectPhase::Passive => self.passive_effects.push(run),
        }
    }

    /// Take the current batch of pending coroutines, leaving the queue
    /// empty for anything appended to it while this batch resumes (the
    /// `flushAsync` drain loop in §4.6 relies on this to detect whether it
    /// should yield and continue or stop).
    pub fn drain_pending_coroutines(&mut self) -> VecDeque<CoroutineHandle> {
        std::mem::take(&mut self.pending_coroutines)
    }
}
