//! The in-band async task executor (§5a): drains a small pool of futures to
//! stalling on every `mount`/`flush*` entry and exit, for effects and
//! `use()`-composed hooks that spawn ordinary futures (e.g. a data-fetching
//! effect) without pulling in a full async runtime.
//!
//! Grounded directly on `src/embed/executor.rs`'s `InBandExecutor`/
//! `InBandSpawner` pair: useful for a small number of mostly quiet futures,
//! typical of streams of input events or other per-frame types of activity,
//! which is the same tradeoff effect-spawned work needs here, so the
//! implementation is carried over with its queue-then-drain shape intact.

use futures::future::{FutureObj, LocalFutureObj};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::task::{LocalSpawn, Spawn, SpawnError};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

/// An executor based on `futures::LocalPool`, run to stalling between render
/// passes. Not a general-purpose async runtime: no timers, no I/O reactor,
/// no timeout.
#[derive(Default)]
pub struct InBandExecutor {
    pool: FuturesUnordered<LocalFutureObj<'static, ()>>,
    incoming: Rc<RefCell<Vec<LocalFutureObj<'static, ()>>>>,
}

/// A handle effects can clone and spawn onto, independent of the executor's
/// own lifetime (spawns after the executor is gone are reported, not lost
/// silently).
#[derive(Clone)]
pub struct TaskSpawner(Rc<dyn LocalSpawn>);

struct InBandSpawner(Weak<RefCell<Vec<LocalFutureObj<'static, ()>>>>);

impl InBandExecutor {
    pub fn new() -> Self {
        InBandExecutor::default()
    }

    /// Run the executor until it has stalled (no ready futures and nothing
    /// left in the incoming queue). No cross-platform timeout mechanism is
    /// offered.
    pub fn run_until_stalled(&mut self, waker: &Waker) {
        let mut cx = Context::from_waker(waker);
        loop {
            {
                let mut incoming = self.incoming.borrow_mut();
                for task in incoming.drain(..) {
                    self.pool.push(task);
                }
            }
            let ret = self.pool.poll_next_unpin(&mut cx);
            if !self.incoming.borrow().is_empty() {
                continue;
            }
            match ret {
                Poll::Pending | Poll::Ready(None) => return,
                _ => {}
            }
        }
    }

    pub fn spawner(&self) -> TaskSpawner {
        TaskSpawner(Rc::new(InBandSpawner(Rc::downgrade(&self.incoming))))
    }
}

impl Spawn for InBandSpawner {
    fn spawn_obj(&self, future: FutureObj<'static, ()>) -> Result<(), SpawnError> {
        self.spawn_local_obj(future.into())
    }

    fn status(&self) -> Result<(), SpawnError> {
        self.status_local()
    }
}

impl LocalSpawn for InBandSpawner {
    fn spawn_local_obj(&self, future: LocalFutureObj<'static, ()>) -> Result<(), SpawnError> {
        if let Some(incoming) = self.0.upgrade() {
            incoming.borrow_mut().push(future);
            Ok(())
        } else {
            Err(SpawnError::shutdown())
        }
    }

    fn status_local(&self) -> Result<(), SpawnError> {
        if self.0.upgrade().is_some() {
            Ok(())
        } else {
            Err(SpawnError::shutdown())
        }
    }
}

impl TaskSpawner {
    pub fn spawn_local(&self, future: impl std::future::Future<Output = ()> + 'static) -> Result<(), SpawnError> {
        self.0.spawn_local_obj(LocalFutureObj::new(Box::new(future)))
    }
}

impl From<Rc<dyn LocalSpawn>> for TaskSpawner {
    fn from(spawn: Rc<dyn LocalSpawn>) -> Self {
        TaskSpawner(spawn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::BoolWaker;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn spawned_future_runs_to_completion_when_drained() {
        let mut executor = InBandExecutor::new();
        let ran = Rc::new(Cell::new(false));
        let ran_inner = ran.clone();
        executor.spawner().spawn_local(async move { ran_inner.set(true) }).unwrap();
        let waker = futures::task::waker(BoolWaker::new());
        executor.run_until_stalled(&waker);
        assert!(ran.get());
    }

    #[test]
    fn spawning_after_executor_dropped_reports_shutdown() {
        let executor = InBandExecutor::new();
        let spawner = executor.spawner();
        drop(executor);
        assert!(spawner.spawn_local(async {}).is_err());
    }
}
