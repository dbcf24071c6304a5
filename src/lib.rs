//! A reactive rendering runtime: templates, bindings, hooks, and a
//! priority-laned scheduler.
//!
//! The pieces compose roughly bottom-up:
//! - [`value`], [`part`] and [`backend`] describe the data a binding writes
//!   and the host contract it writes through.
//! - [`binding`], [`primitive`] and [`directive`] resolve a value at a part
//!   into a live, committable binding.
//! - [`slot`] and [`repeat`] reconcile those bindings as values change.
//! - [`template`] compiles a hole-annotated skeleton into a `render`/
//!   `hydrate` pair, and [`preprocessor`] handles the `dynamic*` literal
//!   splice ahead of it.
//! - [`hook`], [`coroutine`] and [`session`] give a component instance its
//!   ordered state slots and the API surface it renders against.
//! - [`scope`] carries error/hydration/shared-context boundaries down the
//!   component tree, and [`scheduler`] owns the pending-update queue and
//!   the three-phase commit that ties everything together.
//! - [`executor`] is a small in-band future pool, drained to stalling around
//!   every render pass, for effects that spawn ordinary futures.

#![deny(clippy::all)]
#![allow(clippy::unused_unit)]

pub mod backend;
pub mod binding;
pub mod config;
pub mod coroutine;
pub mod directive;
pub mod drop_guard;
pub mod error;
pub mod executor;
pub mod frame;
pub mod hook;
pub mod lane;
pub mod part;
pub mod preprocessor;
pub mod primitive;
pub mod repeat;
pub mod scheduler;
pub mod scope;
pub mod session;
pub mod slot;
pub mod template;
pub mod testing;
pub mod value;

pub use crate::backend::{Backend, TestBackend};
pub use crate::config::RuntimeConfig;
pub use crate::coroutine::{Coroutine, CoroutineHandle, CoroutineId, UpdateHandle};
pub use crate::error::{RuntimeError, Thrown};
pub use crate::executor::TaskSpawner;
pub use crate::hook::{use_effect, use_id, use_memo, use_reducer, use_ref, use_state, EffectPhase};
pub use crate::lane::{Lanes, Priority, UpdateOptions};
pub use crate::part::{NodeId, NodeKind, Part, PartKind};
pub use crate::scheduler::{Runtime, Scheduling};
pub use crate::scope::Scope;
pub use crate::session::Session;
pub use crate::slot::{Slot, SlotKind};
pub use crate::value::Value;
