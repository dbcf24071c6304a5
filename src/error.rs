//! The error taxonomy from the error-handling design.
//!
//! Hook-order violations remain `panic!`s (see [`crate::hook`]) because the
//! design explicitly marks them fatal and distinct from the catchable
//! taxonomy below; everything else here flows through `Result` and is
//! consulted by [`crate::scope::Scope::catch_error`].

use crate::part::PartKind;
use std::fmt;

/// Errors the runtime can raise outside of the fatal hook-order panic.
#[derive(thiserror::Error, Debug)]
pub enum RuntimeError {
    /// A directive's `resolve_binding` was asked to bind at a part kind it
    /// does not support.
    #[error("directive {directive} cannot bind to a {part:?} part")]
    DirectiveMisuse { directive: &'static str, part: PartKind },

    /// A template's `hydrate` walked the pre-rendered DOM and found a shape
    /// that does not match the template's hole sequence.
    #[error("hydration mismatch at hole {hole_index}: expected {expected}, found {found}")]
    HydrationMismatch { hole_index: usize, expected: String, found: String },

    /// A scheduled callback failed; the coroutine's pending lanes are
    /// cleared so future `scheduleUpdate` calls are not silently absorbed.
    #[error("scheduled task failed: {0}")]
    SchedulerTask(String),

    /// A value thrown during render or commit reached the runtime root
    /// without being caught by any `ErrorBoundary`.
    #[error("unhandled error escaped all error boundaries: {0}")]
    Unhandled(String),
}

/// A boxed, type-erased payload passed to `catchError` handlers, mirroring
/// the dynamically-typed "thrown value" of the source design.
pub struct Thrown(pub Box<dyn std::any::Any>);

impl fmt::Debug for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Thrown(..)")
    }
}

impl Thrown {
    pub fn new(value: impl std::any::Any) -> Self {
        Thrown(Box::new(value))
    }

    pub fn downcast<T: std::any::Any>(self) -> Result<T, Thrown> {
        match self.0.downcast::<T>() {
            Ok(boxed) => Ok(*boxed),
            Err(other) => Err(Thrown(other)),
        }
    }
}
