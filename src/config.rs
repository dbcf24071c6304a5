//! Tunables for a [`crate::scheduler::Runtime`], constructed explicitly
//! rather than read from ambient globals -- `Runtime::new` takes its spawner
//! and waker as constructor arguments instead of reaching for a config file
//! or environment.

/// Construction-time knobs for a [`crate::scheduler::Runtime`].
#[derive(Clone, Copy, Debug)]
pub struct RuntimeConfig {
    /// How long a single cooperative slice may run before
    /// `Backend::should_yield_to_main` starts returning `true`. The design
    /// calls ~5ms "typical"; left configurable for tests that want
    /// deterministic yielding without timing.
    pub yield_budget_ms: f64,

    /// The priority assumed for a `scheduleUpdate` call that doesn't specify
    /// one explicitly.
    pub default_priority: crate::lane::Priority,

    /// Whether `flushAsync` is permitted to route mutation-phase commits
    /// through `Backend::start_view_transition`. Degrades to a plain commit
    /// when `false`, matching the design note that view transitions are an
    /// optional backend capability.
    pub view_transitions_enabled: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            yield_budget_ms: 5.0,
            default_priority: crate::lane::Priority::UserBlocking,
            view_transitions_enabled: true,
        }
    }
}
