//! Arena configuration parameters.

/// How much the arena trusts the handles and pointers it is given back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GuardMode {
    /// No validation. Releasing or reallocating anything that is not a
    /// live allocation of this arena is undefined by contract; in practice
    /// it trips a bounds assertion or corrupts the chain.
    #[default]
    Unchecked,
    /// Every handle passed to release or reallocate must carry an intact
    /// guard word and name a block that is currently allocated. Violations
    /// are reported as errors and leave the arena untouched.
    Checked,
}

/// Configuration for an [`Arena`](crate::Arena).
///
/// Capacity is not part of the config: it is the arena's const generic
/// parameter and is validated at compile time. All values are fixed at
/// construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Handle validation policy.
    ///
    /// Default: [`GuardMode::Unchecked`].
    pub guard: GuardMode,
}

impl ArenaConfig {
    /// Default handle validation policy.
    pub const DEFAULT_GUARD: GuardMode = GuardMode::Unchecked;

    /// Create a config with default values.
    pub const fn new() -> Self {
        Self {
            guard: Self::DEFAULT_GUARD,
        }
    }

    /// Create a config that validates handles on release and reallocate.
    pub const fn checked() -> Self {
        Self::new().with_guard(GuardMode::Checked)
    }

    /// Replace the guard mode.
    pub const fn with_guard(mut self, guard: GuardMode) -> Self {
        self.guard = guard;
        self
    }

    /// Whether handles are validated before use.
    pub fn is_checked(&self) -> bool {
        self.guard == GuardMode::Checked
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new()
    }
}
