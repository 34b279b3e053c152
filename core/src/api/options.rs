//! Configuration options for an interpreter state.

/// Configuration options for a [`State`](super::State).
///
/// # Example
///
/// ```
/// use psbots_core::api::StateOptions;
///
/// let options = StateOptions {
///     max_memory: Some(64 * 1024),
///     default_max_cycles: Some(10_000),
///     ..StateOptions::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct StateOptions {
    /// Ledger capacity in weighted units.
    ///
    /// Set to `None` for unbounded memory (be careful with untrusted code!).
    ///
    /// Default: None
    pub max_memory: Option<usize>,

    /// Record an allocation trail for every live container.
    ///
    /// Default: false
    pub debug_memory: bool,

    /// Make `run` report a pending exception as an error instead of leaving
    /// it for inspection.
    ///
    /// Default: false
    pub throw_on_exception: bool,

    /// Cycle budget of `run_to_completion`.
    ///
    /// Default: None
    pub default_max_cycles: Option<usize>,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            max_memory: None,
            debug_memory: false,
            throw_on_exception: false,
            default_max_cycles: None,
        }
    }
}
