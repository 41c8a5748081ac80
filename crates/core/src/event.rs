use crate::state::GateState;
use chrono::{DateTime, Local};

/// Diagnostics published by the sampling loop.
///
/// Sources:
/// - `Limiter::start`     → `Started`, `ConfigCorrected`
/// - sampling loop tick   → `Sampled`, `GateChanged`, `ReadFailed`
/// - loop shutdown        → `Stopped`
#[derive(Debug, Clone, PartialEq)]
pub enum LimiterEvent {
    /// The sampling loop has been spawned.
    Started,
    /// A configuration field was replaced or clamped (human-readable detail).
    ConfigCorrected(String),
    /// One tick completed.
    Sampled {
        /// Utilization measured over the last interval, in percent.
        utilization: f64,
        /// Rolling mean the gate decision was based on.
        mean: f64,
        at: DateTime<Local>,
    },
    /// The gate flipped.
    GateChanged(GateState),
    /// The counter source failed; the tick was skipped.
    ReadFailed(String),
    /// The loop has exited and the gate is open.
    Stopped,
}
