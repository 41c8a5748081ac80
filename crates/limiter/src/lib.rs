//! Cooperative CPU throttle.
//!
//! A [`Limiter`] samples CPU counters on a timer and closes its [`Gate`]
//! while the rolling mean of utilization is above the configured ceiling.
//! Work loops call [`Limiter::wait`] between units of work and are held
//! back until utilization decays.

pub mod gate;
pub mod limiter;

pub use cpulimit_config::{Correction, LimiterConfig};
pub use cpulimit_core::{GateState, Lifecycle, LimitError, LimiterEvent, Result};
pub use cpulimit_system::{CounterSource, ProcStat};
pub use gate::Gate;
pub use limiter::Limiter;
