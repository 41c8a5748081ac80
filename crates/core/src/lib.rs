pub mod error;
pub mod event;
pub mod state;

pub use error::{LimitError, Result};
pub use event::LimiterEvent;
pub use state::{CounterSnapshot, CpuTimes, GateState, Lifecycle};
