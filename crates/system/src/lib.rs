pub mod procfs;
pub mod sampler;
pub mod source;
pub mod window;

pub use procfs::ProcStat;
pub use sampler::{utilization, Sampler, Scope};
pub use source::CounterSource;
pub use window::Window;

use cpulimit_core::{LimitError, Result};

/// Resolve the id of the running process.
pub fn current_pid() -> Result<u32> {
    sysinfo::get_current_pid()
        .map(|pid| pid.as_u32())
        .map_err(|e| LimitError::ProcessResolution(e.to_string()))
}
