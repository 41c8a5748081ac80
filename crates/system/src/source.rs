use cpulimit_core::{CpuTimes, Result};

/// Supplies cumulative CPU time counters on demand.
///
/// Reads are synchronous and may fail; the sampling loop treats a failure as
/// a skipped tick. Implementations are moved into the loop task, hence
/// `Send + 'static`.
pub trait CounterSource: Send + 'static {
    /// Aggregate counters for all CPUs of the machine.
    fn system_times(&mut self) -> Result<CpuTimes>;

    /// Counters of a single process. Only the states the OS tracks per
    /// process are filled in; `idle` stays zero.
    fn process_times(&mut self, pid: u32) -> Result<CpuTimes>;
}

impl<S: CounterSource + ?Sized> CounterSource for Box<S> {
    fn system_times(&mut self) -> Result<CpuTimes> {
        (**self).system_times()
    }

    fn process_times(&mut self, pid: u32) -> Result<CpuTimes> {
        (**self).process_times(pid)
    }
}
