/// Cumulative CPU time counters as reported by a counter source.
///
/// All fields share one unit (clock ticks for procfs). Only differences
/// between two readings are meaningful.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuTimes {
    pub user:       f64,
    pub nice:       f64,
    pub system:     f64,
    pub idle:       f64,
    pub iowait:     f64,
    pub irq:        f64,
    pub softirq:    f64,
    pub steal:      f64,
    pub guest:      f64,
    pub guest_nice: f64,
}

impl CpuTimes {
    /// Time spent in every non-idle state.
    #[must_use]
    pub fn busy(&self) -> f64 {
        self.user
            + self.system
            + self.nice
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
            + self.guest
            + self.guest_nice
    }

    /// Busy plus idle time.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.busy() + self.idle
    }
}

/// The `(busy, total)` pair the sampler diffs between ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CounterSnapshot {
    pub busy:  f64,
    pub total: f64,
}

impl CounterSnapshot {
    #[must_use]
    pub fn new(busy: f64, total: f64) -> Self {
        Self { busy, total }
    }
}

impl From<CpuTimes> for CounterSnapshot {
    fn from(times: CpuTimes) -> Self {
        Self {
            busy:  times.busy(),
            total: times.total(),
        }
    }
}

/// Whether callers of `wait()` may proceed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GateState {
    #[default]
    Open,
    Closed,
}

impl GateState {
    #[must_use]
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open   => f.write_str("open"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Limiter lifecycle. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Lifecycle {
    #[default]
    Created,
    Running,
    Stopped,
}
