use crate::source::CounterSource;
use cpulimit_core::{CounterSnapshot, Result};

/// Whose busy time is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every CPU state of the whole machine.
    System,
    /// Busy time of one process against total system time.
    Process(u32),
}

/// Utilization in percent between two snapshots.
///
/// Zero when no time elapsed (or the counters went backwards). Never
/// negative; not capped at 100.
pub fn utilization(prev: CounterSnapshot, now: CounterSnapshot) -> f64 {
    let total = now.total - prev.total;
    if total <= 0.0 {
        return 0.0;
    }
    (100.0 * (now.busy - prev.busy) / total).max(0.0)
}

/// Turns consecutive counter reads into utilization samples.
///
/// Owned by the sampling loop; not shared.
#[derive(Debug)]
pub struct Sampler<S> {
    source: S,
    scope:  Scope,
    prev:   Option<CounterSnapshot>,
}

impl<S: CounterSource> Sampler<S> {
    pub fn new(source: S, scope: Scope) -> Self {
        Self { source, scope, prev: None }
    }

    /// Read the current `(busy, total)` pair for this scope.
    ///
    /// In process scope `busy` comes from the process and `total` from the
    /// system, so the result is the process' share of all CPU time.
    pub fn snapshot(&mut self) -> Result<CounterSnapshot> {
        match self.scope {
            Scope::System => self.source.system_times().map(CounterSnapshot::from),
            Scope::Process(pid) => {
                let system = self.source.system_times()?;
                let process = self.source.process_times(pid)?;
                Ok(CounterSnapshot::new(process.busy(), system.total()))
            }
        }
    }

    /// Take a snapshot and measure against the previous one.
    ///
    /// Returns `Ok(None)` on the first successful read, which only primes
    /// the sampler. On error the previous snapshot is kept, so the next
    /// sample spans the failed tick.
    pub fn sample(&mut self) -> Result<Option<f64>> {
        let now = self.snapshot()?;
        let usage = self.prev.map(|prev| utilization(prev, now));
        self.prev = Some(now);
        Ok(usage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpulimit_core::{CpuTimes, LimitError};
    use std::collections::VecDeque;

    /// Replays canned system and process readings.
    #[derive(Default)]
    struct Replay {
        system:  VecDeque<Result<CpuTimes>>,
        process: VecDeque<Result<CpuTimes>>,
    }

    impl CounterSource for Replay {
        fn system_times(&mut self) -> Result<CpuTimes> {
            self.system
                .pop_front()
                .unwrap_or_else(|| Err(LimitError::CounterRead("exhausted".into())))
        }

        fn process_times(&mut self, _pid: u32) -> Result<CpuTimes> {
            self.process
                .pop_front()
                .unwrap_or_else(|| Err(LimitError::CounterRead("exhausted".into())))
        }
    }

    fn system(busy: f64, idle: f64) -> Result<CpuTimes> {
        Ok(CpuTimes { user: busy, idle, ..CpuTimes::default() })
    }

    fn process(busy: f64) -> Result<CpuTimes> {
        Ok(CpuTimes { user: busy, ..CpuTimes::default() })
    }

    #[test]
    fn zero_total_delta_is_zero() {
        let snap = CounterSnapshot::new(10.0, 100.0);
        assert_eq!(utilization(snap, snap), 0.0);
    }

    #[test]
    fn plain_ratio() {
        let prev = CounterSnapshot::new(10.0, 100.0);
        let now = CounterSnapshot::new(40.0, 200.0);
        assert_eq!(utilization(prev, now), 30.0);
    }

    #[test]
    fn not_clamped_above_hundred() {
        let prev = CounterSnapshot::new(0.0, 0.0);
        let now = CounterSnapshot::new(110.0, 100.0);
        assert_eq!(utilization(prev, now), 110.0);
    }

    #[test]
    fn never_negative() {
        let prev = CounterSnapshot::new(50.0, 100.0);
        let now = CounterSnapshot::new(40.0, 200.0);
        assert_eq!(utilization(prev, now), 0.0);
    }

    #[test]
    fn first_read_primes() {
        let mut source = Replay::default();
        source.system.extend([system(10.0, 90.0), system(60.0, 140.0)]);
        let mut sampler = Sampler::new(source, Scope::System);

        assert_eq!(sampler.sample().unwrap(), None);
        assert_eq!(sampler.sample().unwrap(), Some(50.0));
    }

    #[test]
    fn process_busy_over_system_total() {
        let mut source = Replay::default();
        source.process.extend([process(100.0), process(110.0)]);
        source.system.extend([system(300.0, 700.0), system(400.0, 800.0)]);
        let mut sampler = Sampler::new(source, Scope::Process(7));

        assert_eq!(sampler.sample().unwrap(), None);
        // 10 process ticks out of 200 system ticks.
        assert_eq!(sampler.sample().unwrap(), Some(5.0));
    }

    #[test]
    fn failed_read_keeps_previous_snapshot() {
        let mut source = Replay::default();
        source.system.extend([
            system(0.0, 100.0),
            Err(LimitError::CounterRead("transient".into())),
            system(100.0, 200.0),
        ]);
        let mut sampler = Sampler::new(source, Scope::System);

        assert_eq!(sampler.sample().unwrap(), None);
        assert!(sampler.sample().is_err());
        assert_eq!(sampler.sample().unwrap(), Some(50.0));
    }
}
