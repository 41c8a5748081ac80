//! Linux `/proc` counter source.
//!
//! `/proc/stat` and `/proc/<pid>/stat` both report clock ticks (`USER_HZ`),
//! so system and process counters can be mixed without conversion.

use crate::source::CounterSource;
use cpulimit_core::{CpuTimes, LimitError, Result};
use std::path::PathBuf;

/// Reads CPU counters from procfs.
#[derive(Debug, Clone)]
pub struct ProcStat {
    root: PathBuf,
}

impl ProcStat {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    /// Use an alternative procfs mount (or a fixture directory).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, path: PathBuf) -> Result<String> {
        std::fs::read_to_string(&path)
            .map_err(|e| LimitError::CounterRead(format!("cannot read '{}': {e}", path.display())))
    }
}

impl Default for ProcStat {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSource for ProcStat {
    fn system_times(&mut self) -> Result<CpuTimes> {
        let raw = self.read(self.root.join("stat"))?;
        let line = raw
            .lines()
            .find(|l| l.starts_with("cpu "))
            .ok_or_else(|| LimitError::CounterRead("no aggregate cpu line in /proc/stat".into()))?;
        parse_cpu_line(line)
    }

    fn process_times(&mut self, pid: u32) -> Result<CpuTimes> {
        let raw = self.read(self.root.join(pid.to_string()).join("stat"))?;
        parse_pid_stat(&raw)
    }
}

/// Parse the aggregate `cpu  user nice system idle iowait irq softirq steal guest guest_nice` line.
///
/// Older kernels omit the trailing columns; missing ones count as zero.
pub fn parse_cpu_line(line: &str) -> Result<CpuTimes> {
    let fields = line
        .split_whitespace()
        .skip(1)
        .map(|f| {
            f.parse::<u64>()
                .map_err(|e| LimitError::CounterRead(format!("bad /proc/stat field '{f}': {e}")))
        })
        .collect::<Result<Vec<u64>>>()?;

    if fields.len() < 4 {
        return Err(LimitError::CounterRead(format!(
            "expected at least 4 cpu fields in /proc/stat, found {}",
            fields.len()
        )));
    }

    let at = |i: usize| fields.get(i).copied().unwrap_or(0) as f64;
    Ok(CpuTimes {
        user:       at(0),
        nice:       at(1),
        system:     at(2),
        idle:       at(3),
        iowait:     at(4),
        irq:        at(5),
        softirq:    at(6),
        steal:      at(7),
        guest:      at(8),
        guest_nice: at(9),
    })
}

// Offsets counted from the first field after the `(comm)` column.
const UTIME: usize = 11;
const STIME: usize = 12;
const BLKIO_TICKS: usize = 39;

/// Parse `/proc/<pid>/stat`: utime, stime and `delayacct_blkio_ticks`.
///
/// The command name may itself contain spaces and parentheses, so fields are
/// located relative to the last `)`.
pub fn parse_pid_stat(raw: &str) -> Result<CpuTimes> {
    let rest = raw
        .rfind(')')
        .and_then(|i| raw.get(i + 1..))
        .ok_or_else(|| LimitError::CounterRead("malformed /proc/<pid>/stat".into()))?;
    let fields: Vec<&str> = rest.split_whitespace().collect();

    let field = |i: usize| -> Result<f64> {
        let raw = fields.get(i).ok_or_else(|| {
            LimitError::CounterRead(format!("/proc/<pid>/stat has no field {}", i + 3))
        })?;
        raw.parse::<u64>()
            .map(|v| v as f64)
            .map_err(|e| LimitError::CounterRead(format!("bad /proc/<pid>/stat field '{raw}': {e}")))
    };

    Ok(CpuTimes {
        user:   field(UTIME)?,
        system: field(STIME)?,
        // Absent on kernels without delay accounting.
        iowait: field(BLKIO_TICKS).unwrap_or(0.0),
        ..CpuTimes::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "\
cpu  4705 150 1120 16250 520 0 12 3 0 0
cpu0 2300 70 560 8100 260 0 6 1 0 0
intr 114930548 113199788 3 0 5 263 0 4
ctxt 1990473
";

    fn pid_stat(comm: &str, utime: u64, stime: u64) -> String {
        let mut fields = vec!["0".to_string(); 50];
        fields[0] = "S".into();
        fields[UTIME] = utime.to_string();
        fields[STIME] = stime.to_string();
        fields[BLKIO_TICKS] = "7".into();
        format!("4242 ({comm}) {}\n", fields.join(" "))
    }

    #[test]
    fn parses_aggregate_line() {
        let times = parse_cpu_line(STAT.lines().next().unwrap()).unwrap();
        assert_eq!(times.user, 4705.0);
        assert_eq!(times.idle, 16250.0);
        assert_eq!(times.busy(), 4705.0 + 150.0 + 1120.0 + 520.0 + 12.0 + 3.0);
    }

    #[test]
    fn short_line_pads_with_zero() {
        let times = parse_cpu_line("cpu 1 2 3 4").unwrap();
        assert_eq!(times.iowait, 0.0);
        assert_eq!(times.total(), 10.0);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_cpu_line("cpu 1 2").is_err());
        assert!(parse_cpu_line("cpu 1 two 3 4").is_err());
    }

    #[test]
    fn pid_stat_with_awkward_comm() {
        let times = parse_pid_stat(&pid_stat("my (weird) proc", 120, 30)).unwrap();
        assert_eq!(times.user, 120.0);
        assert_eq!(times.system, 30.0);
        assert_eq!(times.iowait, 7.0);
        assert_eq!(times.idle, 0.0);
    }

    #[test]
    fn pid_stat_without_paren_is_an_error() {
        assert!(matches!(
            parse_pid_stat("4242 truncated"),
            Err(LimitError::CounterRead(_))
        ));
    }

    #[test]
    fn reads_fixture_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stat"), STAT).unwrap();
        std::fs::create_dir(dir.path().join("4242")).unwrap();
        std::fs::write(dir.path().join("4242").join("stat"), pid_stat("worker", 50, 10)).unwrap();

        let mut source = ProcStat::with_root(dir.path());
        assert_eq!(source.system_times().unwrap().idle, 16250.0);
        assert_eq!(source.process_times(4242).unwrap().busy(), 67.0);
        assert!(source.process_times(1).is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn reads_live_proc() {
        let mut source = ProcStat::new();
        let pid = crate::current_pid().unwrap();
        assert!(source.system_times().unwrap().total() > 0.0);
        assert!(source.process_times(pid).is_ok());
    }
}
