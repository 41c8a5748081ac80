//! cpulimit: burn CPU in cooperative worker loops, throttled to a ceiling.
//!
//! Run with:  `RUST_LOG=info cpulimit --max-cpu-usage 50 --workers 4`

use anyhow::{Context, Result};
use clap::Parser;
use cpulimit_limiter::{Limiter, LimiterConfig, LimiterEvent};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Length of one unit of work between `wait()` calls.
const SLICE: Duration = Duration::from_millis(10);

#[derive(Debug, Parser)]
#[command(name = "cpulimit", version, about = "Keep a CPU-bound workload under a utilization ceiling")]
struct Cli {
    /// TOML config file (defaults to $XDG_CONFIG_HOME/cpulimit/cpulimit.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ceiling for the rolling mean, in percent.
    #[arg(long)]
    max_cpu_usage: Option<f64>,

    /// Sampling period in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Number of samples in the rolling mean.
    #[arg(long)]
    measurements: Option<usize>,

    /// Measure only this process' share of CPU time.
    #[arg(long)]
    process_only: bool,

    /// Number of busy worker threads.
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    duration_secs: Option<u64>,
}

impl Cli {
    fn limiter_config(&self) -> Result<LimiterConfig> {
        let path = self.config.clone().unwrap_or_else(cpulimit_config::default_path);
        let mut config = cpulimit_config::load(&path)
            .with_context(|| format!("loading {}", path.display()))?;

        if let Some(max) = self.max_cpu_usage {
            config.max_cpu_usage = max;
        }
        if let Some(ms) = self.interval_ms {
            config.measure_interval = Duration::from_millis(ms);
        }
        if let Some(n) = self.measurements {
            config.measurements = n;
        }
        if self.process_only {
            config.current_process_only = true;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Structured logging. RUST_LOG controls verbosity (default: info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("cpulimit v{} starting", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let limiter = Arc::new(Limiter::new(cli.limiter_config()?));
    tokio::spawn(log_events(limiter.subscribe()));
    limiter.start().context("starting limiter")?;

    let done = Arc::new(AtomicBool::new(false));
    let workers: Vec<_> = (0..cli.workers.max(1))
        .map(|id| {
            let limiter = Arc::clone(&limiter);
            let done = Arc::clone(&done);
            tokio::task::spawn_blocking(move || burn(id, &limiter, &done))
        })
        .collect();

    match cli.duration_secs {
        Some(secs) => {
            tokio::select! {
                res = tokio::signal::ctrl_c() => res.context("listening for Ctrl-C")?,
                () = tokio::time::sleep(Duration::from_secs(secs)) => {}
            }
        }
        None => tokio::signal::ctrl_c().await.context("listening for Ctrl-C")?,
    }

    tracing::info!("shutting down");
    done.store(true, Ordering::Relaxed);
    limiter.stop().await;

    for (id, worker) in workers.into_iter().enumerate() {
        let slices = worker.await.context("worker panicked")?;
        tracing::info!(worker = id, slices, "worker finished");
    }
    Ok(())
}

/// Spin in `SLICE`-sized chunks, yielding to the limiter between chunks.
fn burn(id: usize, limiter: &Limiter, done: &AtomicBool) -> u64 {
    let mut slices = 0u64;
    let mut acc = id as u64 | 1;
    while !done.load(Ordering::Relaxed) {
        limiter.wait_blocking();
        let start = Instant::now();
        while start.elapsed() < SLICE {
            acc = std::hint::black_box(acc.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1));
        }
        slices += 1;
    }
    slices
}

async fn log_events(mut events: broadcast::Receiver<LimiterEvent>) {
    loop {
        match events.recv().await {
            Ok(LimiterEvent::GateChanged(state)) => tracing::info!("gate {state}"),
            Ok(LimiterEvent::Sampled { utilization, mean, .. }) => {
                tracing::debug!("cpu {utilization:.1}% (mean {mean:.1}%)");
            }
            Ok(LimiterEvent::ReadFailed(e)) => tracing::warn!("counter read failed: {e}"),
            Ok(LimiterEvent::Stopped) | Err(broadcast::error::RecvError::Closed) => break,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::debug!("dropped {n} limiter events");
            }
        }
    }
}
