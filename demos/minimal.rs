//! Minimal example: throttle a work loop to 50% CPU.
//!
//! ```
//! cargo run --example minimal
//! ```

use cpulimit_limiter::{Limiter, LimiterConfig};
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let limiter = Limiter::new(LimiterConfig {
        max_cpu_usage:    50.0,
        measure_interval: Duration::from_millis(333),
        measurements:     3,
        ..LimiterConfig::default()
    });
    limiter.start()?;

    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        limiter.wait().await;
        // some work
        let slice = Instant::now();
        while slice.elapsed() < Duration::from_millis(5) {
            std::hint::spin_loop();
        }
        tokio::task::yield_now().await;
    }

    limiter.stop().await;
    Ok(())
}
