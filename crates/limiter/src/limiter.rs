use crate::gate::Gate;
use chrono::Local;
use cpulimit_config::LimiterConfig;
use cpulimit_core::{GateState, Lifecycle, LimitError, LimiterEvent, Result};
use cpulimit_system::{CounterSource, ProcStat, Sampler, Scope, Window};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 64;

enum Phase<S> {
    Created { source: S },
    Running {
        shutdown: oneshot::Sender<()>,
        task:     JoinHandle<()>,
    },
    Stopped,
}

/// Blocks cooperative callers while CPU utilization is above a ceiling.
///
/// ```no_run
/// # async fn demo() -> cpulimit_limiter::Result<()> {
/// use cpulimit_limiter::{Limiter, LimiterConfig};
///
/// let limiter = Limiter::new(LimiterConfig { max_cpu_usage: 50.0, ..LimiterConfig::default() });
/// limiter.start()?;
/// for _ in 0..1000 {
///     limiter.wait().await;
///     // one slice of work
/// }
/// limiter.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct Limiter<S = ProcStat> {
    config:     Mutex<LimiterConfig>,
    phase:      Mutex<Phase<S>>,
    gate:       Arc<Gate>,
    events:     broadcast::Sender<LimiterEvent>,
    terminated: Arc<watch::Sender<bool>>,
}

impl Limiter<ProcStat> {
    /// A limiter reading counters from `/proc`.
    pub fn new(config: LimiterConfig) -> Self {
        Self::with_source(config, ProcStat::new())
    }
}

impl<S: CounterSource> Limiter<S> {
    /// A limiter reading counters from `source`.
    pub fn with_source(config: LimiterConfig, source: S) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (terminated, _) = watch::channel(false);
        Self {
            config: Mutex::new(config),
            phase: Mutex::new(Phase::Created { source }),
            gate: Arc::new(Gate::new()),
            events,
            terminated: Arc::new(terminated),
        }
    }

    /// Fill in defaults and spawn the sampling loop on the current tokio
    /// runtime.
    ///
    /// Fails if the limiter was already started or stopped, if there is no
    /// runtime, or (with `current_process_only`) if the current process
    /// cannot be resolved. A failed start leaves the limiter startable.
    pub fn start(&self) -> Result<()> {
        let mut phase = lock(&self.phase);
        let mut source = match std::mem::replace(&mut *phase, Phase::Stopped) {
            Phase::Created { source } => source,
            running @ Phase::Running { .. } => {
                *phase = running;
                return Err(LimitError::AlreadyStarted);
            }
            Phase::Stopped => return Err(LimitError::Stopped),
        };

        let (config, scope, runtime) = match self.prepare(&mut source) {
            Ok(prepared) => prepared,
            Err(e) => {
                *phase = Phase::Created { source };
                return Err(e);
            }
        };

        info!(
            max_cpu_usage = config.max_cpu_usage,
            interval_ms = config.measure_interval.as_millis() as u64,
            measurements = config.measurements,
            ?scope,
            "starting CPU limiter"
        );
        self.emit(LimiterEvent::Started);

        let sampling = SamplingLoop {
            sampler:    Sampler::new(source, scope),
            window:     Window::new(config.measurements),
            ceiling:    config.max_cpu_usage,
            gate:       Arc::clone(&self.gate),
            events:     self.events.clone(),
            terminated: Arc::clone(&self.terminated),
        };
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = runtime.spawn(sampling.run(config.measure_interval, shutdown_rx));

        *phase = Phase::Running { shutdown, task };
        Ok(())
    }

    fn prepare(&self, source: &mut S) -> Result<(LimiterConfig, Scope, Handle)> {
        let runtime = Handle::try_current().map_err(|e| LimitError::Runtime(e.to_string()))?;

        let config = {
            let mut config = lock(&self.config);
            for correction in config.resolve() {
                info!("{correction}");
                self.emit(LimiterEvent::ConfigCorrected(correction.to_string()));
            }
            config.clone()
        };

        let scope = if config.current_process_only {
            let pid = cpulimit_system::current_pid()?;
            source.process_times(pid).map_err(|e| {
                LimitError::ProcessResolution(format!("process {pid} is not readable: {e}"))
            })?;
            Scope::Process(pid)
        } else {
            Scope::System
        };

        Ok((config, scope, runtime))
    }

    /// Stop the sampling loop and wait until it has exited.
    ///
    /// Once this returns the gate is open for good and every `wait()`
    /// returns immediately. Calling it again, or concurrently, is harmless;
    /// later callers wait for the first one's shutdown to finish.
    pub async fn stop(&self) {
        let previous = std::mem::replace(&mut *lock(&self.phase), Phase::Stopped);
        match previous {
            Phase::Running { shutdown, task } => {
                let _ = shutdown.send(());
                if let Err(e) = task.await {
                    error!("sampling loop ended abnormally: {e}");
                }
            }
            Phase::Created { .. } => {}
            Phase::Stopped => {
                let mut done = self.terminated.subscribe();
                let _ = done.wait_for(|done| *done).await;
            }
        }
        self.gate.open();
        self.terminated.send_replace(true);
    }

    /// [`stop`](Self::stop) for synchronous callers.
    ///
    /// Must not be called from inside an async task.
    pub fn stop_blocking(&self) {
        futures::executor::block_on(self.stop());
    }
}

impl<S> Limiter<S> {
    /// Suspend while the rolling mean is above the ceiling.
    pub async fn wait(&self) {
        self.gate.wait().await;
    }

    /// Block the current thread while the rolling mean is above the ceiling.
    ///
    /// Must not be called from inside an async task.
    pub fn wait_blocking(&self) {
        self.gate.wait_blocking();
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match &*lock(&self.phase) {
            Phase::Created { .. } => Lifecycle::Created,
            Phase::Running { .. } => Lifecycle::Running,
            Phase::Stopped => Lifecycle::Stopped,
        }
    }

    /// The configuration in effect; defaults are filled in once started.
    pub fn config(&self) -> LimiterConfig {
        lock(&self.config).clone()
    }

    /// Diagnostics stream. Slow receivers lose the oldest events.
    pub fn subscribe(&self) -> broadcast::Receiver<LimiterEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: LimiterEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

impl<S> std::fmt::Debug for Limiter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Limiter")
            .field("config", &self.config())
            .field("lifecycle", &self.lifecycle())
            .field("gate", &self.gate_state())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State owned by the background task. Only the gate is shared.
struct SamplingLoop<S> {
    sampler:    Sampler<S>,
    window:     Window,
    ceiling:    f64,
    gate:       Arc<Gate>,
    events:     broadcast::Sender<LimiterEvent>,
    terminated: Arc<watch::Sender<bool>>,
}

impl<S: CounterSource> SamplingLoop<S> {
    async fn run(mut self, period: Duration, mut shutdown: oneshot::Receiver<()>) {
        // Prime the sampler so the first tick already yields a sample.
        if let Err(e) = self.sampler.sample() {
            warn!("initial counter read failed, retrying next tick: {e}");
        }

        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                // A dropped sender (limiter dropped) also ends the loop.
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }

        if self.gate.open() {
            self.emit(LimiterEvent::GateChanged(GateState::Open));
        }
        self.terminated.send_replace(true);
        info!("CPU limiter stopped");
        self.emit(LimiterEvent::Stopped);
    }

    /// One measurement. Returns the rolling mean if a sample was taken.
    fn tick(&mut self) -> Option<f64> {
        match self.sampler.sample() {
            Ok(Some(utilization)) => Some(self.record(utilization)),
            Ok(None) => {
                debug!("CPU counters primed");
                None
            }
            Err(e) => {
                warn!("skipping tick, gate stays {}: {e}", self.gate.state());
                self.emit(LimiterEvent::ReadFailed(e.to_string()));
                None
            }
        }
    }

    fn record(&mut self, utilization: f64) -> f64 {
        self.window.push(utilization);
        let mean = self.window.mean();

        let changed = if mean > self.ceiling {
            self.gate.close()
        } else {
            self.gate.open()
        };

        debug!(utilization, mean, "CPU sample");
        self.emit(LimiterEvent::Sampled {
            utilization,
            mean,
            at: Local::now(),
        });

        if changed {
            let state = self.gate.state();
            info!(mean, ceiling = self.ceiling, "gate {state}");
            self.emit(LimiterEvent::GateChanged(state));
        }
        mean
    }

    fn emit(&self, event: LimiterEvent) {
        let _ = self.events.send(event);
    }
}
