use cpulimit_core::GateState;
use tokio::sync::watch;

/// Open/closed latch that callers wait on.
///
/// Backed by a watch channel: every waiter subscribes and is woken when the
/// state changes, so all waiters are released together when the gate opens.
/// Only the sampling loop (and shutdown) flips it.
#[derive(Debug)]
pub struct Gate {
    state: watch::Sender<GateState>,
}

impl Gate {
    /// A new gate, initially open.
    pub fn new() -> Self {
        let (state, _) = watch::channel(GateState::Open);
        Self { state }
    }

    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    /// Close the gate. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.set(GateState::Closed)
    }

    /// Open the gate. Returns `false` if it was already open.
    pub fn open(&self) -> bool {
        self.set(GateState::Open)
    }

    fn set(&self, next: GateState) -> bool {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        })
    }

    /// Suspend until the gate is open. Returns immediately if it already is.
    pub async fn wait(&self) {
        let mut rx = self.state.subscribe();
        // Only fails once the sender is dropped, which `&self` rules out.
        let _ = rx.wait_for(|s| s.is_open()).await;
    }

    /// Block the current thread until the gate is open.
    ///
    /// Must not be called from inside an async task.
    pub fn wait_blocking(&self) {
        futures::executor::block_on(self.wait());
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}
