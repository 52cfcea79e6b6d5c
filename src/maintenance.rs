//! Background maintenance for the hash index.
//!
//! A single long-lived worker thread performs all expansion work. The
//! hot path only signals: when an insert crosses the load threshold it
//! raises a debounced request on the maintenance condition, and the
//! worker wakes, switches the index to the global lock, and migrates
//! buckets in bounded batches until the old table is drained.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

use crate::index::HashIndex;

/// Pause/resume control over the sibling slab rebalancer.
///
/// The maintenance worker pauses the rebalancer for the duration of
/// global-lock engagement and resumes it when the index returns to
/// fine-grained locking. Resuming a rebalancer that is not paused must
/// be a no-op.
pub trait RebalancerControl: Send + Sync {
    /// Pause the rebalancer before global-lock work begins.
    fn pause(&self);
    /// Resume the rebalancer once fine-grained locking is restored.
    fn resume(&self);
}

/// Why the maintenance worker woke up.
pub(crate) enum Wake {
    /// An expansion was requested.
    Expansion,
    /// Shutdown was requested.
    Shutdown,
}

#[derive(Default)]
struct SignalState {
    expansion_requested: bool,
    shutdown: bool,
}

/// Condition the maintenance worker sleeps on.
///
/// The request flag is a debounce: any number of raisers before one wake
/// produce exactly one unit of work, and the worker clears the flag when
/// it consumes a request.
pub(crate) struct MaintenanceSignal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl MaintenanceSignal {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SignalState::default()),
            cond: Condvar::new(),
        }
    }

    /// Raise an expansion request. Returns `true` if the request was
    /// newly raised, `false` if one was already pending.
    pub(crate) fn request(&self) -> bool {
        let mut state = self.state.lock();
        if state.expansion_requested {
            return false;
        }
        state.expansion_requested = true;
        self.cond.notify_one();
        true
    }

    pub(crate) fn is_requested(&self) -> bool {
        self.state.lock().expansion_requested
    }

    pub(crate) fn request_shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.cond.notify_all();
    }

    pub(crate) fn clear_shutdown(&self) {
        self.state.lock().shutdown = false;
    }

    pub(crate) fn shutdown_requested(&self) -> bool {
        self.state.lock().shutdown
    }

    /// Block until an expansion request or shutdown arrives. Consumes
    /// the request flag.
    pub(crate) fn wait(&self) -> Wake {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                return Wake::Shutdown;
            }
            if state.expansion_requested {
                state.expansion_requested = false;
                return Wake::Expansion;
            }
            self.cond.wait(&mut state);
        }
    }
}

/// Handle to the maintenance worker thread.
///
/// The worker is created at startup and joined at shutdown; dropping the
/// handle stops it. Stopping mid-expansion is clean: the worker finishes
/// the batch in hand, observes the shutdown flag, and exits (a restarted
/// worker picks the expansion back up).
pub struct MaintenanceWorker {
    index: Arc<HashIndex>,
    rebalancer: Option<Arc<dyn RebalancerControl>>,
    handle: Option<JoinHandle<()>>,
}

impl MaintenanceWorker {
    /// Create a worker for the given index. The thread is not spawned
    /// until [`start`](MaintenanceWorker::start).
    pub fn new(index: Arc<HashIndex>) -> Self {
        Self {
            index,
            rebalancer: None,
            handle: None,
        }
    }

    /// Attach a sibling rebalancer to pause around global-lock work.
    pub fn with_rebalancer(mut self, rebalancer: Arc<dyn RebalancerControl>) -> Self {
        self.rebalancer = Some(rebalancer);
        self
    }

    /// Spawn the worker thread.
    ///
    /// Returns `Ok(false)` if the worker is already running. A spawn
    /// failure is returned to the caller, who decides whether to proceed
    /// without background expansion.
    pub fn start(&mut self) -> io::Result<bool> {
        if self.handle.is_some() {
            return Ok(false);
        }

        self.index.signal.clear_shutdown();
        let index = Arc::clone(&self.index);
        let rebalancer = self.rebalancer.clone();
        let handle = thread::Builder::new()
            .name("oxihash-maintenance".to_string())
            .spawn(move || worker_loop(index, rebalancer))?;
        self.handle = Some(handle);
        Ok(true)
    }

    /// Signal shutdown and join the worker.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.index.signal.request_shutdown();
            let _ = handle.join();
        }
    }

    /// Whether the worker thread has been started and not stopped.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for MaintenanceWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(index: Arc<HashIndex>, rebalancer: Option<Arc<dyn RebalancerControl>>) {
    loop {
        // Drain a live expansion one batch at a time, yielding between
        // batches so readers and writers can progress. The shutdown flag
        // is checked between batches, never mid-batch.
        while index.is_expanding() {
            if index.signal.shutdown_requested() {
                return;
            }
            index.expand_step();
            thread::yield_now();
        }

        // Back under fine-grained locks; let the rebalancer run while we
        // sleep.
        if let Some(rebalancer) = &rebalancer {
            rebalancer.resume();
        }

        match index.signal.wait() {
            Wake::Shutdown => return,
            Wake::Expansion => {}
        }

        if let Some(rebalancer) = &rebalancer {
            rebalancer.pause();
        }
        index.start_expansion();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_debounce() {
        let signal = MaintenanceSignal::new();
        assert!(!signal.is_requested());

        assert!(signal.request());
        assert!(!signal.request());
        assert!(signal.is_requested());

        assert!(matches!(signal.wait(), Wake::Expansion));
        assert!(!signal.is_requested());

        // Consuming the request re-arms the debounce.
        assert!(signal.request());
    }

    #[test]
    fn test_signal_shutdown_wins() {
        let signal = MaintenanceSignal::new();
        signal.request();
        signal.request_shutdown();

        assert!(matches!(signal.wait(), Wake::Shutdown));
        assert!(signal.shutdown_requested());

        signal.clear_shutdown();
        assert!(!signal.shutdown_requested());
    }

    #[test]
    fn test_signal_wakes_waiter() {
        use std::sync::mpsc;
        use std::thread;

        let signal = Arc::new(MaintenanceSignal::new());
        let (tx, rx) = mpsc::channel();

        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || {
                tx.send(()).unwrap();
                matches!(signal.wait(), Wake::Expansion)
            })
        };

        rx.recv().unwrap();
        signal.request();
        assert!(waiter.join().unwrap());
    }
}
