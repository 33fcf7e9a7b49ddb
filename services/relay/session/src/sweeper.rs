//! Process-wide tick source for evicting stale chunk fragments.
//!
//! The timer only runs while at least one link reports pending fragments;
//! otherwise it parks until a link asks for ticks again.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tracing::debug;

/// Default interval between sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Links currently holding fragments, plus the wakeup for a parked timer
#[derive(Debug, Default)]
struct Demand {
    pending_links: AtomicUsize,
    wake: Notify,
}

/// Broadcasts sweep ticks to every relay link
#[derive(Debug)]
pub struct ChunkSweeper {
    tx: broadcast::Sender<()>,
    demand: Arc<Demand>,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ChunkSweeper {
    /// Start ticking every `interval` while any link has pending fragments
    pub fn start(interval: Duration) -> Self {
        let (tx, _) = broadcast::channel(4);
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let demand = Arc::new(Demand::default());
        let ticks = tx.clone();
        let wanted = demand.clone();

        let handle = tokio::spawn(async move {
            loop {
                if wanted.pending_links.load(Ordering::Acquire) == 0 {
                    debug!("Chunk sweeper parked");
                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        _ = wanted.wake.notified() => continue,
                    }
                }

                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = tokio::time::sleep(interval) => {
                        if wanted.pending_links.load(Ordering::Acquire) > 0 {
                            // no subscribers is fine
                            let _ = ticks.send(());
                        }
                    }
                }
            }
            debug!("Chunk sweeper stopped");
        });

        Self {
            tx,
            demand,
            shutdown,
            handle,
        }
    }

    /// Receive future ticks
    pub fn subscribe(&self) -> SweepTicks {
        SweepTicks {
            rx: self.tx.subscribe(),
            demand: self.demand.clone(),
            pending: false,
        }
    }

    /// Stop ticking
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Whether the timer is armed
    pub fn is_armed(&self) -> bool {
        self.demand.pending_links.load(Ordering::Acquire) > 0
    }
}

impl Default for ChunkSweeper {
    fn default() -> Self {
        Self::start(DEFAULT_SWEEP_INTERVAL)
    }
}

impl Drop for ChunkSweeper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// One link's subscription to the sweeper
#[derive(Debug)]
pub struct SweepTicks {
    rx: broadcast::Receiver<()>,
    demand: Arc<Demand>,
    pending: bool,
}

impl SweepTicks {
    /// Report whether this link holds fragments awaiting reassembly
    pub fn set_pending(&mut self, pending: bool) {
        if pending == self.pending {
            return;
        }
        self.pending = pending;
        if pending {
            if self.demand.pending_links.fetch_add(1, Ordering::AcqRel) == 0 {
                self.demand.wake.notify_one();
            }
        } else {
            self.demand.pending_links.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Wait for the next tick.
    ///
    /// Missed ticks collapse into one; `false` once the sweeper is gone.
    pub async fn tick(&mut self) -> bool {
        match self.rx.recv().await {
            Ok(()) | Err(RecvError::Lagged(_)) => true,
            Err(RecvError::Closed) => false,
        }
    }
}

impl Drop for SweepTicks {
    fn drop(&mut self) {
        self.set_pending(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_only_while_pending() {
        let sweeper = ChunkSweeper::start(Duration::from_secs(10));
        let mut ticks = sweeper.subscribe();
        assert!(!sweeper.is_armed());

        // parked: nothing is broadcast while no link holds fragments
        tokio::time::advance(Duration::from_secs(35)).await;
        assert!(ticks.rx.try_recv().is_err());

        ticks.set_pending(true);
        assert!(sweeper.is_armed());
        assert!(ticks.tick().await);

        ticks.set_pending(false);
        assert!(!sweeper.is_armed());
        drop(ticks);

        let mut other = sweeper.subscribe();
        other.set_pending(true);
        drop(other);
        assert!(!sweeper.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_closes_subscribers() {
        let sweeper = ChunkSweeper::start(Duration::from_secs(10));
        let mut ticks = sweeper.subscribe();
        sweeper.stop();
        drop(sweeper);
        assert!(!ticks.tick().await);
    }
}
