//! Implementation of the replenisher

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::select;
use tracing::{debug, info};

use super::pool::RegionPool;

/// Background loop restocking every region on a fixed interval
pub struct Replenisher {
    pool: Arc<RegionPool>,
    interval: Duration,
    shutdown: Receiver<()>,
}

/// Handle of a running [`Replenisher`] thread
pub struct ReplenisherHandle {
    shutdown: Sender<()>,
    thread: JoinHandle<()>,
}

impl Replenisher {
    pub fn new(pool: Arc<RegionPool>, interval: Duration, shutdown: Receiver<()>) -> Self {
        Self {
            pool,
            interval,
            shutdown,
        }
    }

    /// Start the replenisher on its own thread
    pub fn spawn(pool: Arc<RegionPool>, interval: Duration) -> std::io::Result<ReplenisherHandle> {
        let (shutdown, shutdown_receiver) = channel::bounded(1);
        let replenisher = Replenisher::new(pool, interval, shutdown_receiver);
        let thread = thread::Builder::new()
            .name(String::from("replenisher"))
            .spawn(move || replenisher.run())?;
        Ok(ReplenisherHandle { shutdown, thread })
    }

    /// The replenisher's main routine.
    ///
    /// Restocks the pool every `interval` until a shutdown message arrives or
    /// the shutdown sender is dropped.
    pub fn run(&self) {
        info!(interval = ?self.interval, "replenisher started");
        let ticker = channel::tick(self.interval);
        loop {
            select! {
                recv(self.shutdown) -> _ => break,
                recv(ticker) -> _ => {
                    let shipped = self.pool.replenish_all();
                    debug!(shipped, "replenish round finished");
                }
            }
        }
        info!("replenisher stopped");
    }
}

impl ReplenisherHandle {
    /// Stop the replenisher and wait for its thread to finish
    pub fn shutdown(self) {
        let _ = self.shutdown.send(());
        if self.thread.join().is_err() {
            tracing::warn!("replenisher thread panicked");
        }
    }
}
