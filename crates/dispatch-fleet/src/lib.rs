//! 🚚 Fleet service: trucks per region, booked by lookups and restocked by a
//! background thread.
//!
//! The components are the [pool] holding the per-region capacity, the
//! [replenisher] restocking it and the [service] answering lookups.

use std::io;
use std::sync::Arc;

use dispatch_core::{ConfigError, FleetConfig};
use thiserror::Error;
use tracing::info;

pub mod pool;
pub mod replenisher;
pub mod service;

pub use pool::{Allocation, RegionPool};
pub use replenisher::{Replenisher, ReplenisherHandle};
pub use service::FleetService;

/// Errors starting the fleet service
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot start the replenisher thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Entrypoint of the fleet service
///
/// Builds the pool from `config`, starts the replenisher and returns the
/// request handler. The replenisher runs until [`FleetService`] is shut down.
pub fn launch(config: &FleetConfig) -> Result<FleetService, LaunchError> {
    config.validate()?;
    let pool = Arc::new(RegionPool::new(&config.regions)?);
    info!(regions = ?pool.regions(), "fleet stocked");

    let replenisher = Replenisher::spawn(pool.clone(), config.replenish_interval())?;
    Ok(FleetService::new(pool, replenisher))
}
