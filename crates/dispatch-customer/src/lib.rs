//! 👤 Customer service: customer records behind a deliberately undersized
//! connection pool, plus the client booking trucks from the fleet service.

use dispatch_core::{ConfigError, CustomerConfig, Gate};
use tracing::info;

pub mod database;
pub mod service;
pub mod truck;

pub use database::{sample_customers, Customer, CustomerError, Database};
pub use service::{CustomerService, Dispatch, TruckOutcome};
pub use truck::{HttpTruckLookup, TruckAvailability, TruckError, TruckLookup};

/// Entrypoint of the customer service
///
/// Must not be called from within an async runtime, the fleet client is
/// blocking.
pub fn launch(config: &CustomerConfig) -> Result<CustomerService, ConfigError> {
    config.validate()?;
    let trucks = HttpTruckLookup::new(&config.fleet_url, config.fleet_timeout())?;
    if config.gate_disabled {
        info!("record store gate disabled, queries run concurrently");
    }
    let database = Database::new(Gate::new(!config.gate_disabled), config.get_delay());
    Ok(CustomerService::new(
        database,
        Box::new(trucks),
        config.gate_timeout(),
    ))
}
