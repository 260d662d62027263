use std::net::{SocketAddr, TcpListener};
use std::time::Duration;

use dispatch_core::{DelaySpec, Gate};
use dispatch_customer::{
    CustomerService, Database, TruckAvailability, TruckError, TruckLookup,
};
use uuid::Uuid;

/// Truck lookup that always gives the same answer without any I/O
#[allow(unused)]
pub struct FixedTrucks(pub TruckAvailability);

impl TruckLookup for FixedTrucks {
    fn find_truck(&self, _request: Uuid, _region: &str) -> Result<TruckAvailability, TruckError> {
        Ok(self.0)
    }
}

/// Customer service with the sample customers and a fixed truck answer
#[allow(unused)]
pub fn customer_service(
    gate_enabled: bool,
    delay: DelaySpec,
    gate_timeout: Option<Duration>,
) -> CustomerService {
    CustomerService::new(
        Database::new(Gate::new(gate_enabled), delay),
        Box::new(FixedTrucks(TruckAvailability::Available)),
        gate_timeout,
    )
}

/// An address nothing is listening on
#[allow(unused)]
pub fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
