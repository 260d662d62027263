//! 🏗 Infrastructure shared by the fleet and customer services: requests,
//! configuration and the simulated backend contention primitives.

mod config;
pub mod gate;
pub mod jitter;
pub mod lookup;
mod request;

pub use config::{
    validate_regions, Config, ConfigError, CustomerConfig, FleetConfig, RegionSpec, TRUCK_CAPACITY,
};
pub use gate::{CallerContext, CancelToken, Gate, GateError, GateGuard};
pub use jitter::DelaySpec;
pub use lookup::LookupStatus;
pub use request::{
    RawRequest, Request, RequestHandler, RequestKind, Status, REQUEST_ID_HEADER,
};
