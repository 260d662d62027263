//! Implementation of the truck lookup service
use std::sync::Arc;

use dispatch_core::lookup::NO_TRUCKS_AVAILABLE;
use dispatch_core::{LookupStatus, Request, RequestHandler, RequestKind, Status};
use tracing::{debug, info};

use crate::pool::{Allocation, RegionPool};
use crate::replenisher::ReplenisherHandle;

/// Fleet service answering truck lookups from the [`RegionPool`]
pub struct FleetService {
    pool: Arc<RegionPool>,
    replenisher: ReplenisherHandle,
}

impl FleetService {
    /// Create a new [`FleetService`]
    pub fn new(pool: Arc<RegionPool>, replenisher: ReplenisherHandle) -> Self {
        Self { pool, replenisher }
    }

    /// Book one truck in `region`.
    ///
    /// Unknown regions and exhausted regions are both reported as
    /// [`LookupStatus::Unavailable`]; use [`FleetService::allocate`] to tell
    /// them apart.
    pub fn lookup(&self, region: &str) -> LookupStatus {
        if self.allocate(region).is_granted() {
            LookupStatus::Available
        } else {
            LookupStatus::Unavailable
        }
    }

    /// Book one truck in `region`, reporting why a booking failed
    pub fn allocate(&self, region: &str) -> Allocation {
        let allocation = self.pool.try_allocate(region);
        match allocation {
            Allocation::Granted { remaining } => {
                debug!(region, remaining, "truck found")
            }
            Allocation::Exhausted => info!(region, "no trucks available"),
            Allocation::UnknownRegion => info!(region, "lookup for a region that is not served"),
        }
        allocation
    }

    /// Number of trucks currently available in `region`
    pub fn available(&self, region: &str) -> Option<u32> {
        self.pool.available(region)
    }

    /// The pool backing this service
    pub fn pool(&self) -> &Arc<RegionPool> {
        &self.pool
    }
}

impl RequestHandler for FleetService {
    fn handle(&self, rq: Request) {
        match rq.kind() {
            RequestKind::LookupTruck => {
                let Some(region) = rq.argument().map(str::to_owned) else {
                    rq.respond_with_err(Status::BadRequest, "Missing region");
                    return;
                };
                match self.lookup(&region) {
                    LookupStatus::Available => rq.respond_with_json(
                        LookupStatus::Available.status(),
                        &format!("truck found in {region}"),
                    ),
                    LookupStatus::Unavailable => rq.respond_unavailable(NO_TRUCKS_AVAILABLE),
                }
            }
            RequestKind::Health => rq.respond_with_json(Status::Ok, "available"),
            RequestKind::GetCustomer => {
                rq.respond_with_err(Status::NotFound, "the fleet service does not know customers")
            }
        }
    }

    fn shutdown(self) {
        // tell the replenisher to shut down
        self.replenisher.shutdown();
    }
}
