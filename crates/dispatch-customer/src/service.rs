//! Implementation of the customer service
use std::time::Duration;

use dispatch_core::{CallerContext, Request, RequestHandler, RequestKind, Status};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::{Customer, CustomerError, Database};
use crate::truck::{TruckAvailability, TruckError, TruckLookup};

/// How the truck lookup for a customer went
#[derive(Debug)]
pub enum TruckOutcome {
    Available,
    /// The fleet service answered that the region has no truck left
    NoCapacity,
    /// The fleet service could not be asked
    Unreachable(TruckError),
}

impl TruckOutcome {
    pub fn is_available(&self) -> bool {
        matches!(self, TruckOutcome::Available)
    }

    /// What the end user is told. No capacity and an unreachable fleet look
    /// the same from the outside.
    pub fn label(&self) -> &'static str {
        if self.is_available() {
            "available"
        } else {
            "unavailable"
        }
    }
}

impl From<Result<TruckAvailability, TruckError>> for TruckOutcome {
    fn from(result: Result<TruckAvailability, TruckError>) -> Self {
        match result {
            Ok(TruckAvailability::Available) => TruckOutcome::Available,
            Ok(TruckAvailability::NoCapacity) => TruckOutcome::NoCapacity,
            Err(err) => TruckOutcome::Unreachable(err),
        }
    }
}

/// Result of a customer lookup
#[derive(Debug)]
pub struct Dispatch {
    pub customer: Customer,
    pub truck: TruckOutcome,
}

#[derive(Serialize)]
struct DispatchResponse<'a> {
    #[serde(flatten)]
    customer: &'a Customer,
    truck: &'static str,
}

/// Customer service: loads a customer and books a truck in their region
pub struct CustomerService {
    database: Database,
    trucks: Box<dyn TruckLookup>,
    gate_timeout: Option<Duration>,
}

impl CustomerService {
    /// Create a new [`CustomerService`]
    ///
    /// Requests give up waiting for the record store after `gate_timeout`, or
    /// never if it is [`None`].
    pub fn new(
        database: Database,
        trucks: Box<dyn TruckLookup>,
        gate_timeout: Option<Duration>,
    ) -> Self {
        Self {
            database,
            trucks,
            gate_timeout,
        }
    }

    /// Load customer `customer_id` and ask the fleet for one truck in the
    /// customer's region.
    pub fn dispatch(&self, request: Uuid, customer_id: &str) -> Result<Dispatch, CustomerError> {
        let mut ctx = CallerContext::new(request);
        if let Some(timeout) = self.gate_timeout {
            ctx = ctx.with_timeout(timeout);
        }
        self.dispatch_with(&ctx, customer_id)
    }

    /// Like [`CustomerService::dispatch`], with a caller supplied context
    pub fn dispatch_with(
        &self,
        ctx: &CallerContext,
        customer_id: &str,
    ) -> Result<Dispatch, CustomerError> {
        let customer = self.database.get(ctx, customer_id)?;

        let truck = TruckOutcome::from(self.trucks.find_truck(ctx.request(), &customer.region));
        match &truck {
            TruckOutcome::Available => {
                info!(request = %ctx.request(), region = %customer.region, "truck found in region")
            }
            TruckOutcome::NoCapacity => info!(
                request = %ctx.request(),
                region = %customer.region,
                "no trucks available in that region"
            ),
            TruckOutcome::Unreachable(err) => warn!(
                request = %ctx.request(),
                region = %customer.region,
                %err,
                "truck lookup failed"
            ),
        }
        Ok(Dispatch { customer, truck })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }
}

impl RequestHandler for CustomerService {
    fn handle(&self, rq: Request) {
        match rq.kind() {
            RequestKind::GetCustomer => {
                let customer_id = rq
                    .argument()
                    .filter(|id| !id.is_empty())
                    .map(str::to_owned);
                let Some(customer_id) = customer_id else {
                    rq.respond_with_err(Status::BadRequest, "Missing required 'customer' parameter");
                    return;
                };
                match self.dispatch(rq.request_id(), &customer_id) {
                    Ok(dispatch) => rq.respond_with_json(
                        Status::Ok,
                        &DispatchResponse {
                            customer: &dispatch.customer,
                            truck: dispatch.truck.label(),
                        },
                    ),
                    Err(err @ CustomerError::UnknownCustomer(_)) => {
                        info!(request = %rq.request_id(), %err, "request failed");
                        rq.respond_with_err(Status::NotFound, err.to_string())
                    }
                    Err(err @ CustomerError::Contention(_)) => {
                        warn!(request = %rq.request_id(), %err, "request abandoned");
                        rq.respond_with_err(Status::GatewayTimeout, err.to_string())
                    }
                }
            }
            RequestKind::LookupTruck | RequestKind::Health => {
                rq.respond_with_err(Status::NotFound, "the customer service does not book trucks")
            }
        }
    }

    fn shutdown(self) {}
}
