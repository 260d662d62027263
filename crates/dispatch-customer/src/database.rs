//! Customer records behind a simulated SQL connection pool

use std::collections::HashMap;

use dispatch_core::{CallerContext, DelaySpec, Gate, GateError};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// A customer and the dispatch region serving it
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub location: String,
    pub region: String,
}

impl Customer {
    pub fn new(id: &str, name: &str, location: &str, region: &str) -> Self {
        Self {
            id: id.to_owned(),
            name: name.to_owned(),
            location: location.to_owned(),
            region: region.to_owned(),
        }
    }
}

/// Errors loading a customer
#[derive(Debug, Error)]
pub enum CustomerError {
    #[error("invalid customer ID {0:?}")]
    UnknownCustomer(String),
    #[error("record store busy: {0}")]
    Contention(#[from] GateError),
}

/// Customers every fresh [`Database`] is seeded with
pub fn sample_customers() -> Vec<Customer> {
    vec![
        Customer::new("123", "Bailey Motorsport", "WA", "north-west"),
        Customer::new("567", "Hu's Irish Whiskey Distillery", "OR", "north-west"),
        Customer::new("392", "Worrels Esports Supplies", "CA", "south-west"),
        Customer::new("731", "Wyatt's Taxidermy, LLC", "AL", "south-east"),
    ]
}

/// In-memory customer table
///
/// Reads go through a [`Gate`], so with the gate enabled only one query runs
/// at a time, each taking a [`DelaySpec`] worth of simulated latency.
pub struct Database {
    customers: HashMap<String, Customer>,
    gate: Gate,
    delay: DelaySpec,
}

impl Database {
    /// Create a [`Database`] holding the [sample customers](sample_customers)
    pub fn new(gate: Gate, delay: DelaySpec) -> Self {
        Self::with_customers(sample_customers(), gate, delay)
    }

    pub fn with_customers(
        customers: impl IntoIterator<Item = Customer>,
        gate: Gate,
        delay: DelaySpec,
    ) -> Self {
        let customers = customers
            .into_iter()
            .map(|customer| (customer.id.clone(), customer))
            .collect();
        Self {
            customers,
            gate,
            delay,
        }
    }

    /// Load the customer with the given id.
    ///
    /// Blocks until the gate is free, then sleeps for the configured delay
    /// while holding it.
    pub fn get(&self, ctx: &CallerContext, customer_id: &str) -> Result<Customer, CustomerError> {
        debug!(request = %ctx.request(), customer_id, "loading customer");

        let connection = self.gate.acquire(ctx)?;
        debug!(
            request = %ctx.request(),
            "SELECT * FROM customer WHERE customer_id={customer_id}"
        );
        self.delay.wait();
        let customer = self.customers.get(customer_id).cloned();
        connection.release();

        customer.ok_or_else(|| CustomerError::UnknownCustomer(customer_id.to_owned()))
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }
}
