use std::time::Duration;

use dispatch_core::{CustomerConfig, FleetConfig, RegionSpec};
use dispatch_customer::CustomerService;
use dispatch_fleet::FleetService;
use dispatch_server::ServerHandle;
use eyre::Result;

mod api;
pub use api::mock::{self, MockApi, MockResponse, MockService};
pub use api::{Api, ApiResponse};

/// Listen address of the servers started by the tests
const LOCALHOST: &str = "127.0.0.1:0";

/// Install a test log subscriber, honouring `RUST_LOG`
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

pub struct TestCtxBuilder {
    /// Regions of the fleet service
    pub regions: Vec<RegionSpec>,
    /// Time between two restocks
    pub replenish_interval: Duration,
    /// Configuration of the customer service, `fleet_url` is filled in by
    /// [`TestCtxBuilder::build`]
    pub customer: CustomerConfig,
    /// Worker threads per HTTP server
    pub http_threads: usize,
}

impl Default for TestCtxBuilder {
    fn default() -> Self {
        Self {
            regions: vec![RegionSpec::new("south-west", 3)],
            // Long enough to never fire during a test unless asked to.
            replenish_interval: Duration::from_secs(3600),
            customer: CustomerConfig {
                get_delay_ms: 0,
                get_delay_stddev_ms: 0,
                fleet_timeout_ms: 1_000,
                ..CustomerConfig::default()
            },
            http_threads: 8,
        }
    }
}

impl TestCtxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the fleet's regions by `regions`
    pub fn with_regions(mut self, regions: &[(&str, u32)]) -> Self {
        self.regions = regions
            .iter()
            .map(|(name, capacity)| RegionSpec::new(*name, *capacity))
            .collect();
        self
    }

    pub fn with_replenish_interval(mut self, interval: Duration) -> Self {
        self.replenish_interval = interval;
        self
    }

    /// Set the simulated latency of a customer query (in milliseconds)
    pub fn with_get_delay(mut self, mean_ms: u64, stddev_ms: u64) -> Self {
        self.customer.get_delay_ms = mean_ms;
        self.customer.get_delay_stddev_ms = stddev_ms;
        self
    }

    pub fn with_gate_timeout(mut self, timeout_ms: u64) -> Self {
        self.customer.gate_timeout_ms = timeout_ms;
        self
    }

    pub fn with_gate_disabled(mut self) -> Self {
        self.customer.gate_disabled = true;
        self
    }

    pub fn with_http_threads(mut self, threads: usize) -> Self {
        assert_ne!(threads, 0);
        self.http_threads = threads;
        self
    }

    /// Get the [`FleetConfig`] for launching the fleet service
    fn fleet_config(&self) -> FleetConfig {
        FleetConfig {
            regions: self.regions.clone(),
            replenish_interval_ms: self.replenish_interval.as_millis() as u64,
        }
    }

    /// Start the fleet and the customer service on free local ports
    pub async fn build(self) -> Result<TestCtx> {
        init_logging();
        let fleet_config = self.fleet_config();
        let mut customer_config = self.customer;
        let threads = self.http_threads;

        let (fleet, customer) = tokio::task::spawn_blocking(move || -> Result<_> {
            let fleet = dispatch_server::serve(
                dispatch_fleet::launch(&fleet_config)?,
                LOCALHOST,
                threads,
            )?;
            customer_config.fleet_url = fleet.url();
            let customer = dispatch_server::serve(
                dispatch_customer::launch(&customer_config)?,
                LOCALHOST,
                threads,
            )?;
            Ok((fleet, customer))
        })
        .await??;

        Ok(TestCtx {
            api: Api::new(fleet.url(), customer.url()),
            fleet,
            customer,
            drop_bomb: DropBomb,
        })
    }
}

/// Test context
pub struct TestCtx {
    /// API allowing to interact with both services over HTTP
    pub api: Api,
    fleet: ServerHandle<FleetService>,
    customer: ServerHandle<CustomerService>,

    drop_bomb: DropBomb,
}

impl TestCtx {
    /// The running fleet service, for inspecting the pool
    pub fn fleet(&self) -> &FleetService {
        self.fleet.handler()
    }

    /// The running customer service
    pub fn customer(&self) -> &CustomerService {
        self.customer.handler()
    }

    /// Shut both services down and finish the test
    pub async fn finish(self) {
        std::mem::forget(self.drop_bomb);
        let fleet = self.fleet;
        let customer = self.customer;
        tokio::task::spawn_blocking(move || {
            customer.shutdown();
            fleet.shutdown();
        })
        .await
        .unwrap();
    }
}

struct DropBomb;

impl Drop for DropBomb {
    fn drop(&mut self) {
        eprintln!("@TestAuthor: You should call `ctx.finish().await` to shut the services down");
    }
}
