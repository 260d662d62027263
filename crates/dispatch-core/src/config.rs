use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::jitter::DelaySpec;

/// Units one truck carries between two restocks
pub const TRUCK_CAPACITY: u32 = 10;

/// Startup configuration problems, fatal for the process
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("region name must not be empty")]
    EmptyRegionName,
    #[error("region {0:?} is configured twice")]
    DuplicateRegion(String),
    #[error("region {0:?} needs a capacity of at least one unit")]
    ZeroCapacity(String),
    #[error("replenish interval must be positive")]
    ZeroInterval,
    #[error("fleet timeout must be positive")]
    ZeroFleetTimeout,
    #[error("invalid fleet url {url:?}: {reason}")]
    FleetUrl { url: String, reason: String },
}

/// A region and the number of units it is restocked to
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegionSpec {
    pub name: String,
    pub capacity: u32,
}

impl RegionSpec {
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: name.into(),
            capacity,
        }
    }
}

/// Check that every region has a unique, non-empty name and room for at least
/// one unit
pub fn validate_regions(regions: &[RegionSpec]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for region in regions {
        if region.name.is_empty() {
            return Err(ConfigError::EmptyRegionName);
        }
        if region.capacity == 0 {
            return Err(ConfigError::ZeroCapacity(region.name.clone()));
        }
        if !seen.insert(region.name.as_str()) {
            return Err(ConfigError::DuplicateRegion(region.name.clone()));
        }
    }
    Ok(())
}

/// Configuration of the fleet service
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FleetConfig {
    pub regions: Vec<RegionSpec>,
    pub replenish_interval_ms: u64,
}

impl Default for FleetConfig {
    fn default() -> Self {
        // Two trucks serve the north-east, four the south-east.
        Self {
            regions: vec![
                RegionSpec::new("north-east", 2 * TRUCK_CAPACITY),
                RegionSpec::new("south-east", 4 * TRUCK_CAPACITY),
            ],
            replenish_interval_ms: 30_000,
        }
    }
}

impl FleetConfig {
    pub fn replenish_interval(&self) -> Duration {
        Duration::from_millis(self.replenish_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_regions(&self.regions)?;
        if self.replenish_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

/// Configuration of the customer service
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CustomerConfig {
    /// Let every request into the record store at once (for load testing)
    pub gate_disabled: bool,
    pub get_delay_ms: u64,
    pub get_delay_stddev_ms: u64,
    /// How long a request may queue for the record store; `0` waits forever
    pub gate_timeout_ms: u64,
    /// Base URL of the fleet service
    pub fleet_url: String,
    pub fleet_timeout_ms: u64,
}

impl Default for CustomerConfig {
    fn default() -> Self {
        Self {
            gate_disabled: false,
            get_delay_ms: 300,
            get_delay_stddev_ms: 30,
            gate_timeout_ms: 5_000,
            fleet_url: String::from("http://127.0.0.1:8087"),
            fleet_timeout_ms: 2_000,
        }
    }
}

impl CustomerConfig {
    pub fn get_delay(&self) -> DelaySpec {
        DelaySpec::from_millis(self.get_delay_ms, self.get_delay_stddev_ms)
    }

    pub fn gate_timeout(&self) -> Option<Duration> {
        (self.gate_timeout_ms > 0).then(|| Duration::from_millis(self.gate_timeout_ms))
    }

    pub fn fleet_timeout(&self) -> Duration {
        Duration::from_millis(self.fleet_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fleet_timeout_ms == 0 {
            return Err(ConfigError::ZeroFleetTimeout);
        }
        Ok(())
    }
}

/// Configuration of both services, usually read from a TOML file
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub fleet: FleetConfig,
    pub customer: CustomerConfig,
}

impl Config {
    /// Read and validate the configuration at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.fleet.validate()?;
        config.customer.validate()?;
        Ok(config)
    }
}
