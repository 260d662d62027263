//! Client side of the truck availability lookup

use std::time::Duration;

use dispatch_core::lookup::LOOKUP_PATH;
use dispatch_core::{ConfigError, LookupStatus, REQUEST_ID_HEADER};
use reqwest::blocking::Client;
use reqwest::Url;
use thiserror::Error;
use uuid::Uuid;

/// What the fleet service said about a region
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TruckAvailability {
    /// A truck was booked
    Available,
    /// The fleet answered, but has no truck in the region
    NoCapacity,
}

/// The lookup did not produce an answer from the fleet service
#[derive(Debug, Error)]
pub enum TruckError {
    #[error("fleet service did not answer within {0:?}")]
    Timeout(Duration),
    #[error("cannot reach the fleet service: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("fleet service answered with unexpected status {0}")]
    UnexpectedStatus(u16),
}

/// Ask the fleet for a truck in a region
pub trait TruckLookup: Send + Sync {
    fn find_truck(&self, request: Uuid, region: &str) -> Result<TruckAvailability, TruckError>;
}

/// [`TruckLookup`] calling the fleet service over HTTP
pub struct HttpTruckLookup {
    client: Client,
    base: Url,
    timeout: Duration,
}

impl HttpTruckLookup {
    /// Create a client for the fleet service at `base_url`.
    ///
    /// Every lookup is abandoned after `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::FleetUrl {
            url: base_url.to_owned(),
            reason,
        };
        let base = Url::parse(base_url).map_err(|err| invalid(err.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid(String::from("not a base URL")));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| invalid(format!("cannot build HTTP client: {err}")))?;
        Ok(Self {
            client,
            base,
            timeout,
        })
    }

    /// URL of the lookup route for `region`, with the region percent-encoded
    /// as one path segment
    pub fn lookup_url(&self, region: &str) -> Url {
        let mut url = self.base.clone();
        // Checked in `new`.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(LOOKUP_PATH.trim_start_matches('/'))
                .push(region);
        }
        url
    }
}

impl TruckLookup for HttpTruckLookup {
    fn find_truck(&self, request: Uuid, region: &str) -> Result<TruckAvailability, TruckError> {
        let response = self
            .client
            .get(self.lookup_url(region))
            .header(REQUEST_ID_HEADER, request.hyphenated().to_string())
            .send()
            .map_err(|err| {
                if err.is_timeout() {
                    TruckError::Timeout(self.timeout)
                } else {
                    TruckError::Transport(err)
                }
            })?;

        let code = response.status().as_u16();
        match LookupStatus::from_code(code) {
            Some(LookupStatus::Available) => Ok(TruckAvailability::Available),
            Some(LookupStatus::Unavailable) => Ok(TruckAvailability::NoCapacity),
            None => Err(TruckError::UnexpectedStatus(code)),
        }
    }
}
