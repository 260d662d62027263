//! Wire contract of the truck availability lookup

use crate::Status;

/// Path prefix of the lookup route, followed by the region as a single path
/// segment
pub const LOOKUP_PATH: &str = "/lookup";

/// Body sent when no truck could be booked
pub const NO_TRUCKS_AVAILABLE: &str = "no trucks available";

/// Result of a lookup as seen on the wire
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum LookupStatus {
    /// A truck was booked for the caller
    Available,
    /// The region has no truck left (or is not served at all)
    Unavailable,
}

impl LookupStatus {
    pub fn status(self) -> Status {
        match self {
            LookupStatus::Available => Status::Ok,
            LookupStatus::Unavailable => Status::ServiceUnavailable,
        }
    }

    /// Classify a response by its status code.
    ///
    /// Any 2xx code is a success and 503 means no capacity. Every other code
    /// is outside the contract and yields [`None`].
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            200..=299 => Some(LookupStatus::Available),
            503 => Some(LookupStatus::Unavailable),
            _ => None,
        }
    }
}
