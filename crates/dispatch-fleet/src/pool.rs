//! Implementation of the regional truck pool

use dashmap::DashMap;
use dispatch_core::{validate_regions, ConfigError, RegionSpec};
use tracing::info;

/// Available and maximum units of one region
///
/// `0 <= current <= maximum` holds whenever the region's map entry is not
/// locked.
#[derive(Clone, Copy, Debug)]
struct RegionCapacity {
    current: u32,
    maximum: u32,
}

/// Outcome of [`RegionPool::try_allocate`]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Allocation {
    /// One unit was taken, `remaining` are left in the region
    Granted { remaining: u32 },
    /// The region exists but has no unit left until the next restock
    Exhausted,
    /// The region was never configured
    UnknownRegion,
}

impl Allocation {
    pub fn is_granted(&self) -> bool {
        matches!(self, Allocation::Granted { .. })
    }
}

/// Trucks available per region
///
/// Every region lives in its own map entry; allocation and restocking lock
/// only the entry they touch, so different regions never wait on each other.
pub struct RegionPool {
    regions: DashMap<String, RegionCapacity>,
}

impl RegionPool {
    /// Create a new [`RegionPool`] with every region fully stocked.
    pub fn new(regions: &[RegionSpec]) -> Result<Self, ConfigError> {
        validate_regions(regions)?;
        let map = DashMap::with_capacity(regions.len());
        for region in regions {
            map.insert(
                region.name.clone(),
                RegionCapacity {
                    current: region.capacity,
                    maximum: region.capacity,
                },
            );
        }
        Ok(Self { regions: map })
    }

    /// Take one unit from `region` if it has any left.
    pub fn try_allocate(&self, region: &str) -> Allocation {
        let Some(mut slot) = self.regions.get_mut(region) else {
            return Allocation::UnknownRegion;
        };
        if slot.current == 0 {
            return Allocation::Exhausted;
        }
        slot.current -= 1;
        Allocation::Granted {
            remaining: slot.current,
        }
    }

    /// Restock every region to its maximum.
    ///
    /// Returns the number of units added over all regions.
    pub fn replenish_all(&self) -> u32 {
        let mut total = 0;
        for name in self.regions() {
            let Some(mut slot) = self.regions.get_mut(&name) else {
                continue;
            };
            let shipped = slot.maximum - slot.current;
            slot.current = slot.maximum;
            drop(slot);

            if shipped > 0 {
                info!(region = %name, shipped, "restocked region");
                total += shipped;
            }
        }
        total
    }

    /// Get the number of units currently available in `region`.
    pub fn available(&self, region: &str) -> Option<u32> {
        self.regions.get(region).map(|slot| slot.current)
    }

    /// Get the number of units `region` is restocked to.
    pub fn maximum(&self, region: &str) -> Option<u32> {
        self.regions.get(region).map(|slot| slot.maximum)
    }

    /// Names of all configured regions, sorted
    pub fn regions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.regions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
