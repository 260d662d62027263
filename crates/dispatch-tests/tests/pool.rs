use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use dispatch_core::{ConfigError, FleetConfig, RegionSpec};
use dispatch_fleet::{Allocation, RegionPool};

fn pool(regions: &[(&str, u32)]) -> RegionPool {
    let specs: Vec<_> = regions
        .iter()
        .map(|(name, capacity)| RegionSpec::new(*name, *capacity))
        .collect();
    RegionPool::new(&specs).unwrap()
}

/// Run `callers` concurrent allocations on `region`, returning how many
/// succeeded
fn allocate_concurrently(pool: &Arc<RegionPool>, region: &'static str, callers: usize) -> usize {
    let barrier = Arc::new(Barrier::new(callers));
    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let (pool, barrier) = (pool.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                pool.try_allocate(region)
            })
        })
        .collect();
    handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(Allocation::is_granted)
        .count()
}

#[test]
#[ntest::timeout(10_000)]
fn south_west_serves_three_then_restocks() {
    let pool = Arc::new(pool(&[("south-west", 3)]));

    assert_eq!(allocate_concurrently(&pool, "south-west", 3), 3);
    assert_eq!(pool.try_allocate("south-west"), Allocation::Exhausted);
    assert_eq!(pool.available("south-west"), Some(0));

    assert_eq!(pool.replenish_all(), 3);
    assert!(pool.try_allocate("south-west").is_granted());
}

#[test]
#[ntest::timeout(10_000)]
fn fourth_concurrent_caller_fails() {
    let pool = Arc::new(pool(&[("south-west", 3)]));
    assert_eq!(allocate_concurrently(&pool, "south-west", 4), 3);
    assert_eq!(pool.available("south-west"), Some(0));
}

#[test]
#[ntest::timeout(10_000)]
fn no_over_allocation_under_contention() {
    let pool = Arc::new(pool(&[("north-east", 100)]));
    let handles: Vec<_> = (0..16)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || {
                (0..20)
                    .filter(|_| pool.try_allocate("north-east").is_granted())
                    .count()
            })
        })
        .collect();
    let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(granted, 100);
    assert_eq!(pool.available("north-east"), Some(0));
}

#[test]
#[ntest::timeout(10_000)]
fn capacity_stays_in_bounds_while_restocking() {
    const MAX: u32 = 5;
    let pool = Arc::new(pool(&[("south-east", MAX)]));
    let stop = Arc::new(AtomicBool::new(false));
    let restocks = Arc::new(AtomicU32::new(0));

    let restocker = thread::spawn({
        let (pool, stop, restocks) = (pool.clone(), stop.clone(), restocks.clone());
        move || {
            while !stop.load(Ordering::Relaxed) {
                pool.replenish_all();
                restocks.fetch_add(1, Ordering::Relaxed);
                thread::sleep(Duration::from_micros(200));
            }
        }
    });
    let observer = thread::spawn({
        let (pool, stop) = (pool.clone(), stop.clone());
        move || {
            while !stop.load(Ordering::Relaxed) {
                let available = pool.available("south-east").unwrap();
                assert!(available <= MAX, "{available} units in a region of {MAX}");
            }
        }
    });
    let allocators: Vec<_> = (0..8)
        .map(|_| {
            let pool = pool.clone();
            thread::spawn(move || {
                (0..2_000)
                    .filter(|_| pool.try_allocate("south-east").is_granted())
                    .count() as u32
            })
        })
        .collect();

    let granted: u32 = allocators.into_iter().map(|h| h.join().unwrap()).sum();
    stop.store(true, Ordering::Relaxed);
    restocker.join().unwrap();
    observer.join().unwrap();

    // Every restock adds at most MAX units on top of the initial stock.
    let restocks = restocks.load(Ordering::Relaxed);
    assert!(granted <= MAX * (restocks + 1));
    assert!(pool.available("south-east").unwrap() <= MAX);
}

#[test]
#[ntest::timeout(10_000)]
fn replenishing_a_full_pool_changes_nothing() {
    let pool = pool(&[("north-east", 20), ("south-east", 40)]);
    assert_eq!(pool.replenish_all(), 0);
    assert_eq!(pool.available("north-east"), Some(20));
    assert_eq!(pool.available("south-east"), Some(40));
}

#[test]
#[ntest::timeout(10_000)]
fn replenish_never_exceeds_maximum() {
    let pool = pool(&[("north-east", 2)]);
    pool.try_allocate("north-east");
    assert_eq!(pool.replenish_all(), 1);
    assert_eq!(pool.replenish_all(), 0);
    assert_eq!(pool.available("north-east"), pool.maximum("north-east"));
}

#[test]
#[ntest::timeout(10_000)]
fn regions_are_independent() {
    let pool = pool(&[("north-east", 1), ("south-east", 1)]);
    assert!(pool.try_allocate("north-east").is_granted());
    assert_eq!(pool.try_allocate("north-east"), Allocation::Exhausted);
    assert_eq!(
        pool.try_allocate("south-east"),
        Allocation::Granted { remaining: 0 }
    );
}

#[test]
#[ntest::timeout(10_000)]
fn unknown_region_is_reported_separately() {
    let pool = pool(&[("south-west", 3)]);
    assert_eq!(pool.try_allocate("north-west"), Allocation::UnknownRegion);
    // Region names are case-sensitive.
    assert_eq!(pool.try_allocate("South-West"), Allocation::UnknownRegion);
    assert_eq!(pool.available("north-west"), None);
    assert_eq!(pool.regions(), vec![String::from("south-west")]);
}

#[test]
fn invalid_regions_are_rejected() {
    assert!(matches!(
        RegionPool::new(&[RegionSpec::new("north-east", 0)]),
        Err(ConfigError::ZeroCapacity(name)) if name == "north-east"
    ));
    assert!(matches!(
        RegionPool::new(&[RegionSpec::new("a", 1), RegionSpec::new("a", 2)]),
        Err(ConfigError::DuplicateRegion(name)) if name == "a"
    ));
    assert!(matches!(
        RegionPool::new(&[RegionSpec::new("", 1)]),
        Err(ConfigError::EmptyRegionName)
    ));
}

#[test]
#[ntest::timeout(10_000)]
fn replenisher_restocks_in_the_background() {
    let config = FleetConfig {
        regions: vec![RegionSpec::new("south-west", 2)],
        replenish_interval_ms: 50,
    };
    let fleet = dispatch_fleet::launch(&config).unwrap();

    // The replenisher may fire in between, so drain until empty.
    while fleet.allocate("south-west").is_granted() {}

    thread::sleep(Duration::from_millis(300));
    assert_eq!(fleet.available("south-west"), Some(2));

    dispatch_core::RequestHandler::shutdown(fleet);
}

#[test]
fn launch_rejects_zero_interval() {
    let config = FleetConfig {
        replenish_interval_ms: 0,
        ..FleetConfig::default()
    };
    assert!(matches!(
        dispatch_fleet::launch(&config),
        Err(dispatch_fleet::LaunchError::Config(ConfigError::ZeroInterval))
    ));
}
