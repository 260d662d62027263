use std::net::TcpListener;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use dispatch_core::{CallerContext, DelaySpec, Gate, GateError};
use dispatch_customer::{
    CustomerError, CustomerService, Database, HttpTruckLookup, TruckAvailability, TruckError,
    TruckLookup, TruckOutcome,
};
use dispatch_tests::TestCtxBuilder;
use eyre::Result;
use reqwest::Method;
use uuid::Uuid;

mod util;
use util::{closed_addr, customer_service, FixedTrucks};

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(20_000)]
async fn customer_gets_truck_until_region_runs_dry() -> Result<()> {
    let ctx = TestCtxBuilder::new()
        .with_regions(&[("south-west", 1)])
        .build()
        .await?;

    let response = ctx.api.customer("392").await?;
    assert_eq!(response.status, 200);
    let body = response.json()?;
    assert_eq!(body["id"], "392");
    assert_eq!(body["name"], "Worrels Esports Supplies");
    assert_eq!(body["location"], "CA");
    assert_eq!(body["region"], "south-west");
    assert_eq!(body["truck"], "available");

    let response = ctx.api.customer("392").await?;
    assert_eq!(response.status, 200);
    assert_eq!(response.json()?["truck"], "unavailable");

    // Regions the fleet does not serve look the same to the customer.
    let response = ctx.api.customer("731").await?;
    assert_eq!(response.status, 200);
    assert_eq!(response.json()?["truck"], "unavailable");

    ctx.finish().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(20_000)]
async fn unknown_customer_and_missing_parameter() -> Result<()> {
    let ctx = TestCtxBuilder::new().build().await?;

    assert_eq!(ctx.api.customer("999").await?.status, 404);
    assert_eq!(ctx.api.customer_raw(Method::GET, "/customer").await?.status, 400);
    assert_eq!(
        ctx.api.customer_raw(Method::GET, "/customer?customer=").await?.status,
        400
    );
    // Nothing was booked on the way.
    assert_eq!(ctx.fleet().available("south-west"), Some(3));

    ctx.finish().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(20_000)]
async fn busy_record_store_answers_gateway_timeout() -> Result<()> {
    let ctx = TestCtxBuilder::new().with_gate_timeout(50).build().await?;

    let guard = ctx
        .customer()
        .database()
        .gate()
        .acquire(&CallerContext::new(Uuid::new_v4()))?;
    let response = ctx.api.customer("392").await?;
    assert_eq!(response.status, 504);
    drop(guard);

    assert_eq!(ctx.api.customer("392").await?.status, 200);

    ctx.finish().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
#[ntest::timeout(20_000)]
async fn fleet_client_books_over_http() -> Result<()> {
    let ctx = TestCtxBuilder::new().build().await?;
    let url = ctx.api.fleet_url().to_string();

    let answer = tokio::task::spawn_blocking(move || -> Result<_> {
        let trucks = HttpTruckLookup::new(&url, Duration::from_secs(1))?;
        Ok(trucks.find_truck(Uuid::new_v4(), "south-west")?)
    })
    .await??;
    assert_eq!(answer, TruckAvailability::Available);
    assert_eq!(ctx.fleet().available("south-west"), Some(2));

    ctx.finish().await;
    Ok(())
}

#[test]
#[ntest::timeout(10_000)]
fn unreachable_fleet_is_a_transport_error() {
    let trucks =
        HttpTruckLookup::new(&format!("http://{}", closed_addr()), Duration::from_secs(1)).unwrap();
    match trucks.find_truck(Uuid::new_v4(), "south-west") {
        Err(TruckError::Transport(_)) => {}
        other => panic!("expected a transport error, got {other:?}"),
    }
}

#[test]
#[ntest::timeout(10_000)]
fn silent_fleet_is_a_timeout() {
    // Connections are accepted by the kernel, but never answered.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let timeout = Duration::from_millis(200);
    let trucks = HttpTruckLookup::new(&url, timeout).unwrap();

    let started = Instant::now();
    match trucks.find_truck(Uuid::new_v4(), "south-west") {
        Err(TruckError::Timeout(waited)) => assert_eq!(waited, timeout),
        other => panic!("expected a timeout, got {other:?}"),
    }
    assert!(started.elapsed() >= timeout);
    drop(listener);
}

#[test]
#[ntest::timeout(10_000)]
fn non_lookup_answer_is_an_unexpected_status() {
    // The customer service does not serve lookups and answers 404.
    let server = dispatch_server::serve(
        customer_service(true, DelaySpec::ZERO, None),
        "127.0.0.1:0",
        2,
    )
    .unwrap();
    let trucks = HttpTruckLookup::new(&server.url(), Duration::from_secs(1)).unwrap();

    match trucks.find_truck(Uuid::new_v4(), "south-west") {
        Err(TruckError::UnexpectedStatus(404)) => {}
        other => panic!("expected status 404, got {other:?}"),
    }
    drop(trucks);
    server.shutdown();
}

#[test]
fn lookup_url_keeps_the_base_path() {
    let trucks = HttpTruckLookup::new("http://fleet:8087/api/", Duration::from_secs(1)).unwrap();
    assert_eq!(
        trucks.lookup_url("north west").as_str(),
        "http://fleet:8087/api/lookup/north%20west"
    );
    let trucks = HttpTruckLookup::new("http://fleet:8087", Duration::from_secs(1)).unwrap();
    assert_eq!(
        trucks.lookup_url("a/b").as_str(),
        "http://fleet:8087/lookup/a%2Fb"
    );
}

#[test]
fn no_capacity_is_not_an_error() {
    let service = CustomerService::new(
        Database::new(Gate::new(true), DelaySpec::ZERO),
        Box::new(FixedTrucks(TruckAvailability::NoCapacity)),
        None,
    );
    let dispatch = service.dispatch(Uuid::new_v4(), "123").unwrap();
    assert!(matches!(dispatch.truck, TruckOutcome::NoCapacity));
    assert_eq!(dispatch.truck.label(), "unavailable");
    assert_eq!(dispatch.customer.region, "north-west");

    let unreachable = TruckOutcome::from(Err::<TruckAvailability, _>(TruckError::UnexpectedStatus(500)));
    assert!(matches!(unreachable, TruckOutcome::Unreachable(_)));
    assert_eq!(unreachable.label(), "unavailable");
}

#[test]
#[ntest::timeout(10_000)]
fn contention_is_reported_after_the_gate_timeout() {
    let service = customer_service(true, DelaySpec::ZERO, Some(Duration::from_millis(50)));
    let _guard = service
        .database()
        .gate()
        .acquire(&CallerContext::new(Uuid::new_v4()))
        .unwrap();

    match service.dispatch(Uuid::new_v4(), "123") {
        Err(CustomerError::Contention(GateError::Timeout(_))) => {}
        other => panic!("expected contention, got {other:?}"),
    }
    assert_eq!(service.database().gate().waiting(), 0);
}

#[test]
#[ntest::timeout(10_000)]
fn unknown_customer_still_goes_through_the_gate() {
    let service = customer_service(true, DelaySpec::from_millis(20, 0), None);
    let started = Instant::now();
    assert!(matches!(
        service.dispatch(Uuid::new_v4(), "000"),
        Err(CustomerError::UnknownCustomer(id)) if id == "000"
    ));
    assert!(started.elapsed() >= Duration::from_millis(20));
    assert!(!service.database().gate().is_held());
}

/// Time `callers` concurrent lookups of customer 567
fn concurrent_dispatch(service: CustomerService, callers: usize) -> Duration {
    let service = Arc::new(service);
    let barrier = Arc::new(Barrier::new(callers));
    let started = Instant::now();
    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let (service, barrier) = (service.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                service.dispatch(Uuid::new_v4(), "567").unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    started.elapsed()
}

#[test]
#[ntest::timeout(10_000)]
fn gate_serializes_customer_queries() {
    const CALLERS: usize = 4;
    let delay = DelaySpec::from_millis(100, 0);

    let serialized = concurrent_dispatch(customer_service(true, delay, None), CALLERS);
    assert!(serialized >= Duration::from_millis(100) * CALLERS as u32);

    let concurrent = concurrent_dispatch(customer_service(false, delay, None), CALLERS);
    assert!(concurrent < serialized, "{concurrent:?} vs {serialized:?}");
}
