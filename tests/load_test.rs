//! Load testing for the admission gate.

use std::time::{Duration, Instant};

use axum::{routing::get, Router};
use ordnung_gate::{AppState, GateConfig};

mod common;

fn app() -> Router<AppState> {
    Router::new().route("/api/items", get(|| async { "items" }))
}

#[tokio::test]
async fn test_single_client_never_over_admitted_under_concurrency() {
    let mut config = GateConfig::default();
    config.rate_limit.calls = 50;
    let gate = common::start_gate(config, app()).await;

    let concurrency = 20;
    let requests_per_task = 10;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let mut handles = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = gate.url("/api/items");
        handles.push(tokio::spawn(async move {
            let mut admitted = 0;
            let mut rejected = 0;
            for _ in 0..requests_per_task {
                let res = client
                    .get(&url)
                    .header("x-forwarded-for", "203.0.113.50")
                    .send()
                    .await
                    .unwrap();
                match res.status().as_u16() {
                    200 => admitted += 1,
                    429 => rejected += 1,
                    other => panic!("unexpected status {}", other),
                }
            }
            (admitted, rejected)
        }));
    }

    let mut admitted = 0;
    let mut rejected = 0;
    for handle in handles {
        let (a, r) = handle.await.unwrap();
        admitted += a;
        rejected += r;
    }

    assert_eq!(admitted, 50);
    assert_eq!(rejected, concurrency * requests_per_task - 50);
}

#[tokio::test]
async fn test_load_performance() {
    let mut config = GateConfig::default();
    config.rate_limit.calls = 1_000_000;
    let gate = common::start_gate(config, app()).await;

    // Reduced for consistency in debug mode
    let concurrency = 20;
    let requests_per_task = 50;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let start = Instant::now();

    let mut handles = Vec::new();
    for task in 0..concurrency {
        let client = client.clone();
        let url = gate.url("/api/items");
        handles.push(tokio::spawn(async move {
            let ip = format!("198.51.100.{}", task);
            for _ in 0..requests_per_task {
                let res = client
                    .get(&url)
                    .header("x-forwarded-for", ip.as_str())
                    .send()
                    .await
                    .unwrap();
                assert_eq!(res.status(), 200);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let elapsed = start.elapsed();
    let rps = total_requests as f64 / elapsed.as_secs_f64();
    println!("{} requests in {:?} ({:.0} req/s)", total_requests, elapsed, rps);

    assert!(elapsed < Duration::from_secs(30), "Load test took too long: {:?}", elapsed);
    assert_eq!(gate.state.limiter.snapshot().general_clients, concurrency);
}
