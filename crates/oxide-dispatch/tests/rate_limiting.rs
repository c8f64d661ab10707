//! Rate limiting through the dispatcher.

mod common;
use common::*;

use std::sync::Arc;
use std::thread;

use chrono::{Duration, TimeZone, Utc};
use oxide_dispatch::rate_limit::RateLimitRecord;
use oxide_dispatch::{
    FileStore, ManualClock, RateLimitStore, Request, Router, RouterConfig, RouterError,
};

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    ))
}

fn from(ip: &str, path: &str) -> Request {
    Request::get(path).with_client_ip(ip)
}

#[test]
fn requests_over_the_limit_get_429() {
    let clock = clock();
    let router = Router::builder()
        .get("/login", text("login"))
        .rate_limit("/login", 2, 1)
        .clock(clock.clone())
        .build()
        .unwrap();

    assert_eq!(router.handle(from("1.1.1.1", "/login")).status, 200);
    assert_eq!(router.handle(from("1.1.1.1", "/login")).status, 200);
    let limited = router.handle(from("1.1.1.1", "/login"));
    assert_eq!(limited.status, 429);
    assert_eq!(body(&limited), "Too Many Requests");

    // Each client has its own window.
    assert_eq!(router.handle(from("2.2.2.2", "/login")).status, 200);

    clock.advance(Duration::seconds(61));
    assert_eq!(router.handle(from("1.1.1.1", "/login")).status, 200);
}

#[test]
fn rules_only_apply_to_matching_paths() {
    let router = Router::builder()
        .get("/api/:any", text("api"))
        .get("/about", text("about"))
        .rate_limit("/api/:any", 1, 1)
        .clock(clock())
        .build()
        .unwrap();

    assert_eq!(router.handle(from("1.1.1.1", "/api/users")).status, 200);
    assert_eq!(router.handle(from("1.1.1.1", "/api/posts")).status, 429);
    for _ in 0..5 {
        assert_eq!(router.handle(from("1.1.1.1", "/about")).status, 200);
    }
}

#[test]
fn unmatched_requests_still_count() {
    let router = Router::builder()
        .rate_limit("/probe/:any", 1, 1)
        .clock(clock())
        .build()
        .unwrap();

    assert_eq!(router.handle(from("1.1.1.1", "/probe/a")).status, 404);
    assert_eq!(router.handle(from("1.1.1.1", "/probe/b")).status, 429);
}

#[test]
fn forwarded_for_identifies_clients_without_an_ip() {
    let router = Router::builder()
        .get("/", text("home"))
        .rate_limit("/", 1, 1)
        .clock(clock())
        .build()
        .unwrap();

    let proxied = |chain: &str| Request::get("/").header("X-Forwarded-For", chain);
    assert_eq!(router.handle(proxied("9.9.9.9, 10.0.0.1")).status, 200);
    assert_eq!(router.handle(proxied("9.9.9.9")).status, 429);
    assert_eq!(router.handle(proxied("8.8.8.8, 10.0.0.1")).status, 200);
}

#[test]
fn custom_429_handler() {
    let router = Router::builder()
        .get("/", text("home"))
        .rate_limit("/", 1, 1)
        .clock(clock())
        .error_handler(429, |_req, err| {
            oxide_dispatch::Response::error(429, format!("slow down ({err})"))
                .header("Retry-After", "60")
        })
        .build()
        .unwrap();

    router.handle(from("1.1.1.1", "/"));
    let res = router.handle(from("1.1.1.1", "/"));
    assert_eq!(res.status, 429);
    assert_eq!(res.get_header("Retry-After"), Some("60"));
    assert_eq!(body(&res), "slow down (rate limit exceeded for 1.1.1.1|/)");
}

#[test]
fn limits_persist_in_the_configured_directory() {
    let dir = tempfile::tempdir().unwrap();
    let config = RouterConfig {
        rate_limit_dir: Some(dir.path().to_path_buf()),
        ..RouterConfig::default()
    };
    let clock = clock();
    let build = || {
        Router::builder()
            .config(config.clone())
            .get("/login", text("login"))
            .rate_limit("/login", 1, 5)
            .clock(clock.clone())
            .build()
            .unwrap()
    };

    assert_eq!(build().handle(from("1.1.1.1", "/login")).status, 200);
    assert_eq!(build().handle(from("1.1.1.1", "/login")).status, 429);

    assert_eq!(FileStore::new(dir.path()).clear().unwrap(), 1);
    assert_eq!(build().handle(from("1.1.1.1", "/login")).status, 200);
}

struct BrokenStore;

impl RateLimitStore for BrokenStore {
    fn load(&self, _key: &str) -> oxide_dispatch::Result<RateLimitRecord> {
        Err(RouterError::Storage("disk full".to_string()))
    }

    fn save(&self, _record: &RateLimitRecord) -> oxide_dispatch::Result<()> {
        Err(RouterError::Storage("disk full".to_string()))
    }
}

#[test]
fn storage_failures_let_requests_through() {
    let router = Router::builder()
        .get("/", text("home"))
        .rate_limit("/", 1, 1)
        .rate_limit_store(Arc::new(BrokenStore))
        .build()
        .unwrap();

    for _ in 0..3 {
        assert_eq!(router.handle(from("1.1.1.1", "/")).status, 200);
    }
}

#[test]
fn concurrent_requests_respect_the_limit_exactly() {
    let router = Arc::new(
        Router::builder()
            .get("/api", text("api"))
            .rate_limit("/api", 20, 1)
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let router = Arc::clone(&router);
            thread::spawn(move || {
                (0..10)
                    .filter(|_| router.handle(from("1.1.1.1", "/api")).status == 200)
                    .count()
            })
        })
        .collect();
    let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(admitted, 20);
}

#[test]
fn windows_out_of_range_fail_the_build() {
    for minutes in [0, -1, 1_000_000_000_000] {
        let result = Router::builder()
            .get("/login", text("login"))
            .rate_limit("/login", 3, minutes)
            .build();
        assert!(
            matches!(result, Err(RouterError::InvalidPattern { .. })),
            "{minutes} minutes"
        );
    }

    let router = Router::builder()
        .get("/login", text("login"))
        .rate_limit("/login", 1, 366 * 24 * 60)
        .clock(clock())
        .build()
        .unwrap();
    assert_eq!(router.handle(from("1.1.1.1", "/login")).status, 200);
    assert_eq!(router.handle(from("1.1.1.1", "/login")).status, 429);
}
