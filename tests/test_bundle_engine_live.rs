//! End-to-end bundle generation against a live Postgres instance.
//!
//! Requires `CONCIERGE_DATABASE_URL` to point at a reachable database;
//! skipped otherwise. Run with `cargo test -- --ignored` once a database
//! is available.

use chrono::Duration;
use concierge_svc::cache::HotCache;
use concierge_svc::config::Settings;
use concierge_svc::db;
use concierge_svc::deal_cache::DealCache;
use concierge_svc::models::{BundleRequest, WatchRequestCreate};

async fn connect_or_skip() -> Option<db::DbPool> {
    let settings = Settings::new().ok()?;
    db::connect(&settings.database_url, 2).await.ok()
}

#[tokio::test]
#[ignore] // requires a running Postgres instance
async fn bundle_request_round_trips_through_hot_cache_and_store() {
    let Some(pool) = connect_or_skip().await else {
        return;
    };
    let deal_cache = DealCache::new(pool, HotCache::new(64));

    let watch = deal_cache
        .create_watch(WatchRequestCreate {
            user_id: "integration-test-user".to_string(),
            destination: "LAX".to_string(),
            budget_ceiling: 500.0,
            min_fit_score: 60.0,
            notify_on_inventory_below: Some(5),
        })
        .await
        .expect("watch creation should succeed against a live database");

    assert_eq!(watch.destination, "LAX");
    assert!(watch.active);

    let active = deal_cache.active_watches().await.expect("active watches should be readable");
    assert!(active.iter().any(|w| w.watch_id == watch.watch_id));

    deal_cache
        .deactivate_watches(&[watch.watch_id.clone()])
        .await
        .expect("deactivation should succeed");
}

#[test]
fn bundle_request_nights_fallback_matches_three_day_default() {
    let request = BundleRequest {
        origin: Some("JFK".to_string()),
        destination: "LAX".to_string(),
        departure_date: chrono::Utc::now(),
        return_date: None,
        budget: 1500.0,
        preferences: Default::default(),
        constraints: Default::default(),
    };
    assert_eq!(request.nights(), 3);
    assert_eq!(
        request.effective_return_date(),
        request.departure_date + Duration::days(3)
    );
}
