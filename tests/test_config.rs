//! Integration tests for layered configuration loading.
//!
//! Settings load from `Config.toml` (absent here) with `CONCIERGE_`-prefixed
//! environment overrides taking precedence, matching the `config` crate's
//! standard layering.

use concierge_svc::config::Settings;
use std::env;
use std::sync::Mutex;

// `Settings::new()` reads process-wide environment state; serialize tests
// that mutate it so they don't race each other.
static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn defaults_load_without_any_environment_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    env::remove_var("CONCIERGE_BUNDLE_LIMIT");
    env::remove_var("CONCIERGE_WATCH_POLL_INTERVAL_SECONDS");

    let settings = Settings::new().expect("defaults should always be loadable");
    assert_eq!(settings.bundle_limit, 5);
    assert_eq!(settings.watch_poll_interval_seconds, 30);
}

#[test]
fn environment_override_takes_precedence_over_default() {
    let _guard = ENV_LOCK.lock().unwrap();
    env::set_var("CONCIERGE_BUNDLE_LIMIT", "3");

    let settings = Settings::new().expect("override should still be valid");
    assert_eq!(settings.bundle_limit, 3);

    env::remove_var("CONCIERGE_BUNDLE_LIMIT");
}

#[test]
fn bundle_limit_outside_one_to_ten_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    env::set_var("CONCIERGE_BUNDLE_LIMIT", "25");

    let result = Settings::new();
    assert!(result.is_err(), "bundle_limit=25 should fail validation");

    env::remove_var("CONCIERGE_BUNDLE_LIMIT");
}
