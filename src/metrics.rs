// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! gauge {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! histogram {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_gauge {
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_histogram {
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
use crate::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Registers metric descriptions; call once at process startup.
pub fn describe_metrics() {
    describe_counter!("bundle_generate_total", "Bundle generation requests, labeled by outcome.");
    describe_histogram!("bundle_generate_duration_seconds", "Bundle generation wall time.");
    describe_counter!("cache_hits_total", "Hot cache hits, labeled by cache name.");
    describe_counter!("cache_miss_total", "Hot cache misses, labeled by cache name.");
    describe_counter!("watch_trigger_total", "Watches triggered by the evaluator loop.");
    describe_counter!("watch_evaluator_tick_errors_total", "Watch evaluator ticks that errored.");
    describe_counter!("bus_publish_total", "Deal events published to the message bus.");
    describe_counter!("bus_consume_errors_total", "Deal event messages skipped due to errors.");
    describe_gauge!("ingestion_pipeline_deals_processed", "Deals processed in the last ingestion tick.");
}

pub fn increment_cache_hit(cache_name: &str) {
    counter!("cache_hits_total", 1, "cache" => cache_name.to_string());
}

pub fn increment_cache_miss(cache_name: &str) {
    counter!("cache_miss_total", 1, "cache" => cache_name.to_string());
}

pub fn increment_bundle_generate(outcome: &str) {
    counter!("bundle_generate_total", 1, "outcome" => outcome.to_string());
}

pub fn record_bundle_generate_duration(duration: std::time::Duration) {
    histogram!("bundle_generate_duration_seconds", duration.as_secs_f64());
}

pub fn increment_watch_trigger() {
    counter!("watch_trigger_total", 1);
}

pub fn increment_watch_evaluator_tick_error() {
    counter!("watch_evaluator_tick_errors_total", 1);
}

pub fn increment_bus_publish(topic: &str) {
    counter!("bus_publish_total", 1, "topic" => topic.to_string());
}

pub fn increment_bus_consume_error(topic: &str) {
    counter!("bus_consume_errors_total", 1, "topic" => topic.to_string());
}

pub fn set_ingestion_deals_processed(count: f64) {
    gauge!("ingestion_pipeline_deals_processed", count);
}
