//! # Concierge
//!
//! An agentic travel concierge: composes flight, hotel, and car bundles
//! from live upstream search services and historical deal signal, keeps
//! a hot-cached Deal Cache fed by a message-bus ingestion pipeline, and
//! evaluates standing price watches against it.
//!
//! ## Architecture
//!
//! - **Bundle Engine** (`bundle_engine`): fans a shopping request out
//!   across flight/hotel/car search clients, enumerates candidate
//!   triples, scores them against budget and preferences, and returns
//!   the best-fitting bundles.
//! - **Deal Cache** (`deal_cache`, `cache`, `redis_manager`): the durable
//!   and hot-cached store of inbound deals, bundles, watches, and user
//!   preferences.
//! - **Deal Ingestion Pipeline** (`ingestion`): a five-stage worker
//!   (ingest, normalize, score, tag, persist & emit) that mines CSV
//!   datasets and the operational booking database for deals.
//! - **Watch Evaluator & Connection Registry** (`watch_evaluator`,
//!   `connection_registry`): matches standing watches against the
//!   current top deals and fans alerts out to connected clients.
//! - **Message Bus** (`bus`, `topics`): publishes and consumes
//!   `deal.events`, with idempotent topic provisioning.

/// Layered configuration loaded from `Config.toml` and `CONCIERGE_`-prefixed
/// environment variables.
pub mod config;
/// Narrow application error types for the few seams that need one.
pub mod errors;
/// Canonical data model: deals, bundles, watches, wire events.
pub mod models;

/// In-process + Redis-backed hot cache with TTL eviction.
pub mod cache;
/// Redis connection management (feature-gated).
pub mod redis_manager;

/// Retry policy built on `tokio-retry`, used at every upstream boundary.
pub mod retry;

/// Upstream flight/hotel/car search clients with deterministic fallbacks.
pub mod search_clients;

/// Natural-language travel intent extraction.
pub mod intent;

/// Composes and scores flight + hotel + car bundles.
pub mod bundle_engine;
/// Durable-store-backed deal/bundle/watch persistence, hot-cache accelerated.
pub mod deal_cache;
/// PostgreSQL connection and schema management.
pub mod db;
/// Metrics instrumentation (feature-gated, no-op otherwise).
pub mod metrics;

/// Message bus producer/consumer for `deal.events`.
pub mod bus;
/// Idempotent Kafka topic provisioning from a YAML manifest.
pub mod topics;

/// Registered duplex connections for server-pushed notifications.
pub mod connection_registry;
/// Standing-watch matching against the current top deals.
pub mod watch_evaluator;

/// The five-stage deal ingestion pipeline.
pub mod ingestion;

/// Transport-agnostic route handler logic.
pub mod api;
/// Dependency-injected application wiring.
pub mod context;

pub use bundle_engine::BundleEngine;
pub use config::Settings;
pub use context::AppContext;
pub use deal_cache::DealCache;
pub use watch_evaluator::WatchEvaluator;
