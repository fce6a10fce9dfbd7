//! Dependency-injected application wiring: one place that builds every
//! long-lived collaborator from `Settings` and hands back a cloneable
//! handle, rather than relying on any global/singleton state.

use crate::bundle_engine::BundleEngine;
use crate::bus::DealEventProducer;
use crate::cache::HotCache;
use crate::config::Settings;
use crate::connection_registry::ConnectionRegistry;
use crate::db::{self, DbPool};
use crate::deal_cache::DealCache;
use crate::intent::HttpIntentExtractor;
use crate::search_clients::{CarSearchClient, FlightSearchClient, HotelSearchClient};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Everything the `/concierge/*` handlers need, built once at startup.
#[derive(Clone)]
pub struct AppContext {
    pub settings: Settings,
    pub db: DbPool,
    pub deal_cache: DealCache,
    pub bundle_engine: Arc<BundleEngine>,
    pub intent_extractor: Arc<HttpIntentExtractor>,
    pub registry: Arc<ConnectionRegistry>,
    pub producer: Arc<DealEventProducer>,
}

impl AppContext {
    pub async fn bootstrap(settings: Settings) -> Result<Self> {
        let db = db::connect(&settings.database_url, settings.db_max_connections).await?;
        let hot_cache = Self::build_hot_cache(&settings).await;
        let deal_cache = DealCache::new(db.clone(), hot_cache.clone());

        let http = reqwest::Client::new();
        let timeout = Duration::from_secs(settings.request_timeout_seconds);
        let flights = FlightSearchClient::new(http.clone(), settings.flights_service_url.clone(), timeout);
        let hotels = HotelSearchClient::new(http.clone(), settings.hotels_service_url.clone(), timeout);
        let cars = CarSearchClient::new(http.clone(), settings.cars_service_url.clone(), timeout);
        let bundle_engine = BundleEngine::new(
            flights,
            hotels,
            cars,
            deal_cache.clone(),
            hot_cache,
            settings.bundle_limit,
        );

        let intent_extractor =
            HttpIntentExtractor::new(http, settings.ollama_url.clone(), settings.ollama_model.clone());

        let producer = DealEventProducer::new(&settings.kafka_bootstrap_servers, settings.kafka_deal_topic.clone())?;

        Ok(Self {
            settings,
            db,
            deal_cache,
            bundle_engine: Arc::new(bundle_engine),
            intent_extractor: Arc::new(intent_extractor),
            registry: Arc::new(ConnectionRegistry::new()),
            producer: Arc::new(producer),
        })
    }

    #[cfg(feature = "redis")]
    async fn build_hot_cache(settings: &Settings) -> HotCache {
        use crate::redis_manager::{RedisConfig, RedisManager};

        let config = RedisConfig {
            url: settings.redis_url.clone(),
        };
        match RedisManager::new(config).await {
            Ok(manager) => HotCache::new(settings.hot_cache_size).with_redis(manager),
            Err(e) => {
                log::warn!("redis unavailable at startup, running on in-process cache only: {}", e);
                HotCache::new(settings.hot_cache_size)
            }
        }
    }

    #[cfg(not(feature = "redis"))]
    async fn build_hot_cache(settings: &Settings) -> HotCache {
        HotCache::new(settings.hot_cache_size)
    }
}
