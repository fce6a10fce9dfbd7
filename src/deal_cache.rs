//! Durable-store-backed deal/bundle/watch operations, accelerated by the
//! hot cache. Consistency model: single-row atomic writes, no
//! read-your-writes guarantee across the hot cache and the durable store
//! — the hot cache is a reconstructable accelerator, never the source of
//! truth.

use crate::cache::HotCache;
use crate::db::{self, DbPool};
use crate::models::{Bundle, BundleResponse, Deal, DealEvent, Price, UserPreference, Watch, WatchRequestCreate};
use anyhow::Result;
use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone)]
pub struct DealCache {
    db: DbPool,
    hot_cache: HotCache,
}

impl DealCache {
    pub fn new(db: DbPool, hot_cache: HotCache) -> Self {
        Self { db, hot_cache }
    }

    pub fn db(&self) -> &DbPool {
        &self.db
    }

    /// Applies an inbound bus event as a get-or-insert-by-PK upsert,
    /// stamping `updated_at = now()` on update.
    pub async fn upsert_deal_event(&self, event: DealEvent) -> Result<()> {
        let raw_payload = serde_json::to_value(&event).unwrap_or(serde_json::Value::Null);
        let deal = Deal {
            deal_id: event.deal_id,
            kind: event.kind,
            destination: event.destination,
            summary: event.summary,
            price: Price::new(event.price.original, event.price.deal),
            score: event.score.clamp(0.0, 100.0),
            tags: event.tags.into_iter().collect(),
            inventory: event.inventory,
            valid_until: event.valid_until,
            route: event.route,
            raw_payload,
            updated_at: Utc::now(),
        };
        db::upsert_deal(&self.db, &deal).await
    }

    pub async fn top_deals(&self, destination: Option<&str>, limit: i64) -> Result<Vec<Deal>> {
        db::top_deals(&self.db, destination, limit).await
    }

    /// Writes the full bundle response to the hot cache under
    /// `bundles:{user_id}:{search_id}` (15-minute TTL) and persists each
    /// bundle row. Best-effort: failures are logged, never propagated to
    /// the caller of `generate`.
    pub async fn cache_bundles(&self, user_id: &str, search_id: &str, response: &BundleResponse) {
        for bundle in &response.bundles {
            if let Err(e) = db::insert_bundle(&self.db, bundle, user_id, search_id).await {
                log::warn!("failed to persist bundle {}: {}", bundle.bundle_id, e);
            }
        }
        let key = format!("bundles:{}:{}", user_id, search_id);
        if let Err(e) = self.hot_cache.set(&key, response, Duration::from_secs(900)).await {
            log::debug!("failed to cache bundles for user {}: {}", user_id, e);
        }
    }

    /// Reads the most recent bundles for a user. Checks the hot cache
    /// first under the `bundles:{user_id}:*` pattern; falls back to the
    /// durable store (ordered by creation time desc) when nothing is
    /// resident there, e.g. after a restart or TTL expiry.
    pub async fn bundles_for_user(&self, user_id: &str, limit: i64) -> Result<Vec<Bundle>> {
        let cached: Vec<BundleResponse> = self.hot_cache.scan_prefix(&format!("bundles:{}:", user_id)).await;
        if !cached.is_empty() {
            let mut bundles: Vec<Bundle> = cached.into_iter().flat_map(|r| r.bundles).collect();
            bundles.truncate(limit.max(0) as usize);
            return Ok(bundles);
        }
        db::bundles_for_user(&self.db, user_id, limit).await
    }

    pub async fn create_watch(&self, request: WatchRequestCreate) -> Result<Watch> {
        let watch = Watch {
            watch_id: Uuid::new_v4().simple().to_string(),
            user_id: request.user_id,
            destination: request.destination,
            budget_ceiling: request.budget_ceiling,
            min_fit_score: request.min_fit_score,
            notify_on_inventory_below: request.notify_on_inventory_below,
            active: true,
            created_at: Utc::now(),
            last_triggered_at: None,
        };
        db::insert_watch(&self.db, &watch).await?;
        Ok(watch)
    }

    pub async fn active_watches(&self) -> Result<Vec<Watch>> {
        db::active_watches(&self.db).await
    }

    pub async fn deactivate_watches(&self, watch_ids: &[String]) -> Result<()> {
        db::deactivate_watches(&self.db, watch_ids, Utc::now()).await
    }

    pub async fn upsert_user_preference(&self, pref: &UserPreference) -> Result<()> {
        db::upsert_user_preference(&self.db, pref).await
    }

    pub async fn get_user_preference(&self, user_id: &str) -> Result<Option<UserPreference>> {
        db::get_user_preference(&self.db, user_id).await
    }
}
