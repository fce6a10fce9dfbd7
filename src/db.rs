//! PostgreSQL durable store: connection pooling, idempotent schema
//! bootstrap, and the four tables backing the bundle/deal/watch/preference
//! surfaces.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, Connection, Pool, Postgres, Row};
use std::env;
use std::time::Duration;

use crate::models::{Bundle, Deal, DealKind, Price, UserPreference, Watch};

pub type DbPool = Pool<Postgres>;

/// Database schema name; every query is built with `{}.table` via `SCHEMA`
/// rather than `sqlx::query!`, since this crate does not rely on a
/// compile-time-checked `DATABASE_URL`.
pub const SCHEMA: &str = "concierge";

/// Connects with retry (10 attempts, capped exponential backoff) and runs
/// the idempotent schema bootstrap, mirroring the durable-store connect
/// path used elsewhere in this codebase.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<DbPool> {
    let mut last_err: Option<anyhow::Error> = None;
    let max_attempts: u32 = 10;

    for attempt in 1..=max_attempts {
        match PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                log::info!(
                    "connected to durable store (attempt {}/{})",
                    attempt,
                    max_attempts
                );
                match initialize_schema(&pool).await {
                    Ok(()) => return Ok(pool),
                    Err(e) => last_err = Some(e),
                }
            }
            Err(e) => last_err = Some(e.into()),
        }

        let delay_ms = (1u64 << attempt.min(6)) * 200;
        log::warn!(
            "db connect/init attempt {}/{} failed, retrying in {}ms",
            attempt,
            max_attempts,
            delay_ms
        );
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("unknown durable store connection error")))
}

/// Creates the schema and tables if missing. Safe to call on every
/// startup: every statement is `IF NOT EXISTS`/idempotent, guarded by a
/// Postgres advisory lock so concurrent process starts don't race.
pub async fn initialize_schema(pool: &DbPool) -> Result<()> {
    const MIGRATION_LOCK_ID: i64 = 0x434F4E434945524745; // "CONCIERGE" truncated to i64

    let mut conn = pool.acquire().await?;
    let mut tx = conn.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(MIGRATION_LOCK_ID)
        .execute(tx.as_mut())
        .await?;

    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", SCHEMA))
        .execute(tx.as_mut())
        .await?;

    sqlx::query("CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\"")
        .execute(tx.as_mut())
        .await
        .ok();

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {schema}.bundles (
            bundle_id TEXT PRIMARY KEY,
            user_id TEXT,
            search_id TEXT,
            destination TEXT NOT NULL,
            total_price DOUBLE PRECISION NOT NULL,
            savings DOUBLE PRECISION NOT NULL,
            fit_score DOUBLE PRECISION NOT NULL,
            explanation TEXT NOT NULL,
            valid_until TIMESTAMPTZ NOT NULL,
            components JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
        schema = SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_bundles_user_id ON {schema}.bundles (user_id)",
        schema = SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {schema}.cached_deals (
            deal_id TEXT NOT NULL,
            type TEXT NOT NULL,
            destination TEXT NOT NULL,
            route TEXT,
            price_value DOUBLE PRECISION NOT NULL,
            score DOUBLE PRECISION NOT NULL,
            valid_until TIMESTAMPTZ NOT NULL,
            payload JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (deal_id, type)
        )",
        schema = SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_cached_deals_destination_score \
         ON {schema}.cached_deals (destination, score DESC)",
        schema = SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {schema}.watch_requests (
            watch_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            destination TEXT NOT NULL,
            budget_ceiling DOUBLE PRECISION NOT NULL,
            min_fit_score DOUBLE PRECISION NOT NULL DEFAULT 60,
            notify_on_inventory_below INTEGER,
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            last_triggered_at TIMESTAMPTZ
        )",
        schema = SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_watch_requests_active_destination \
         ON {schema}.watch_requests (active, destination)",
        schema = SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {schema}.user_preferences (
            user_id TEXT PRIMARY KEY,
            destination TEXT,
            preferences JSONB NOT NULL DEFAULT '{{}}'::jsonb,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
        schema = SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    // Archival analytics sink for the ingestion pipeline, distinct from
    // `cached_deals` (which the concierge side populates by consuming
    // `deal.events`). Keyed by (reference_id, type) so re-running a tick
    // with identical inputs upserts the same row rather than appending.
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {schema}.deals_analytics (
            reference_id TEXT NOT NULL,
            type TEXT NOT NULL,
            document JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (reference_id, type)
        )",
        schema = SCHEMA
    ))
    .execute(tx.as_mut())
    .await?;

    tx.commit().await?;
    log::info!("durable store schema ready");
    Ok(())
}

/// The `payload` JSONB column carries the full normalized deal document
/// (summary, tags, inventory, price, and the opaque `raw_payload` nested
/// under its own key) — not just the opaque inbound event — so every
/// field on [`Deal`] survives a write/read round-trip through the
/// durable store.
fn deal_document(deal: &Deal) -> Value {
    serde_json::json!({
        "summary": deal.summary,
        "tags": deal.tags,
        "inventory": deal.inventory,
        "price": { "original": deal.price.original, "deal": deal.price.deal },
        "raw_payload": deal.raw_payload,
    })
}

fn row_to_deal(row: &sqlx::postgres::PgRow) -> Result<Deal> {
    let deal_id: String = row.try_get("deal_id")?;
    let type_str: String = row.try_get("type")?;
    let kind = match type_str.as_str() {
        "flight" => DealKind::Flight,
        "hotel" => DealKind::Hotel,
        _ => DealKind::Car,
    };
    let payload: Value = row.try_get("payload")?;
    let summary = payload
        .get("summary")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let original = payload
        .get("price")
        .and_then(|p| p.get("original"))
        .and_then(|v| v.as_f64())
        .unwrap_or_else(|| row.try_get::<f64, _>("price_value").unwrap_or(0.0));
    let deal_price = payload
        .get("price")
        .and_then(|p| p.get("deal"))
        .and_then(|v| v.as_f64())
        .unwrap_or(original);
    let tags = payload
        .get("tags")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|t| t.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    let inventory = payload
        .get("inventory")
        .and_then(|v| v.as_u64())
        .map(|v| v as u32);
    let raw_payload = payload.get("raw_payload").cloned().unwrap_or(Value::Null);
    let route: Option<String> = row.try_get("route").ok();

    Ok(Deal {
        deal_id,
        kind,
        destination: row.try_get("destination")?,
        summary,
        price: Price::new(original, deal_price),
        score: row.try_get("score")?,
        tags,
        inventory,
        valid_until: row.try_get("valid_until")?,
        route,
        raw_payload,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Insert-or-update by `(deal_id, type)`, stamping `updated_at = now()` on
/// update; last writer wins.
pub async fn upsert_deal(pool: &DbPool, deal: &Deal) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO {schema}.cached_deals
            (deal_id, type, destination, route, price_value, score, valid_until, payload, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
         ON CONFLICT (deal_id, type) DO UPDATE SET
            destination = EXCLUDED.destination,
            route = EXCLUDED.route,
            price_value = EXCLUDED.price_value,
            score = EXCLUDED.score,
            valid_until = EXCLUDED.valid_until,
            payload = EXCLUDED.payload,
            updated_at = NOW()",
        schema = SCHEMA
    ))
    .bind(&deal.deal_id)
    .bind(deal.kind.as_str())
    .bind(&deal.destination)
    .bind(&deal.route)
    .bind(deal.price.deal)
    .bind(deal.score)
    .bind(deal.valid_until)
    .bind(deal_document(deal))
    .execute(pool)
    .await?;
    Ok(())
}

/// Top-scoring non-expired deals, optionally filtered by destination.
pub async fn top_deals(pool: &DbPool, destination: Option<&str>, limit: i64) -> Result<Vec<Deal>> {
    let rows = if let Some(dest) = destination {
        sqlx::query(&format!(
            "SELECT * FROM {schema}.cached_deals
             WHERE destination = $1 AND valid_until > NOW()
             ORDER BY score DESC LIMIT $2",
            schema = SCHEMA
        ))
        .bind(dest)
        .bind(limit)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query(&format!(
            "SELECT * FROM {schema}.cached_deals
             WHERE valid_until > NOW()
             ORDER BY score DESC LIMIT $1",
            schema = SCHEMA
        ))
        .bind(limit)
        .fetch_all(pool)
        .await?
    };

    rows.iter().map(row_to_deal).collect()
}

pub async fn active_watches(pool: &DbPool) -> Result<Vec<Watch>> {
    let rows = sqlx::query(&format!(
        "SELECT * FROM {schema}.watch_requests WHERE active = TRUE",
        schema = SCHEMA
    ))
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(Watch {
                watch_id: row.try_get("watch_id")?,
                user_id: row.try_get("user_id")?,
                destination: row.try_get("destination")?,
                budget_ceiling: row.try_get("budget_ceiling")?,
                min_fit_score: row.try_get("min_fit_score")?,
                notify_on_inventory_below: row
                    .try_get::<Option<i32>, _>("notify_on_inventory_below")?
                    .map(|v| v as u32),
                active: row.try_get("active")?,
                created_at: row.try_get("created_at")?,
                last_triggered_at: row.try_get("last_triggered_at")?,
            })
        })
        .collect()
}

pub async fn insert_watch(pool: &DbPool, watch: &Watch) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO {schema}.watch_requests
            (watch_id, user_id, destination, budget_ceiling, min_fit_score,
             notify_on_inventory_below, active, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        schema = SCHEMA
    ))
    .bind(&watch.watch_id)
    .bind(&watch.user_id)
    .bind(&watch.destination)
    .bind(watch.budget_ceiling)
    .bind(watch.min_fit_score)
    .bind(watch.notify_on_inventory_below.map(|v| v as i32))
    .bind(watch.active)
    .bind(watch.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Atomically deactivates a batch of triggered watches, stamping
/// `last_triggered_at`. A single statement so no watch can be observed
/// "deactivated but not stamped" by a concurrent reader.
pub async fn deactivate_watches(pool: &DbPool, watch_ids: &[String], at: DateTime<Utc>) -> Result<()> {
    if watch_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(&format!(
        "UPDATE {schema}.watch_requests
         SET active = FALSE, last_triggered_at = $1
         WHERE watch_id = ANY($2)",
        schema = SCHEMA
    ))
    .bind(at)
    .bind(watch_ids)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn insert_bundle(pool: &DbPool, bundle: &Bundle, user_id: &str, search_id: &str) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO {schema}.bundles
            (bundle_id, user_id, search_id, destination, total_price, savings,
             fit_score, explanation, valid_until, components)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         ON CONFLICT (bundle_id) DO NOTHING",
        schema = SCHEMA
    ))
    .bind(&bundle.bundle_id)
    .bind(user_id)
    .bind(search_id)
    .bind(&bundle.destination)
    .bind(bundle.total_price)
    .bind(bundle.savings)
    .bind(bundle.fit_score)
    .bind(&bundle.explanation)
    .bind(bundle.valid_until)
    .bind(serde_json::to_value(&bundle.components)?)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn bundles_for_user(pool: &DbPool, user_id: &str, limit: i64) -> Result<Vec<Bundle>> {
    let rows = sqlx::query(&format!(
        "SELECT * FROM {schema}.bundles WHERE user_id = $1 AND valid_until > NOW()
         ORDER BY created_at DESC
         LIMIT $2",
        schema = SCHEMA
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let components: Value = row.try_get("components")?;
            Ok(Bundle {
                bundle_id: row.try_get("bundle_id")?,
                destination: row.try_get("destination")?,
                total_price: row.try_get("total_price")?,
                savings: row.try_get("savings")?,
                fit_score: row.try_get("fit_score")?,
                explanation: row.try_get("explanation")?,
                valid_until: row.try_get("valid_until")?,
                components: serde_json::from_value(components)?,
            })
        })
        .collect()
}

pub async fn upsert_user_preference(pool: &DbPool, pref: &UserPreference) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO {schema}.user_preferences (user_id, destination, preferences, updated_at)
         VALUES ($1, $2, $3, NOW())
         ON CONFLICT (user_id) DO UPDATE SET
            destination = EXCLUDED.destination,
            preferences = EXCLUDED.preferences,
            updated_at = NOW()",
        schema = SCHEMA
    ))
    .bind(&pref.user_id)
    .bind(&pref.destination)
    .bind(&pref.preferences)
    .execute(pool)
    .await?;
    Ok(())
}

/// Upserts one ingestion pipeline document into the analytics sink,
/// last-writer-wins on `(reference_id, type)`.
pub async fn upsert_analytics_deal(
    pool: &DbPool,
    reference_id: &str,
    kind: &str,
    document: &Value,
) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO {schema}.deals_analytics (reference_id, type, document, updated_at)
         VALUES ($1, $2, $3, NOW())
         ON CONFLICT (reference_id, type) DO UPDATE SET
            document = EXCLUDED.document,
            updated_at = NOW()",
        schema = SCHEMA
    ))
    .bind(reference_id)
    .bind(kind)
    .bind(document)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_user_preference(pool: &DbPool, user_id: &str) -> Result<Option<UserPreference>> {
    let row = sqlx::query(&format!(
        "SELECT * FROM {schema}.user_preferences WHERE user_id = $1",
        schema = SCHEMA
    ))
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(UserPreference {
            user_id: row.try_get("user_id")?,
            destination: row.try_get("destination")?,
            preferences: row.try_get("preferences")?,
            updated_at: row.try_get("updated_at")?,
        })),
        None => Ok(None),
    }
}
