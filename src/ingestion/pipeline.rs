//! The five-stage ingestion pipeline: ingest, normalize, score, tag,
//! persist & emit, driven by a `tokio::time::interval` tick.

use super::csv_sources;
use crate::bus::DealEventProducer;
use crate::db::DbPool;
use crate::models::{DealEvent, DealKind, EventPrice};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use sqlx::Row;
use std::path::PathBuf;

/// One unscored, untagged candidate deal, as surfaced by any ingestion
/// source (CSV mining or operational-database sampling).
#[derive(Debug, Clone)]
pub struct RawDeal {
    pub kind: DealKind,
    pub source: &'static str,
    pub reference_id: String,
    pub original_price: f64,
    pub deal_price: f64,
    pub destination: String,
    pub route: Option<String>,
    pub summary: String,
    pub departure_time: Option<DateTime<Utc>>,
    pub available_seats: Option<u32>,
    pub available_rooms: Option<u32>,
    pub changeable: bool,
}

struct NormalizedDeal {
    raw: RawDeal,
    discount_percentage: f64,
    valid_until: DateTime<Utc>,
    confidence: f64,
}

struct ScoredDeal {
    normalized: NormalizedDeal,
    score: f64,
}

struct TaggedDeal {
    scored: ScoredDeal,
    tags: Vec<String>,
    conditions: Vec<String>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Stage 2: computes `discount_percentage`, `valid_until`, and a
/// `confidence` score (0.8 for discounts above 30%, 0.6 otherwise) that
/// records how much the downstream score should be trusted. Flights
/// expire one day before departure; everything else gets a flat 7-day
/// window, matching the absence of a natural expiry signal.
fn normalize(raw_deals: Vec<RawDeal>) -> Vec<NormalizedDeal> {
    raw_deals
        .into_iter()
        .filter(|d| d.original_price > 0.0)
        .map(|raw| {
            let discount_percentage =
                round2((raw.original_price - raw.deal_price) / raw.original_price * 100.0);
            let valid_until = match raw.departure_time {
                Some(departure) => departure - ChronoDuration::days(1),
                None => Utc::now() + ChronoDuration::days(7),
            };
            let confidence = if discount_percentage > 30.0 { 0.8 } else { 0.6 };
            NormalizedDeal {
                raw,
                discount_percentage,
                valid_until,
                confidence,
            }
        })
        .collect()
}

/// Stage 3: discount (<=40), timing (<=20), availability (<=20 flights /
/// flat 15 hotels), popularity (uniform 0-20, no historical signal yet).
/// The raw sum tops out at 95, then is soft-capped via `min(100, raw)` —
/// see the scoring open question.
fn score(normalized_deals: Vec<NormalizedDeal>) -> Vec<ScoredDeal> {
    let mut rng = rand::thread_rng();
    let mut scored: Vec<ScoredDeal> = normalized_deals
        .into_iter()
        .map(|normalized| {
            let mut raw_score = 0.0;
            let discount = normalized.discount_percentage;
            raw_score += if discount > 50.0 {
                40.0
            } else if discount > 30.0 {
                30.0
            } else if discount > 20.0 {
                20.0
            } else {
                discount * 0.5
            };

            let hours_until_valid = (normalized.valid_until - Utc::now()).num_minutes() as f64 / 60.0;
            raw_score += if hours_until_valid < 24.0 {
                20.0
            } else if hours_until_valid < 72.0 {
                15.0
            } else if hours_until_valid < 168.0 {
                10.0
            } else {
                5.0
            };

            raw_score += match normalized.raw.kind {
                DealKind::Flight => match normalized.raw.available_seats {
                    Some(seats) if seats > 50 => 15.0,
                    Some(seats) if seats > 20 => 10.0,
                    _ => 5.0,
                },
                DealKind::Hotel | DealKind::Car => 15.0,
            };

            raw_score += rng.gen_range(0.0..20.0);

            ScoredDeal {
                normalized,
                score: round2(raw_score.min(100.0)),
            }
        })
        .collect();

    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
    scored
}

/// Stage 4: price/time/type/quality tags, plus flight-only conditions.
fn tag(scored_deals: Vec<ScoredDeal>) -> Vec<TaggedDeal> {
    scored_deals
        .into_iter()
        .map(|scored| {
            let mut tags = Vec::new();
            let discount = scored.normalized.discount_percentage;
            if discount > 50.0 {
                tags.push("flash_deal".to_string());
            }
            if discount < 15.0 {
                tags.push("minor_discount".to_string());
            }

            let hours_until_valid =
                (scored.normalized.valid_until - Utc::now()).num_minutes() as f64 / 60.0;
            if hours_until_valid < 24.0 {
                tags.push("expires_soon".to_string());
            } else if hours_until_valid < 168.0 {
                tags.push("limited_time".to_string());
            }

            match scored.normalized.raw.kind {
                DealKind::Flight => {
                    tags.push(if hours_until_valid < 48.0 {
                        "last_minute".to_string()
                    } else {
                        "advance_booking".to_string()
                    });
                }
                DealKind::Hotel => tags.push("weekend_getaway".to_string()),
                DealKind::Car => {}
            }

            if scored.score > 80.0 {
                tags.push("top_pick".to_string());
            } else if scored.score > 60.0 {
                tags.push("good_value".to_string());
            }

            let mut conditions = Vec::new();
            if matches!(scored.normalized.raw.kind, DealKind::Flight) {
                conditions.push("non-refundable".to_string());
                if scored.normalized.raw.changeable {
                    conditions.push("changeable with fee".to_string());
                }
            }

            TaggedDeal {
                scored,
                tags,
                conditions,
            }
        })
        .collect()
}

/// Runs the ingestion pipeline on a fixed interval, sourcing from CSV
/// datasets and (best-effort) the operational booking database.
pub struct IngestionPipeline {
    db: DbPool,
    producer: DealEventProducer,
    data_dir: PathBuf,
}

impl IngestionPipeline {
    pub fn new(db: DbPool, producer: DealEventProducer, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            producer,
            data_dir: data_dir.into(),
        }
    }

    /// One full pass through all five stages. Returns the number of
    /// deals successfully persisted. A database connectivity failure
    /// propagates and fails the whole tick; a single deal's persistence
    /// failure is logged and skipped.
    pub async fn run_tick(&self) -> anyhow::Result<usize> {
        let mut raw_deals = Vec::new();
        raw_deals.extend(csv_sources::ingest_airbnb_listings(&self.data_dir));
        raw_deals.extend(csv_sources::ingest_flight_prices(&self.data_dir));
        raw_deals.extend(csv_sources::ingest_hotel_bookings(&self.data_dir));
        raw_deals.extend(self.sample_operational_flights().await);
        raw_deals.extend(self.sample_operational_hotels().await);
        log::info!("ingestion: {} raw deals collected", raw_deals.len());

        let normalized = normalize(raw_deals);
        let scored = score(normalized);
        let tagged = tag(scored);

        let processed = self.persist_and_emit(&tagged).await;
        log::info!("ingestion: persisted {} deals this tick", processed);
        crate::metrics::set_ingestion_deals_processed(processed as f64);
        Ok(processed)
    }

    /// <=100 flights sampled via offset pagination, each independently a
    /// 30%-probability deal with a 25-70% discount band. Table absence
    /// (this crate's own schema does not own booking inventory) degrades
    /// to an empty result rather than failing the tick.
    async fn sample_operational_flights(&self) -> Vec<RawDeal> {
        let count: i64 = match sqlx::query("SELECT COUNT(*) AS count FROM flights WHERE available_seats > 0")
            .fetch_one(&self.db)
            .await
        {
            Ok(row) => row.try_get::<i64, _>("count").unwrap_or(0),
            Err(e) => {
                log::debug!("operational flights table unavailable, skipping: {}", e);
                return Vec::new();
            }
        };
        if count == 0 {
            return Vec::new();
        }

        let mut rng = rand::thread_rng();
        let offset = rng.gen_range(0..(count - 100).max(1));
        let rows = match sqlx::query(
            "SELECT id, airline, origin_airport_code, destination_airport_code, \
             departure_time, price, available_seats, changeable \
             FROM flights WHERE available_seats > 0 LIMIT 100 OFFSET $1",
        )
        .bind(offset)
        .fetch_all(&self.db)
        .await
        {
            Ok(rows) => rows,
            Err(e) => {
                log::debug!("failed to sample operational flights: {}", e);
                return Vec::new();
            }
        };

        let mut deals = Vec::new();
        for row in rows {
            if rng.gen_range(0.0..1.0) >= 0.3 {
                continue;
            }
            let original_price: f64 = row.try_get("price").unwrap_or(0.0);
            if original_price <= 0.0 {
                continue;
            }
            let deal_price = round2(original_price * (0.7 + rng.gen_range(0.0..0.25)));
            let origin: String = row.try_get("origin_airport_code").unwrap_or_default();
            let destination: String = row.try_get("destination_airport_code").unwrap_or_default();
            let airline: String = row.try_get("airline").unwrap_or_else(|_| "Flight".to_string());
            let id: i64 = row.try_get("id").unwrap_or_default();

            deals.push(RawDeal {
                kind: DealKind::Flight,
                source: "airline_feed",
                reference_id: id.to_string(),
                original_price,
                deal_price,
                destination: destination.clone(),
                route: Some(format!("{origin}-{destination}")),
                summary: format!("{airline} {origin}-{destination}"),
                departure_time: row.try_get("departure_time").ok(),
                available_seats: row.try_get::<i32, _>("available_seats").ok().map(|v| v as u32),
                available_rooms: None,
                changeable: row.try_get("changeable").unwrap_or(false),
            });
        }
        deals
    }

    /// <=100 hotel rooms sampled via offset pagination, each
    /// independently a 40%-probability deal with a 30-70% discount band.
    async fn sample_operational_hotels(&self) -> Vec<RawDeal> {
        let count: i64 = match sqlx::query(
            "SELECT COUNT(*) AS count FROM hotel_rooms hr JOIN hotels h ON hr.hotel_id = h.id WHERE hr.available = true",
        )
        .fetch_one(&self.db)
        .await
        {
            Ok(row) => row.try_get::<i64, _>("count").unwrap_or(0),
            Err(e) => {
                log::debug!("operational hotel_rooms table unavailable, skipping: {}", e);
                return Vec::new();
            }
        };
        if count == 0 {
            return Vec::new();
        }

        let mut rng = rand::thread_rng();
        let offset = rng.gen_range(0..(count - 100).max(1));
        let rows = match sqlx::query(
            "SELECT hr.id, hr.price_per_night, h.name AS hotel_name, h.city \
             FROM hotel_rooms hr JOIN hotels h ON hr.hotel_id = h.id \
             WHERE hr.available = true LIMIT 100 OFFSET $1",
        )
        .bind(offset)
        .fetch_all(&self.db)
        .await
        {
            Ok(rows) => rows,
            Err(e) => {
                log::debug!("failed to sample operational hotel rooms: {}", e);
                return Vec::new();
            }
        };

        let mut deals = Vec::new();
        for row in rows {
            if rng.gen_range(0.0..1.0) >= 0.4 {
                continue;
            }
            let original_price: f64 = row.try_get("price_per_night").unwrap_or(0.0);
            if original_price <= 0.0 {
                continue;
            }
            let deal_price = round2(original_price * (0.6 + rng.gen_range(0.0..0.3)));
            let hotel_name: String = row.try_get("hotel_name").unwrap_or_else(|_| "Hotel deal".to_string());
            let city: String = row.try_get("city").unwrap_or_else(|_| "Unknown".to_string());
            let id: i64 = row.try_get("id").unwrap_or_default();

            deals.push(RawDeal {
                kind: DealKind::Hotel,
                source: "hotel_feed",
                reference_id: id.to_string(),
                original_price,
                deal_price,
                destination: city,
                route: None,
                summary: hotel_name,
                departure_time: None,
                available_seats: None,
                available_rooms: None,
                changeable: false,
            });
        }
        deals
    }

    /// Upserts every tagged deal into the analytics store keyed by
    /// `(reference_id, type)`, then emits the top-10 (already
    /// score-sorted) to `deal.events`. A single deal's persistence
    /// failure is logged and skipped; emission failures never block
    /// persistence since `DealEventProducer::publish` already swallows
    /// its own errors.
    async fn persist_and_emit(&self, tagged_deals: &[TaggedDeal]) -> usize {
        let mut processed = 0;
        for deal in tagged_deals {
            let document = serde_json::json!({
                "referenceId": deal.scored.normalized.raw.reference_id,
                "type": deal.scored.normalized.raw.kind.as_str(),
                "originalPrice": deal.scored.normalized.raw.original_price,
                "dealPrice": deal.scored.normalized.raw.deal_price,
                "discountPercentage": deal.scored.normalized.discount_percentage,
                "validUntil": deal.scored.normalized.valid_until,
                "conditions": deal.conditions,
                "tags": deal.tags,
                "aiScore": deal.scored.score,
                "source": deal.scored.normalized.raw.source,
                "metadata": {
                    "confidence": deal.scored.normalized.confidence,
                },
            });

            match crate::db::upsert_analytics_deal(
                &self.db,
                &deal.scored.normalized.raw.reference_id,
                deal.scored.normalized.raw.kind.as_str(),
                &document,
            )
            .await
            {
                Ok(()) => processed += 1,
                Err(e) => log::warn!(
                    "failed to persist deal {}: {}",
                    deal.scored.normalized.raw.reference_id,
                    e
                ),
            }
        }

        for deal in tagged_deals.iter().take(10) {
            let raw = &deal.scored.normalized.raw;
            let event = DealEvent {
                event_type: "deal_created".to_string(),
                deal_id: format!("deal_{}_{}", raw.reference_id, Utc::now().timestamp()),
                kind: raw.kind,
                destination: raw.destination.clone(),
                route: raw.route.clone(),
                summary: raw.summary.clone(),
                price: EventPrice {
                    original: raw.original_price,
                    deal: raw.deal_price,
                    discount: deal.scored.normalized.discount_percentage,
                },
                score: deal.scored.score,
                tags: deal.tags.clone(),
                valid_until: deal.scored.normalized.valid_until,
                inventory: raw.available_seats.or(raw.available_rooms),
                timestamp: Utc::now(),
            };
            self.producer.publish(&event).await;
        }

        processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raw(kind: DealKind, original: f64, deal: f64) -> RawDeal {
        RawDeal {
            kind,
            source: "test",
            reference_id: "ref1".to_string(),
            original_price: original,
            deal_price: deal,
            destination: "LAX".to_string(),
            route: Some("JFK-LAX".to_string()),
            summary: "Test deal".to_string(),
            departure_time: Some(Utc::now() + ChronoDuration::days(10)),
            available_seats: Some(60),
            available_rooms: None,
            changeable: true,
        }
    }

    #[test]
    fn normalize_computes_discount_and_flight_expiry() {
        let raw = sample_raw(DealKind::Flight, 200.0, 100.0);
        let departure = raw.departure_time.unwrap();
        let normalized = normalize(vec![raw]);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].discount_percentage, 50.0);
        assert_eq!(normalized[0].valid_until, departure - ChronoDuration::days(1));
        assert_eq!(normalized[0].confidence, 0.8);
    }

    #[test]
    fn normalize_gives_low_confidence_below_the_discount_threshold() {
        let raw = sample_raw(DealKind::Hotel, 200.0, 180.0);
        let normalized = normalize(vec![raw]);
        assert_eq!(normalized[0].confidence, 0.6);
    }

    #[test]
    fn zero_price_deals_are_dropped_during_normalize() {
        let raw = sample_raw(DealKind::Flight, 0.0, 0.0);
        assert!(normalize(vec![raw]).is_empty());
    }

    #[test]
    fn score_is_capped_at_one_hundred_and_sorted_descending() {
        let cheap = sample_raw(DealKind::Flight, 200.0, 80.0);
        let mild = sample_raw(DealKind::Hotel, 200.0, 190.0);
        let normalized = normalize(vec![cheap, mild]);
        let scored = score(normalized);
        assert!(scored.iter().all(|s| s.score <= 100.0));
        assert!(scored[0].score >= scored[1].score);
    }

    #[test]
    fn tag_flags_flash_deal_and_flight_conditions() {
        let raw = sample_raw(DealKind::Flight, 200.0, 80.0);
        let normalized = normalize(vec![raw]);
        let scored = score(normalized);
        let tagged = tag(scored);
        assert!(tagged[0].tags.contains(&"flash_deal".to_string()));
        assert!(tagged[0].conditions.contains(&"non-refundable".to_string()));
        assert!(tagged[0].conditions.contains(&"changeable with fee".to_string()));
    }

    #[test]
    fn tag_marks_hotel_as_weekend_getaway_with_no_flight_conditions() {
        let mut raw = sample_raw(DealKind::Hotel, 200.0, 150.0);
        raw.changeable = false;
        let normalized = normalize(vec![raw]);
        let scored = score(normalized);
        let tagged = tag(scored);
        assert!(tagged[0].tags.contains(&"weekend_getaway".to_string()));
        assert!(tagged[0].conditions.is_empty());
    }
}
