//! Core bundle-generation algorithm: fingerprint-keyed idempotent caching,
//! a parallel three-way upstream fan-out, Cartesian enumeration, pricing,
//! deal-overlay matching, and fit scoring.

use crate::cache::HotCache;
use crate::deal_cache::DealCache;
use crate::metrics;
use crate::models::*;
use crate::search_clients::{CarSearchClient, FlightSearchClient, HotelSearchClient, SearchClient};
use anyhow::Result;
use sha1::{Digest, Sha1};
use std::time::{Duration, Instant};
use uuid::Uuid;

pub struct BundleEngine {
    flights: FlightSearchClient,
    hotels: HotelSearchClient,
    cars: CarSearchClient,
    deal_cache: DealCache,
    hot_cache: HotCache,
    bundle_limit: usize,
}

impl BundleEngine {
    pub fn new(
        flights: FlightSearchClient,
        hotels: HotelSearchClient,
        cars: CarSearchClient,
        deal_cache: DealCache,
        hot_cache: HotCache,
        bundle_limit: usize,
    ) -> Self {
        Self {
            flights,
            hotels,
            cars,
            deal_cache,
            hot_cache,
            bundle_limit,
        }
    }

    pub async fn generate(&self, request: BundleRequest, user_id: Option<&str>) -> Result<BundleResponse> {
        let start = Instant::now();
        let fingerprint = Self::fingerprint(&request);
        let cache_key = format!("bundle:{}", fingerprint);

        if let Some(cached) = self.hot_cache.get::<BundleResponse>(&cache_key).await {
            metrics::increment_bundle_generate("cache_hit");
            metrics::record_bundle_generate_duration(start.elapsed());
            return Ok(cached);
        }

        let (flights, hotels, cars) = tokio::join!(
            self.flights.search(&request),
            self.hotels.search(&request),
            self.cars.search(&request),
        );

        let deals = self
            .deal_cache
            .top_deals(Some(&request.destination), 5)
            .await
            .unwrap_or_default();

        let nights = request.nights();
        let mut candidates = Vec::new();

        for flight in flights.iter().take(3) {
            for hotel in hotels.iter().take(3) {
                for car in cars.iter().take(2) {
                    candidates.push(Self::build_bundle(&request, flight, hotel, car, nights, &deals));
                }
            }
        }

        candidates.sort_by(|a, b| b.fit_score.partial_cmp(&a.fit_score).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(self.bundle_limit);

        let search_id = Uuid::new_v4().simple().to_string();
        let response = BundleResponse {
            search_id: search_id.clone(),
            total_results: candidates.len(),
            bundles: candidates,
        };

        // Best-effort persistence: never block the response on these.
        if let Some(uid) = user_id {
            self.deal_cache.cache_bundles(uid, &search_id, &response).await;
        }

        if let Err(e) = self.hot_cache.set(&cache_key, &response, Duration::from_secs(600)).await {
            log::debug!("failed to cache bundle response for fingerprint {}: {}", fingerprint, e);
        }

        metrics::increment_bundle_generate("computed");
        metrics::record_bundle_generate_duration(start.elapsed());
        Ok(response)
    }

    /// SHA-1 of the canonical (sorted-key) JSON encoding of the request,
    /// hex-encoded. Two semantically identical requests always fingerprint
    /// identically regardless of field order.
    pub fn fingerprint(request: &BundleRequest) -> String {
        let canonical = canonical_json(&serde_json::to_value(request).unwrap_or(serde_json::Value::Null));
        let mut hasher = Sha1::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn build_bundle(
        request: &BundleRequest,
        flight: &FlightOption,
        hotel: &HotelOption,
        car: &CarOption,
        nights: i64,
        deals: &[Deal],
    ) -> Bundle {
        let hotel_total = hotel.price_per_night * nights as f64;
        let car_total = car.daily_price * nights.max(1) as f64;
        let total_price = flight.price + hotel_total + car_total;
        let baseline = 1.15 * total_price;
        let mut savings = (baseline - total_price).max(0.0);

        let mut deal_bonus = 0.0;
        let mut explanation = "Balanced itinerary with matched preferences".to_string();

        for deal in deals {
            let matched = match deal.kind {
                DealKind::Hotel => deal.summary.to_lowercase().contains(&hotel.name.to_lowercase()),
                DealKind::Flight => request
                    .origin
                    .as_ref()
                    .map(|o| deal.summary.to_lowercase().contains(&o.to_lowercase()))
                    .unwrap_or(false),
                DealKind::Car => false,
            };
            if matched {
                savings += deal.price.original - deal.price.deal;
                deal_bonus = (deal.score / 2.0).min(25.0);
                explanation = match deal.kind {
                    DealKind::Hotel => format!("Hotel deal: {}", deal.summary),
                    DealKind::Flight => format!("Flight deal: {}", deal.summary),
                    DealKind::Car => explanation,
                };
                break;
            }
        }

        let budget_delta = (request.budget - total_price).max(0.0);
        let budget_score = lerp_clamped(budget_delta, 0.0, request.budget.max(1.0), 10.0, 35.0);

        let hotel_score = request
            .preferences
            .hotel_star_rating
            .as_ref()
            .map(|stars| {
                if stars.contains(&(hotel.star_rating.round() as u8)) {
                    25.0
                } else {
                    10.0
                }
            })
            .unwrap_or(10.0);

        let fit_score = (budget_score + hotel_score + deal_bonus).min(100.0);

        Bundle {
            bundle_id: Uuid::new_v4().simple().to_string(),
            destination: request.destination.clone(),
            total_price,
            savings,
            fit_score,
            explanation,
            valid_until: request.departure_date - chrono::Duration::days(1),
            components: vec![
                BundleComponent {
                    kind: DealKind::Flight,
                    summary: format!("{} {}", flight.airline, flight.destination),
                    price: flight.price,
                    metadata: ComponentMetadata::Flight {
                        airline: flight.airline.clone(),
                        origin: flight.origin.clone(),
                        destination: flight.destination.clone(),
                    },
                },
                BundleComponent {
                    kind: DealKind::Hotel,
                    summary: hotel.name.clone(),
                    price: hotel_total,
                    metadata: ComponentMetadata::Hotel {
                        name: hotel.name.clone(),
                        star_rating: hotel.star_rating,
                    },
                },
                BundleComponent {
                    kind: DealKind::Car,
                    summary: car.vendor.clone(),
                    price: car_total,
                    metadata: ComponentMetadata::Car {
                        vendor: car.vendor.clone(),
                        category: car.category.clone(),
                    },
                },
            ],
        }
    }
}

fn lerp_clamped(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    if x <= x0 {
        return y0;
    }
    if x >= x1 {
        return y1;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Sorts object keys recursively and normalizes to a compact string, so
/// the same request always hashes identically regardless of field order.
fn canonical_json(value: &serde_json::Value) -> String {
    fn sorted(value: &serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut sorted_map = serde_json::Map::new();
                for (k, v) in entries {
                    sorted_map.insert(k.clone(), sorted(v));
                }
                serde_json::Value::Object(sorted_map)
            }
            serde_json::Value::Array(arr) => serde_json::Value::Array(arr.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_request() -> BundleRequest {
        BundleRequest {
            origin: Some("JFK".to_string()),
            destination: "LAX".to_string(),
            departure_date: Utc::now(),
            return_date: None,
            budget: 2000.0,
            preferences: BundlePreferences::default(),
            constraints: BundleConstraints::default(),
        }
    }

    #[test]
    fn fingerprint_is_stable_regardless_of_reserialization() {
        let request = sample_request();
        let a = BundleEngine::fingerprint(&request);
        let b = BundleEngine::fingerprint(&request);
        assert_eq!(a, b);
        assert_eq!(a.len(), 40); // hex-encoded 160-bit digest
    }

    #[test]
    fn fingerprint_differs_for_different_requests() {
        let mut request_a = sample_request();
        let mut request_b = sample_request();
        request_a.destination = "LAX".to_string();
        request_b.destination = "JFK".to_string();
        assert_ne!(BundleEngine::fingerprint(&request_a), BundleEngine::fingerprint(&request_b));
    }

    #[test]
    fn lerp_clamps_at_bounds() {
        assert_eq!(lerp_clamped(-10.0, 0.0, 100.0, 10.0, 35.0), 10.0);
        assert_eq!(lerp_clamped(1000.0, 0.0, 100.0, 10.0, 35.0), 35.0);
        assert_eq!(lerp_clamped(50.0, 0.0, 100.0, 10.0, 35.0), 22.5);
    }

    #[test]
    fn build_bundle_caps_fit_score_at_100() {
        let request = sample_request();
        let flight = FlightOption {
            id: "f1".to_string(),
            airline: "Test Air".to_string(),
            origin: "JFK".to_string(),
            destination: "LAX".to_string(),
            price: 100.0,
            cabin_class: None,
            red_eye: false,
        };
        let hotel = HotelOption {
            id: "h1".to_string(),
            name: "Test Hotel".to_string(),
            price_per_night: 50.0,
            star_rating: 4.0,
            amenities: vec![],
        };
        let car = CarOption {
            id: "c1".to_string(),
            vendor: "Test Cars".to_string(),
            daily_price: 20.0,
            category: None,
        };
        let deal = Deal {
            deal_id: "d1".to_string(),
            kind: DealKind::Hotel,
            destination: "LAX".to_string(),
            summary: "Test Hotel flash deal".to_string(),
            price: Price::new(200.0, 50.0),
            score: 100.0,
            tags: Default::default(),
            inventory: None,
            valid_until: Utc::now() + chrono::Duration::days(5),
            route: None,
            raw_payload: serde_json::json!({}),
            updated_at: Utc::now(),
        };
        let bundle = BundleEngine::build_bundle(&request, &flight, &hotel, &car, 3, &[deal]);
        assert!(bundle.fit_score <= 100.0);
        assert!(bundle.explanation.contains("Test Hotel"));
    }
}
