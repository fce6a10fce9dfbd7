//! Upstream inventory search: one HTTP adapter per service (flights,
//! hotels, cars), sharing a retry policy and each falling back to one
//! deterministic option when every attempt is exhausted.

use crate::models::{BundleRequest, CarOption, FlightOption, HotelOption};
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

#[async_trait]
pub trait SearchClient<T>: Send + Sync {
    async fn search(&self, request: &BundleRequest) -> Vec<T>;
}

fn request_body(request: &BundleRequest, budget_share: f64) -> serde_json::Value {
    json!({
        "destination": request.destination,
        "origin": request.origin,
        "departureDate": request.departure_date,
        "returnDate": request.effective_return_date(),
        "budget": request.budget * budget_share,
        "preferences": request.preferences,
        "constraints": request.constraints,
    })
}

async fn post_json<T: serde::de::DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
    body: &serde_json::Value,
    timeout: Duration,
    retry: &RetryPolicy,
) -> Result<T> {
    retry
        .run(|| async {
            http.post(url)
                .json(body)
                .timeout(timeout)
                .send()
                .await
                .context("search request failed")?
                .error_for_status()
                .context("search request returned an error status")?
                .json::<T>()
                .await
                .context("failed to parse search response")
        })
        .await
}

pub struct FlightSearchClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl FlightSearchClient {
    pub fn new(http: reqwest::Client, base_url: String, timeout: Duration) -> Self {
        Self {
            http,
            base_url,
            timeout,
            retry: RetryPolicy::default(),
        }
    }

    fn fallback(request: &BundleRequest) -> Vec<FlightOption> {
        vec![FlightOption {
            id: "fallback-flight".to_string(),
            airline: "Kayak Airways".to_string(),
            origin: request.origin.clone().unwrap_or_else(|| "ANY".to_string()),
            destination: request.destination.clone(),
            price: (request.budget * 0.4).min(450.0).max(120.0),
            cabin_class: request.preferences.flight_class.clone(),
            red_eye: false,
        }]
    }
}

#[async_trait]
impl SearchClient<FlightOption> for FlightSearchClient {
    async fn search(&self, request: &BundleRequest) -> Vec<FlightOption> {
        #[derive(serde::Deserialize)]
        struct Envelope {
            data: Data,
        }
        #[derive(serde::Deserialize)]
        struct Data {
            flights: Vec<FlightOption>,
        }

        let url = format!("{}/flights/search", self.base_url);
        let body = request_body(request, 0.4);
        match post_json::<Envelope>(&self.http, &url, &body, self.timeout, &self.retry).await {
            Ok(env) if !env.data.flights.is_empty() => env.data.flights,
            Ok(_) => Self::fallback(request),
            Err(e) => {
                log::warn!("flight search exhausted retries, using fallback: {}", e);
                Self::fallback(request)
            }
        }
    }
}

pub struct HotelSearchClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HotelSearchClient {
    pub fn new(http: reqwest::Client, base_url: String, timeout: Duration) -> Self {
        Self {
            http,
            base_url,
            timeout,
            retry: RetryPolicy::default(),
        }
    }

    fn fallback(request: &BundleRequest) -> Vec<HotelOption> {
        vec![HotelOption {
            id: "fallback-hotel".to_string(),
            name: "Kayak Grand".to_string(),
            price_per_night: (request.budget * 0.4 / request.nights() as f64).min(280.0).max(60.0),
            star_rating: 3.0,
            amenities: vec![],
        }]
    }
}

#[async_trait]
impl SearchClient<HotelOption> for HotelSearchClient {
    async fn search(&self, request: &BundleRequest) -> Vec<HotelOption> {
        #[derive(serde::Deserialize)]
        struct Envelope {
            data: Data,
        }
        #[derive(serde::Deserialize)]
        struct Data {
            hotels: Vec<HotelOption>,
        }

        let url = format!("{}/hotels/search", self.base_url);
        let body = request_body(request, 0.4);
        match post_json::<Envelope>(&self.http, &url, &body, self.timeout, &self.retry).await {
            Ok(env) if !env.data.hotels.is_empty() => env.data.hotels,
            Ok(_) => Self::fallback(request),
            Err(e) => {
                log::warn!("hotel search exhausted retries, using fallback: {}", e);
                Self::fallback(request)
            }
        }
    }
}

pub struct CarSearchClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl CarSearchClient {
    pub fn new(http: reqwest::Client, base_url: String, timeout: Duration) -> Self {
        Self {
            http,
            base_url,
            timeout,
            retry: RetryPolicy::default(),
        }
    }

    fn fallback(_request: &BundleRequest) -> Vec<CarOption> {
        vec![CarOption {
            id: "fallback-car".to_string(),
            vendor: "Kayak Rentals".to_string(),
            daily_price: 65.0,
            category: Some("economy".to_string()),
        }]
    }
}

#[async_trait]
impl SearchClient<CarOption> for CarSearchClient {
    async fn search(&self, request: &BundleRequest) -> Vec<CarOption> {
        #[derive(serde::Deserialize)]
        struct Envelope {
            data: Data,
        }
        #[derive(serde::Deserialize)]
        struct Data {
            cars: Vec<CarOption>,
        }

        let url = format!("{}/cars/search", self.base_url);
        let body = request_body(request, 0.2);
        match post_json::<Envelope>(&self.http, &url, &body, self.timeout, &self.retry).await {
            Ok(env) if !env.data.cars.is_empty() => env.data.cars,
            Ok(_) => Self::fallback(request),
            Err(e) => {
                log::warn!("car search exhausted retries, using fallback: {}", e);
                Self::fallback(request)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BundleConstraints, BundlePreferences};
    use chrono::Utc;

    fn sample_request() -> BundleRequest {
        BundleRequest {
            origin: Some("JFK".to_string()),
            destination: "LAX".to_string(),
            departure_date: Utc::now(),
            return_date: None,
            budget: 1000.0,
            preferences: BundlePreferences::default(),
            constraints: BundleConstraints::default(),
        }
    }

    #[test]
    fn flight_fallback_is_deterministic() {
        let request = sample_request();
        let a = FlightSearchClient::fallback(&request);
        let b = FlightSearchClient::fallback(&request);
        assert_eq!(a[0].airline, b[0].airline);
        assert_eq!(a[0].airline, "Kayak Airways");
    }

    #[test]
    fn hotel_fallback_caps_nightly_rate() {
        let request = sample_request();
        let fallback = HotelSearchClient::fallback(&request);
        assert!(fallback[0].price_per_night <= 280.0);
    }

    #[test]
    fn car_fallback_is_flat_rate() {
        let request = sample_request();
        let fallback = CarSearchClient::fallback(&request);
        assert_eq!(fallback[0].daily_price, 65.0);
    }
}
