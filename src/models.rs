//! Canonical data model: deals, bundle requests/responses, watches, and the
//! wire-level events exchanged over the message bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The three inventory families the bundle engine shops across.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DealKind {
    Flight,
    Hotel,
    Car,
}

impl DealKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DealKind::Flight => "flight",
            DealKind::Hotel => "hotel",
            DealKind::Car => "car",
        }
    }
}

impl std::fmt::Display for DealKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Original/deal/discount triple. `deal <= original` is a structural
/// invariant enforced at every construction site, not re-validated on read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub original: f64,
    pub deal: f64,
    pub discount_percent: f64,
}

impl Price {
    pub fn new(original: f64, deal: f64) -> Self {
        let deal = deal.min(original);
        let discount_percent = if original > 0.0 {
            round2(100.0 * (original - deal) / original)
        } else {
            0.0
        };
        Self {
            original,
            deal,
            discount_percent,
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A single discoverable deal, as persisted in `cached_deals` and
/// published/consumed on `deal.events`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deal {
    pub deal_id: String,
    pub kind: DealKind,
    pub destination: String,
    pub summary: String,
    pub price: Price,
    /// Clamped to `[0, 100]` at every write site.
    pub score: f64,
    pub tags: BTreeSet<String>,
    pub inventory: Option<u32>,
    pub valid_until: DateTime<Utc>,
    /// Flights only; e.g. `"JFK-LAX"`.
    pub route: Option<String>,
    /// Opaque, retained verbatim for the explanation/UI flattener.
    pub raw_payload: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Event payload exchanged on the `deal.events` topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealEvent {
    pub event_type: String,
    pub deal_id: String,
    #[serde(rename = "type")]
    pub kind: DealKind,
    pub destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    pub summary: String,
    pub price: EventPrice,
    pub score: f64,
    pub tags: Vec<String>,
    pub valid_until: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<u32>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPrice {
    pub original: f64,
    pub deal: f64,
    pub discount: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundlePreferences {
    #[serde(default)]
    pub flight_class: Option<String>,
    #[serde(default)]
    pub hotel_star_rating: Option<Vec<u8>>,
    #[serde(default)]
    pub amenities: Option<Vec<String>>,
    #[serde(default)]
    pub pet_friendly: Option<bool>,
    #[serde(default)]
    pub avoid_red_eye: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConstraints {
    #[serde(default = "one")]
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default = "one")]
    pub rooms: u32,
}

fn one() -> u32 {
    1
}

impl Default for BundleConstraints {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
            rooms: 1,
        }
    }
}

/// Ephemeral travel-shopping request. Never persisted as-is; only its
/// canonical fingerprint and the resulting `Bundle`s are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleRequest {
    #[serde(default)]
    pub origin: Option<String>,
    pub destination: String,
    pub departure_date: DateTime<Utc>,
    #[serde(default)]
    pub return_date: Option<DateTime<Utc>>,
    pub budget: f64,
    #[serde(default)]
    pub preferences: BundlePreferences,
    #[serde(default)]
    pub constraints: BundleConstraints,
}

fn is_location_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic())
}

impl BundleRequest {
    /// `return_date` if supplied, else `departure_date + 3 days`.
    pub fn effective_return_date(&self) -> DateTime<Utc> {
        self.return_date
            .unwrap_or_else(|| self.departure_date + chrono::Duration::days(3))
    }

    pub fn nights(&self) -> i64 {
        (self.effective_return_date() - self.departure_date)
            .num_days()
            .max(1)
    }

    /// Boundary validation per the bad-client-input error policy: checked
    /// once, at the API edge, never re-checked by internal collaborators.
    pub fn validate(&self) -> Result<(), crate::errors::ConciergeError> {
        use crate::errors::ConciergeError::Validation;

        if !is_location_code(&self.destination) {
            return Err(Validation(format!(
                "destination must be a 3-letter location code, got {:?}",
                self.destination
            )));
        }
        if let Some(origin) = &self.origin {
            if !is_location_code(origin) {
                return Err(Validation(format!(
                    "origin must be a 3-letter location code, got {:?}",
                    origin
                )));
            }
        }
        if self.budget <= 0.0 {
            return Err(Validation("budget must be > 0".to_string()));
        }
        if self.constraints.adults < 1 {
            return Err(Validation("constraints.adults must be >= 1".to_string()));
        }
        if self.constraints.rooms < 1 {
            return Err(Validation("constraints.rooms must be >= 1".to_string()));
        }
        if let Some(stars) = &self.preferences.hotel_star_rating {
            if stars.iter().any(|s| !(1..=5).contains(s)) {
                return Err(Validation(
                    "preferences.hotel_star_rating values must be 1..=5".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightOption {
    pub id: String,
    pub airline: String,
    pub origin: String,
    pub destination: String,
    pub price: f64,
    #[serde(default)]
    pub cabin_class: Option<String>,
    #[serde(default)]
    pub red_eye: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotelOption {
    pub id: String,
    pub name: String,
    pub price_per_night: f64,
    pub star_rating: f64,
    #[serde(default)]
    pub amenities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarOption {
    pub id: String,
    pub vendor: String,
    pub daily_price: f64,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ComponentMetadata {
    Flight {
        airline: String,
        origin: String,
        destination: String,
    },
    Hotel {
        name: String,
        star_rating: f64,
    },
    Car {
        vendor: String,
        category: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleComponent {
    pub kind: DealKind,
    pub summary: String,
    pub price: f64,
    pub metadata: ComponentMetadata,
}

/// One candidate package: a flight + hotel + car triple with a fit score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub bundle_id: String,
    pub destination: String,
    pub total_price: f64,
    pub savings: f64,
    pub fit_score: f64,
    pub explanation: String,
    pub valid_until: DateTime<Utc>,
    pub components: Vec<BundleComponent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleResponse {
    pub search_id: String,
    pub bundles: Vec<Bundle>,
    pub total_results: usize,
}

/// A standing request to be alerted when a matching deal appears.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Watch {
    pub watch_id: String,
    pub user_id: String,
    pub destination: String,
    pub budget_ceiling: f64,
    #[serde(default = "default_min_fit_score")]
    pub min_fit_score: f64,
    #[serde(default = "default_notify_on_inventory_below")]
    pub notify_on_inventory_below: Option<u32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub last_triggered_at: Option<DateTime<Utc>>,
}

fn default_min_fit_score() -> f64 {
    60.0
}
fn default_notify_on_inventory_below() -> Option<u32> {
    Some(5)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchRequestCreate {
    pub user_id: String,
    pub destination: String,
    pub budget_ceiling: f64,
    #[serde(default = "default_min_fit_score")]
    pub min_fit_score: f64,
    #[serde(default = "default_notify_on_inventory_below")]
    pub notify_on_inventory_below: Option<u32>,
}

impl WatchRequestCreate {
    pub fn validate(&self) -> Result<(), crate::errors::ConciergeError> {
        use crate::errors::ConciergeError::Validation;

        if self.user_id.trim().is_empty() {
            return Err(Validation("user_id must not be empty".to_string()));
        }
        if !is_location_code(&self.destination) {
            return Err(Validation(format!(
                "destination must be a 3-letter location code, got {:?}",
                self.destination
            )));
        }
        if self.budget_ceiling <= 0.0 {
            return Err(Validation("budget_ceiling must be > 0".to_string()));
        }
        if !(0.0..=100.0).contains(&self.min_fit_score) {
            return Err(Validation("min_fit_score must be within 0..=100".to_string()));
        }
        Ok(())
    }
}

/// Pushed to subscribers over the connection registry when a watch fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEvent {
    pub watch_id: String,
    pub user_id: String,
    pub deal: Deal,
    pub triggered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreference {
    pub user_id: String,
    pub destination: Option<String>,
    pub preferences: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Uniform envelope every handler returns, matching the source API's
/// `{success, data, error, trace_id}` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub trace_id: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            trace_id: uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            trace_id: uuid::Uuid::new_v4().simple().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedIntent {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub departure_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub return_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub adults: Option<u32>,
    #[serde(default)]
    pub children: Option<u32>,
    #[serde(default)]
    pub preferences: BundlePreferences,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_clamps_deal_to_original() {
        let p = Price::new(100.0, 150.0);
        assert_eq!(p.deal, 100.0);
        assert_eq!(p.discount_percent, 0.0);
    }

    #[test]
    fn price_computes_discount_percent() {
        let p = Price::new(200.0, 150.0);
        assert_eq!(p.discount_percent, 25.0);
    }

    #[test]
    fn bundle_request_falls_back_to_three_nights() {
        let req = BundleRequest {
            origin: None,
            destination: "LAX".to_string(),
            departure_date: Utc::now(),
            return_date: None,
            budget: 1000.0,
            preferences: BundlePreferences::default(),
            constraints: BundleConstraints::default(),
        };
        assert_eq!(req.nights(), 3);
    }

    #[test]
    fn bundle_request_prefers_explicit_return_date() {
        let departure = Utc::now();
        let req = BundleRequest {
            origin: None,
            destination: "LAX".to_string(),
            departure_date: departure,
            return_date: Some(departure + chrono::Duration::days(10)),
            budget: 1000.0,
            preferences: BundlePreferences::default(),
            constraints: BundleConstraints::default(),
        };
        assert_eq!(req.nights(), 10);
    }

    #[test]
    fn validate_rejects_non_three_letter_destination() {
        let req = BundleRequest {
            origin: None,
            destination: "Los Angeles".to_string(),
            departure_date: Utc::now(),
            return_date: None,
            budget: 1000.0,
            preferences: BundlePreferences::default(),
            constraints: BundleConstraints::default(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn validate_rejects_non_positive_budget() {
        let mut req = BundleRequest {
            origin: Some("JFK".to_string()),
            destination: "LAX".to_string(),
            departure_date: Utc::now(),
            return_date: None,
            budget: 0.0,
            preferences: BundlePreferences::default(),
            constraints: BundleConstraints::default(),
        };
        assert!(req.validate().is_err());
        req.budget = 500.0;
        assert!(req.validate().is_ok());
    }

    #[test]
    fn validate_accepts_well_formed_request() {
        let req = BundleRequest {
            origin: Some("JFK".to_string()),
            destination: "LAX".to_string(),
            departure_date: Utc::now(),
            return_date: None,
            budget: 1500.0,
            preferences: BundlePreferences {
                hotel_star_rating: Some(vec![4, 5]),
                ..Default::default()
            },
            constraints: BundleConstraints::default(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn watch_request_validate_rejects_non_positive_ceiling() {
        let watch = WatchRequestCreate {
            user_id: "u1".to_string(),
            destination: "LAX".to_string(),
            budget_ceiling: 0.0,
            min_fit_score: 60.0,
            notify_on_inventory_below: Some(5),
        };
        assert!(watch.validate().is_err());
    }

    #[test]
    fn watch_request_validate_accepts_well_formed_request() {
        let watch = WatchRequestCreate {
            user_id: "u1".to_string(),
            destination: "LAX".to_string(),
            budget_ceiling: 300.0,
            min_fit_score: 60.0,
            notify_on_inventory_below: Some(5),
        };
        assert!(watch.validate().is_ok());
    }
}
