//! Route handler logic, transport-agnostic: plain async functions over
//! the `AppContext`, each returning the uniform `ApiResponse<T>`
//! envelope. An external HTTP layer (axum or otherwise) mounts these
//! without this crate depending on one.

use crate::context::AppContext;
use crate::intent::IntentExtractor;
use crate::models::{
    ApiResponse, Bundle, BundleConstraints, BundlePreferences, BundleRequest, BundleResponse, ChatRequest,
    ExtractedIntent, Watch, WatchRequestCreate,
};
use chrono::Duration as ChronoDuration;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BundlesForUser {
    pub bundles: Vec<Bundle>,
    pub total_results: usize,
}

#[derive(Debug, Serialize)]
pub struct WatchCreated {
    pub watch_id: String,
}

#[derive(Debug, Serialize)]
pub struct UiDeal {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub title: String,
    pub description: &'static str,
    pub original_price: f64,
    pub discounted_price: f64,
    pub discount_percentage: f64,
    pub destination: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    pub score: f64,
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UiDealsResponse {
    pub deals: Vec<UiDeal>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub message: String,
    pub extracted_intent: ExtractedIntent,
    pub bundles: Option<BundleResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn health() -> ApiResponse<HealthStatus> {
    ApiResponse::ok(HealthStatus {
        status: "healthy",
        service: "concierge-svc",
    })
}

pub async fn create_bundles(
    ctx: &AppContext,
    request: BundleRequest,
    user_id: Option<&str>,
) -> ApiResponse<BundleResponse> {
    if let Err(e) = request.validate() {
        return ApiResponse::err(e.to_string());
    }
    match ctx.bundle_engine.generate(request, user_id).await {
        Ok(response) => ApiResponse::ok(response),
        Err(e) => {
            log::warn!("create_bundles failed: {}", e);
            ApiResponse::err(e.to_string())
        }
    }
}

pub async fn bundles_for_user(ctx: &AppContext, user_id: &str) -> ApiResponse<BundlesForUser> {
    match ctx.deal_cache.bundles_for_user(user_id, 10).await {
        Ok(bundles) => ApiResponse::ok(BundlesForUser {
            total_results: bundles.len(),
            bundles,
        }),
        Err(e) => ApiResponse::err(e.to_string()),
    }
}

pub async fn create_watch(ctx: &AppContext, payload: WatchRequestCreate) -> ApiResponse<WatchCreated> {
    if let Err(e) = payload.validate() {
        return ApiResponse::err(e.to_string());
    }
    match ctx.deal_cache.create_watch(payload).await {
        Ok(Watch { watch_id, .. }) => ApiResponse::ok(WatchCreated { watch_id }),
        Err(e) => ApiResponse::err(e.to_string()),
    }
}

/// UI-flattened deal records. Reads `tags` once, resolving the
/// duplicate-key quirk in the original flattener.
pub async fn list_deals(ctx: &AppContext, destination: Option<&str>) -> ApiResponse<UiDealsResponse> {
    match ctx.deal_cache.top_deals(destination, 50).await {
        Ok(deals) => {
            let ui_deals = deals
                .into_iter()
                .map(|d| UiDeal {
                    id: d.deal_id.clone(),
                    kind: d.kind.as_str(),
                    title: if d.summary.is_empty() {
                        format!("Deal {}", d.deal_id)
                    } else {
                        d.summary.clone()
                    },
                    description: "",
                    original_price: d.price.original,
                    discounted_price: d.price.deal,
                    discount_percentage: d.price.discount_percent,
                    destination: d.destination.clone(),
                    expires_at: d.valid_until,
                    score: d.score,
                    tags: d.tags.into_iter().collect(),
                })
                .collect();
            ApiResponse::ok(UiDealsResponse { deals: ui_deals })
        }
        Err(e) => ApiResponse::err(e.to_string()),
    }
}

/// Extracts intent from free text, reconstructs a `BundleRequest`
/// preferring the extractor's own `return_date` over the
/// `departure_date + 3 days` fallback, and generates bundles.
pub async fn chat(ctx: &AppContext, payload: ChatRequest) -> ApiResponse<ChatReply> {
    let intent = match ctx.intent_extractor.extract(&payload.message).await {
        Ok(intent) => intent,
        Err(e) => {
            // Intent extraction failure degrades to a successful envelope
            // carrying the error inline, echoing the (empty) partial intent,
            // per the boundary policy: never surface this as a transport error.
            return ApiResponse::ok(ChatReply {
                message: "I couldn't process that request right now.".to_string(),
                extracted_intent: ExtractedIntent::default(),
                bundles: None,
                error: Some(e.to_string()),
            });
        }
    };

    let (Some(destination), Some(departure_date)) = (intent.destination.clone(), intent.departure_date) else {
        return ApiResponse::ok(ChatReply {
            message: "Could not understand destination or travel dates. Please specify where and when you'd \
                      like to go."
                .to_string(),
            extracted_intent: intent.clone(),
            bundles: None,
            error: Some("could not extract destination or departure_date".to_string()),
        });
    };

    let request = BundleRequest {
        origin: intent.origin.clone(),
        destination,
        departure_date,
        return_date: Some(intent.return_date.unwrap_or(departure_date + ChronoDuration::days(3))),
        budget: intent.budget.unwrap_or(1000.0),
        preferences: BundlePreferences {
            flight_class: intent
                .preferences
                .flight_class
                .clone()
                .or_else(|| Some("economy".to_string())),
            hotel_star_rating: intent.preferences.hotel_star_rating.clone(),
            amenities: intent.preferences.amenities.clone(),
            pet_friendly: intent.preferences.pet_friendly,
            avoid_red_eye: intent.preferences.avoid_red_eye,
        },
        constraints: BundleConstraints {
            adults: intent.adults.unwrap_or(1),
            children: intent.children.unwrap_or(0),
            rooms: 1,
        },
    };

    match ctx.bundle_engine.generate(request, payload.user_id.as_deref()).await {
        Ok(bundles) => ApiResponse::ok(ChatReply {
            message: format!("Found {} travel packages for you!", bundles.bundles.len()),
            extracted_intent: intent,
            bundles: Some(bundles),
            error: None,
        }),
        Err(e) => {
            log::warn!("chat bundle generation failed: {}", e);
            ApiResponse::ok(ChatReply {
                message: "Found travel packages but something went wrong while computing them.".to_string(),
                extracted_intent: intent,
                bundles: None,
                error: Some(e.to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_healthy() {
        let response = health().await;
        assert!(response.success);
        assert_eq!(response.data.unwrap().status, "healthy");
    }
}
