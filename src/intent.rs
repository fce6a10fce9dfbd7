//! Natural-language intent extraction: an HTTP-backed extractor (an
//! Ollama-style local model server) with a deterministic keyword-scanning
//! fallback used when the model call fails.

use crate::models::{BundlePreferences, ExtractedIntent};
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use serde_json::json;
use std::time::Duration;

#[async_trait]
pub trait IntentExtractor: Send + Sync {
    async fn extract(&self, message: &str) -> Result<ExtractedIntent>;
}

pub struct HttpIntentExtractor {
    http: reqwest::Client,
    base_url: String,
    model: String,
    retry: RetryPolicy,
}

impl HttpIntentExtractor {
    pub fn new(http: reqwest::Client, base_url: String, model: String) -> Self {
        Self {
            http,
            base_url,
            model,
            retry: RetryPolicy::default(),
        }
    }

    fn prompt(message: &str) -> String {
        format!(
            "Extract a travel request as JSON with keys origin, destination, \
             departure_date, return_date, budget, adults, children, preferences \
             from this message: \"{}\". Respond with JSON only.",
            message
        )
    }
}

#[async_trait]
impl IntentExtractor for HttpIntentExtractor {
    async fn extract(&self, message: &str) -> Result<ExtractedIntent> {
        #[derive(serde::Deserialize)]
        struct OllamaResponse {
            response: String,
        }

        let url = format!("{}/api/generate", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": Self::prompt(message),
            "stream": false,
        });

        let result = self
            .retry
            .run(|| async {
                self.http
                    .post(&url)
                    .json(&body)
                    .timeout(Duration::from_secs(10))
                    .send()
                    .await
                    .context("intent extractor request failed")?
                    .error_for_status()
                    .context("intent extractor returned an error status")?
                    .json::<OllamaResponse>()
                    .await
                    .context("failed to parse intent extractor response")
            })
            .await;

        // Both a model-unreachable retry exhaustion and a malformed model
        // response degrade to the keyword-scan fallback rather than
        // propagating — the model endpoint is an external collaborator the
        // chat flow must stay usable without.
        match result {
            Ok(raw) => Ok(parse_model_output(&raw.response).unwrap_or_else(|_| fallback_extraction(message))),
            Err(e) => {
                log::warn!("intent extractor unreachable, using keyword fallback: {}", e);
                Ok(fallback_extraction(message))
            }
        }
    }
}

fn parse_model_output(text: &str) -> Result<ExtractedIntent> {
    let start = text.find('{').context("no JSON object in model output")?;
    let end = text.rfind('}').context("no JSON object in model output")?;
    let json_slice = &text[start..=end];
    let mut intent: ExtractedIntent =
        serde_json::from_str(json_slice).context("failed to parse extracted intent JSON")?;

    if intent.return_date.is_none() {
        if let Some(departure) = intent.departure_date {
            intent.return_date = Some(departure + ChronoDuration::days(3));
        }
    }
    Ok(intent)
}

static DESTINATION_WORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "paris", "tokyo", "london", "rome", "madrid", "cancun", "miami", "denver", "austin",
        "seattle",
    ]
});

/// Best-effort keyword scan used when the model is unreachable. Mirrors
/// the original system's regex-based fallback: coarse, but always returns
/// something rather than propagating an error to the caller.
fn fallback_extraction(message: &str) -> ExtractedIntent {
    let lower = message.to_lowercase();
    let destination = DESTINATION_WORDS
        .iter()
        .find(|city| lower.contains(*city))
        .map(|city| capitalize(city));

    let budget = lower
        .split_whitespace()
        .filter_map(|token| token.trim_start_matches('$').parse::<f64>().ok())
        .find(|v| *v >= 100.0);

    ExtractedIntent {
        origin: None,
        destination,
        departure_date: None,
        return_date: None,
        budget,
        adults: Some(1),
        children: Some(0),
        preferences: BundlePreferences::default(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_finds_known_destination() {
        let intent = fallback_extraction("I want to go to Paris next month with $1500");
        assert_eq!(intent.destination, Some("Paris".to_string()));
        assert_eq!(intent.budget, Some(1500.0));
    }

    #[test]
    fn fallback_returns_none_destination_when_unrecognized() {
        let intent = fallback_extraction("take me somewhere nice");
        assert_eq!(intent.destination, None);
    }

    #[test]
    fn parse_model_output_fills_missing_return_date() {
        let departure = Utc::now();
        let text = format!(
            "{{\"destination\":\"LAX\",\"departure_date\":\"{}\"}}",
            departure.to_rfc3339()
        );
        let intent = parse_model_output(&text).unwrap();
        assert!(intent.return_date.is_some());
        assert_eq!(
            intent.return_date.unwrap() - intent.departure_date.unwrap(),
            ChronoDuration::days(3)
        );
    }
}
