use thiserror::Error;

/// Typed errors surfaced at the boundaries callers must match on.
///
/// Everywhere else in this crate uses `anyhow::Result`; this enum exists
/// only for the seams where a caller needs to distinguish failure modes
/// (request validation, upstream search adapters, intent extraction).
#[derive(Debug, Error)]
pub enum ConciergeError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("upstream search exhausted for {service}: {source}")]
    UpstreamExhausted {
        service: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("durable store unavailable: {0}")]
    StoreUnavailable(#[source] anyhow::Error),

    #[error("intent extraction failed: {0}")]
    IntentExtraction(String),
}
