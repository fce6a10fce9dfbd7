//! Deal ingestion pipeline: five serial stages executed on a 5-minute
//! tick (ingest, normalize, score, tag, persist & emit), each stage a
//! plain function over the previous stage's output.

mod csv_sources;
mod pipeline;

pub use pipeline::{IngestionPipeline, RawDeal};
