//! Kafka topic bootstrap: reads a declarative YAML manifest and creates any
//! topic that does not already exist. Existing topics are skipped, not
//! treated as an error, so the bootstrap step is safe to run on every
//! deploy.

use anyhow::{Context, Result};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::types::RDKafkaErrorCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i32,
    #[serde(default = "default_retention_ms")]
    pub retention_ms: i64,
}

fn default_retention_ms() -> i64 {
    604_800_000 // 7 days
}

/// Any top-level key ending in `_events` is a list of topic specs; other
/// keys are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TopicManifest {
    #[serde(flatten)]
    pub categories: HashMap<String, Vec<TopicSpec>>,
}

impl TopicManifest {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("failed to parse topic manifest")
    }

    pub fn all_topics(&self) -> Vec<&TopicSpec> {
        self.categories
            .iter()
            .filter(|(category, _)| category.ends_with("_events"))
            .flat_map(|(_, topics)| topics.iter())
            .collect()
    }
}

/// Creates every topic in `manifest` against `bootstrap_servers`, skipping
/// ones that already exist. `compression.type=snappy` on every topic,
/// matching the source bootstrap script.
pub async fn bootstrap_topics(bootstrap_servers: &str, manifest: &TopicManifest) -> Result<()> {
    let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
        .set("bootstrap.servers", bootstrap_servers)
        .create()
        .context("failed to create Kafka admin client")?;

    let specs = manifest.all_topics();
    if specs.is_empty() {
        return Ok(());
    }

    let new_topics: Vec<NewTopic> = specs
        .iter()
        .map(|spec| {
            NewTopic::new(
                &spec.name,
                spec.partitions,
                TopicReplication::Fixed(spec.replication_factor),
            )
            .set("retention.ms", &spec.retention_ms.to_string())
            .set("compression.type", "snappy")
        })
        .collect();

    let options = AdminOptions::new().request_timeout(Some(Duration::from_secs(10)));
    let results = admin
        .create_topics(&new_topics, &options)
        .await
        .context("failed to submit topic creation request")?;

    for (spec, result) in specs.iter().zip(results) {
        match result {
            Ok(_) => log::info!("created topic {} ({} partitions)", spec.name, spec.partitions),
            Err((_, RDKafkaErrorCode::TopicAlreadyExists)) => {
                log::info!("topic {} already exists, skipping", spec.name);
            }
            Err((_, code)) => {
                log::warn!("failed to create topic {}: {:?}", spec.name, code);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_manifest_and_filters_event_categories() {
        let yaml = r#"
deal_events:
  - name: deal.events
    partitions: 6
    replication_factor: 1
    retention_ms: 604800000
raw_events:
  - name: deals.raw
    partitions: 3
    replication_factor: 1
other_config:
  - name: not_a_topic_list
"#;
        let manifest = TopicManifest::from_yaml(yaml).unwrap();
        let topics = manifest.all_topics();
        let names: Vec<&str> = topics.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"deal.events"));
        assert!(names.contains(&"deals.raw"));
        assert_eq!(topics.len(), 2);
    }

    #[test]
    fn default_retention_is_seven_days() {
        let yaml = r#"
deal_events:
  - name: deal.events
    partitions: 1
    replication_factor: 1
"#;
        let manifest = TopicManifest::from_yaml(yaml).unwrap();
        assert_eq!(manifest.all_topics()[0].retention_ms, 604_800_000);
    }
}
