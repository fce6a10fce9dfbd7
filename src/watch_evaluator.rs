//! Watch evaluator: a strictly sequential tick loop (never spawned
//! concurrently with itself) that matches standing watches against the
//! current top deals and fans alerts out through the connection registry.
//!
//! Tick loop shape is a warm-up tick followed by `interval`-driven
//! retries with a failure counter; the matching algorithm mirrors
//! `evaluate_watches` from the deal-cache service this was ported from.

use crate::connection_registry::ConnectionRegistry;
use crate::deal_cache::DealCache;
use crate::metrics;
use crate::models::{Deal, Watch, WatchEvent};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration};

pub struct WatchEvaluator {
    deal_cache: DealCache,
    registry: Arc<ConnectionRegistry>,
    poll_interval: Duration,
}

impl WatchEvaluator {
    pub fn new(deal_cache: DealCache, registry: Arc<ConnectionRegistry>, poll_interval_seconds: u64) -> Self {
        Self {
            deal_cache,
            registry,
            poll_interval: Duration::from_secs(poll_interval_seconds),
        }
    }

    /// Runs the tick loop until `shutdown` is signalled. Cooperative
    /// cancellation only takes effect at the next sleep boundary, never
    /// mid-tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        log::info!("watch evaluator stopping");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        metrics::increment_watch_evaluator_tick_error();
                        log::warn!("watch evaluator tick failed, will retry next interval: {}", e);
                    }
                }
            }
        }
    }

    /// One evaluation: snapshot active watches, fetch top deals with no
    /// destination filter, group by destination, find at most one
    /// triggering deal per watch, batch-deactivate, then broadcast.
    pub async fn tick(&self) -> anyhow::Result<()> {
        let watches = self.deal_cache.active_watches().await?;
        if watches.is_empty() {
            return Ok(());
        }

        let deals = self.deal_cache.top_deals(None, 5).await?;
        let mut by_destination: HashMap<&str, Vec<&Deal>> = HashMap::new();
        for deal in &deals {
            by_destination.entry(deal.destination.as_str()).or_default().push(deal);
        }

        let triggered = Self::find_triggers(&watches, &by_destination);
        if triggered.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let watch_ids: Vec<String> = triggered.iter().map(|(w, _)| w.watch_id.clone()).collect();
        self.deal_cache.deactivate_watches(&watch_ids).await?;

        for (watch, deal) in triggered {
            metrics::increment_watch_trigger();
            let event = WatchEvent {
                watch_id: watch.watch_id.clone(),
                user_id: watch.user_id.clone(),
                deal: deal.clone(),
                triggered_at: now,
            };
            let payload = serde_json::json!({
                "type": "deal_alert",
                "data": {
                    "watch_id": event.watch_id,
                    "user_id": event.user_id,
                    "destination": watch.destination,
                    "message": format!("Deal {} now ${:.2}", deal.deal_id, deal.price.deal),
                    "triggered_at": event.triggered_at,
                },
            });
            self.registry.broadcast(Some(&watch.user_id), payload).await;
        }

        Ok(())
    }

    /// First deal per watch whose destination bucket has a deal priced at
    /// or below the watch's budget ceiling. At most one trigger per watch.
    fn find_triggers<'a>(
        watches: &'a [Watch],
        by_destination: &HashMap<&str, Vec<&'a Deal>>,
    ) -> Vec<(&'a Watch, &'a Deal)> {
        let mut triggered = Vec::new();
        for watch in watches {
            if let Some(deals) = by_destination.get(watch.destination.as_str()) {
                if let Some(deal) = deals.iter().find(|d| d.price.deal <= watch.budget_ceiling) {
                    triggered.push((watch, *deal));
                }
            }
        }
        triggered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DealKind, Price};
    use chrono::Utc;

    fn sample_deal(id: &str, destination: &str, price: f64) -> Deal {
        Deal {
            deal_id: id.to_string(),
            kind: DealKind::Hotel,
            destination: destination.to_string(),
            summary: "Test deal".to_string(),
            price: Price::new(price * 2.0, price),
            score: 70.0,
            tags: Default::default(),
            inventory: None,
            valid_until: Utc::now() + chrono::Duration::days(3),
            route: None,
            raw_payload: serde_json::json!({}),
            updated_at: Utc::now(),
        }
    }

    fn sample_watch(id: &str, destination: &str, ceiling: f64) -> Watch {
        Watch {
            watch_id: id.to_string(),
            user_id: format!("user-{id}"),
            destination: destination.to_string(),
            budget_ceiling: ceiling,
            min_fit_score: 60.0,
            notify_on_inventory_below: Some(5),
            active: true,
            created_at: Utc::now(),
            last_triggered_at: None,
        }
    }

    #[test]
    fn triggers_when_deal_under_ceiling() {
        let watches = vec![sample_watch("w1", "LAX", 300.0)];
        let deal = sample_deal("d1", "LAX", 250.0);
        let mut by_dest: HashMap<&str, Vec<&Deal>> = HashMap::new();
        by_dest.insert("LAX", vec![&deal]);

        let triggered = WatchEvaluator::find_triggers(&watches, &by_dest);
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].1.deal_id, "d1");
    }

    #[test]
    fn does_not_trigger_when_over_ceiling() {
        let watches = vec![sample_watch("w1", "LAX", 100.0)];
        let deal = sample_deal("d1", "LAX", 250.0);
        let mut by_dest: HashMap<&str, Vec<&Deal>> = HashMap::new();
        by_dest.insert("LAX", vec![&deal]);

        let triggered = WatchEvaluator::find_triggers(&watches, &by_dest);
        assert!(triggered.is_empty());
    }

    #[test]
    fn at_most_one_trigger_per_watch() {
        let watches = vec![sample_watch("w1", "LAX", 300.0)];
        let deal_a = sample_deal("d1", "LAX", 250.0);
        let deal_b = sample_deal("d2", "LAX", 200.0);
        let mut by_dest: HashMap<&str, Vec<&Deal>> = HashMap::new();
        by_dest.insert("LAX", vec![&deal_a, &deal_b]);

        let triggered = WatchEvaluator::find_triggers(&watches, &by_dest);
        assert_eq!(triggered.len(), 1);
        assert_eq!(triggered[0].1.deal_id, "d1");
    }

    #[test]
    fn ignores_watches_with_no_matching_destination() {
        let watches = vec![sample_watch("w1", "JFK", 300.0)];
        let deal = sample_deal("d1", "LAX", 250.0);
        let mut by_dest: HashMap<&str, Vec<&Deal>> = HashMap::new();
        by_dest.insert("LAX", vec![&deal]);

        assert!(WatchEvaluator::find_triggers(&watches, &by_dest).is_empty());
    }
}
