//! Prometheus metrics exporter
//!
//! HTTP endpoint for Prometheus scraping.

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::time::Duration;

use super::counters::{MetricsSnapshot, METRICS};
use crate::config::MetricsConfig;

/// Initialize the Prometheus metrics exporter
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(config: &MetricsConfig) -> Result<()> {
    describe_counter!("collections_queue_adds_accepted", "Items accepted by bounded queues");
    describe_counter!("collections_queue_adds_rejected", "Adds refused because a queue was full");
    describe_counter!("collections_queue_drains", "Non-empty drain calls");
    describe_counter!("collections_queue_items_drained", "Items removed by drains");
    describe_counter!("collections_pool_hits", "Rents served from a bucket");
    describe_counter!("collections_pool_misses", "Rents that allocated a poolable buffer");
    describe_counter!("collections_pool_oversized", "Rents above the largest pooled size");
    describe_counter!("collections_pool_returns_stored", "Returns stored in a bucket");
    describe_counter!("collections_pool_returns_dropped", "Returns dropped by a full bucket");
    describe_gauge!("collections_pool_rented_bytes", "Bytes rented from all buffer pools");

    PrometheusBuilder::new()
        .with_http_listener(config.bind_addr)
        .install()?;

    // Start background task to sync atomic counters to metrics crate
    tokio::spawn(sync_metrics_task());

    Ok(())
}

/// Background task that periodically syncs our atomic counters to the metrics crate
async fn sync_metrics_task() {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut last = MetricsSnapshot::default();

    loop {
        interval.tick().await;

        let now = METRICS.snapshot();

        publish_delta("collections_queue_adds_accepted", now.queue_adds_accepted, last.queue_adds_accepted);
        publish_delta("collections_queue_adds_rejected", now.queue_adds_rejected, last.queue_adds_rejected);
        publish_delta("collections_queue_drains", now.queue_drains, last.queue_drains);
        publish_delta("collections_queue_items_drained", now.queue_items_drained, last.queue_items_drained);
        publish_delta("collections_pool_hits", now.pool_hits, last.pool_hits);
        publish_delta("collections_pool_misses", now.pool_misses, last.pool_misses);
        publish_delta("collections_pool_oversized", now.pool_oversized, last.pool_oversized);
        publish_delta("collections_pool_returns_stored", now.pool_returns_stored, last.pool_returns_stored);
        publish_delta("collections_pool_returns_dropped", now.pool_returns_dropped, last.pool_returns_dropped);

        gauge!("collections_pool_rented_bytes").set(now.pool_rented_bytes as f64);

        last = now;
    }
}

fn publish_delta(name: &'static str, current: u64, last: u64) {
    let delta = current.saturating_sub(last);
    if delta > 0 {
        counter!(name).increment(delta);
    }
}
