//! MyTunnel Collections - pipeline runner
//!
//! Pushes pooled buffers from producer threads through a bounded queue into
//! an async batching consumer, then prints the final counters as JSON.

use anyhow::{Context, Result};
use crossbeam::utils::Backoff;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use mytunnel_collections::metrics::METRICS;
use mytunnel_collections::{BoundedQueue, BufferPool, Config, VERSION};

type PayloadQueue = BoundedQueue<Box<[u8]>>;

/// Application entry point
#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("collections.toml"));

    // Load configuration
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Initialize tracing/logging
    mytunnel_collections::util::init_tracing(&config.logging)?;

    info!(
        version = VERSION,
        config_path = ?config_path,
        "Starting pipeline run"
    );

    // Initialize metrics if enabled
    if config.metrics.enabled {
        mytunnel_collections::metrics::init_metrics(&config.metrics)?;
        info!(
            bind_addr = %config.metrics.bind_addr,
            "Metrics endpoint started"
        );
    }

    let queue: Arc<PayloadQueue> = Arc::new(config.queue.build()?);
    let pool = config.pool.build();
    let workload = &config.workload;
    let producers = workload.effective_producers();
    let expected = producers * workload.items_per_producer;

    info!(
        producers,
        items = expected,
        capacity = queue.capacity(),
        batch_threshold = queue.batch_threshold(),
        "Pipeline configured"
    );

    let started = Instant::now();
    let handles = (0..producers)
        .map(|id| {
            spawn_producer(
                id,
                workload.items_per_producer,
                workload.payload_size,
                queue.clone(),
                pool.clone(),
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let consumed = consume(&queue, &pool, expected, workload.wait_timeout(), &handles).await?;

    tokio::task::spawn_blocking(move || {
        for handle in handles {
            if handle.join().is_err() {
                warn!("Producer thread panicked");
            }
        }
    })
    .await?;

    info!(
        items = consumed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        rented_bytes = pool.rented(),
        "Pipeline run finished"
    );

    println!("{}", serde_json::to_string_pretty(&METRICS.snapshot())?);
    Ok(())
}

/// Start a producer thread that rents, stamps and enqueues `items` payloads
fn spawn_producer(
    id: usize,
    items: usize,
    payload_size: usize,
    queue: Arc<PayloadQueue>,
    pool: BufferPool,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name(format!("producer-{id}"))
        .spawn(move || {
            let backoff = Backoff::new();
            let mut rejected = 0u64;

            for seq in 0..items {
                let mut payload = pool.rent(payload_size);
                let stamp = (seq as u64).to_le_bytes();
                let len = stamp.len().min(payload.len());
                payload[..len].copy_from_slice(&stamp[..len]);

                // Full queue: back off and retry with the same payload.
                while let Err(returned) = queue.try_add(payload) {
                    payload = returned;
                    rejected += 1;
                    backoff.snooze();
                }
                backoff.reset();
            }

            debug!(producer = id, items, rejected, "Producer finished");
        })
        .with_context(|| format!("Failed to spawn producer {id}"))?;

    Ok(handle)
}

/// Drain until `expected` items were consumed, handing buffers back to the pool
async fn consume(
    queue: &PayloadQueue,
    pool: &BufferPool,
    expected: usize,
    timeout: Duration,
    producers: &[JoinHandle<()>],
) -> Result<usize> {
    let mut batch = Vec::with_capacity(queue.capacity());
    let mut consumed = 0;

    while consumed < expected {
        let ready = queue.try_wait_for_batch(timeout).await || queue.try_wait_for_items(timeout).await;
        if !ready {
            if producers.iter().all(JoinHandle::is_finished) && queue.is_empty() {
                anyhow::bail!("producers stopped after {consumed} of {expected} items");
            }
            debug!(consumed, "Consumer idle");
            continue;
        }

        consumed += queue.drain_into(&mut batch, queue.capacity());
        for buffer in batch.drain(..) {
            if let Err(e) = pool.return_buffer(buffer) {
                warn!(error = %e, "Buffer not returned to pool");
            }
        }
    }

    Ok(consumed)
}
