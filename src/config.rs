//! Configuration management
//!
//! Loads queue, pool and workload settings from TOML files and builds the
//! primitives they describe.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::pool::{BufferPool, DEFAULT_MAX_BUFFERS_PER_BUCKET, DEFAULT_MAX_BUFFER_SIZE};
use crate::queue::BoundedQueue;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub queue: QueueConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Bounded queue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of queued items
    pub capacity: usize,
    /// Items needed for a batch wait to resolve (defaults to capacity)
    #[serde(default)]
    pub batch_threshold: Option<usize>,
}

impl QueueConfig {
    /// Build a queue from this configuration
    pub fn build<T: Send>(&self) -> Result<BoundedQueue<T>> {
        let queue = match self.batch_threshold {
            Some(threshold) => BoundedQueue::with_batch_threshold(self.capacity, threshold)?,
            None => BoundedQueue::new(self.capacity),
        };
        Ok(queue)
    }
}

/// Buffer pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// Largest buffer size kept in the pool
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,
    /// LIFO depth per size class
    #[serde(default = "default_max_buffers_per_bucket")]
    pub max_buffers_per_bucket: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: default_max_buffer_size(),
            max_buffers_per_bucket: default_max_buffers_per_bucket(),
        }
    }
}

impl PoolConfig {
    /// Build a pool from this configuration
    pub fn build(&self) -> BufferPool {
        BufferPool::new(self.max_buffer_size, self.max_buffers_per_bucket)
    }
}

/// Producer/consumer workload driven by the demo binary
#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadConfig {
    /// Number of producer threads (0 = auto)
    #[serde(default)]
    pub producers: usize,
    /// Items each producer enqueues
    #[serde(default = "default_items_per_producer")]
    pub items_per_producer: usize,
    /// Payload size rented from the pool per item
    #[serde(default = "default_payload_size")]
    pub payload_size: usize,
    /// Consumer wait timeout in milliseconds
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            producers: 0,
            items_per_producer: default_items_per_producer(),
            payload_size: default_payload_size(),
            wait_timeout_ms: default_wait_timeout_ms(),
        }
    }
}

impl WorkloadConfig {
    /// Get effective producer count (auto-detect if 0)
    pub fn effective_producers(&self) -> usize {
        if self.producers == 0 {
            num_cpus::get()
        } else {
            self.producers
        }
    }

    /// Consumer wait timeout
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics endpoint
    #[serde(default)]
    pub enabled: bool,
    /// Metrics server bind address
    #[serde(default = "default_metrics_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_addr: default_metrics_addr(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_max_buffer_size() -> usize { DEFAULT_MAX_BUFFER_SIZE }
fn default_max_buffers_per_bucket() -> usize { DEFAULT_MAX_BUFFERS_PER_BUCKET }
fn default_items_per_producer() -> usize { 100_000 }
fn default_payload_size() -> usize { 512 }
fn default_wait_timeout_ms() -> u64 { 100 }
fn default_metrics_addr() -> SocketAddr { SocketAddr::from(([127, 0, 0, 1], 9090)) }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .with_context(|| "Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.queue.capacity == 0 {
            anyhow::bail!("queue.capacity must be > 0");
        }
        if let Some(threshold) = self.queue.batch_threshold {
            if threshold == 0 || threshold > self.queue.capacity {
                anyhow::bail!("queue.batch_threshold must be in 1..=queue.capacity");
            }
        }
        if self.pool.max_buffers_per_bucket == 0 {
            anyhow::bail!("pool.max_buffers_per_bucket must be > 0");
        }
        if self.workload.payload_size == 0 {
            anyhow::bail!("workload.payload_size must be > 0");
        }
        if self.workload.wait_timeout_ms == 0 {
            anyhow::bail!("workload.wait_timeout_ms must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml("[queue]\ncapacity = 64\n").unwrap();

        assert_eq!(config.queue.capacity, 64);
        assert_eq!(config.queue.batch_threshold, None);
        assert_eq!(config.pool.max_buffer_size, DEFAULT_MAX_BUFFER_SIZE);
        assert_eq!(config.pool.max_buffers_per_bucket, DEFAULT_MAX_BUFFERS_PER_BUCKET);
        assert!(!config.metrics.enabled);
        assert_eq!(config.logging.level, "info");
        assert!(config.workload.effective_producers() > 0);
    }

    #[test]
    fn test_full_config_builds_primitives() {
        let config = Config::from_toml(
            r#"
            [queue]
            capacity = 128
            batch_threshold = 32

            [pool]
            max_buffer_size = 4096
            max_buffers_per_bucket = 8

            [workload]
            producers = 2
            items_per_producer = 10
            payload_size = 100
            wait_timeout_ms = 5

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        let queue = config.queue.build::<Box<[u8]>>().unwrap();
        assert_eq!(queue.capacity(), 128);
        assert_eq!(queue.batch_threshold(), 32);

        let pool = config.pool.build();
        assert_eq!(pool.max_buffer_size(), 4096);

        assert_eq!(config.workload.effective_producers(), 2);
        assert_eq!(config.workload.wait_timeout(), Duration::from_millis(5));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(Config::from_toml("[queue]\ncapacity = 0\n").is_err());
        assert!(Config::from_toml("[queue]\ncapacity = 4\nbatch_threshold = 5\n").is_err());
        assert!(Config::from_toml("[queue]\ncapacity = 4\n[pool]\nmax_buffers_per_bucket = 0\n").is_err());
        assert!(Config::from_toml("not toml").is_err());
    }
}
