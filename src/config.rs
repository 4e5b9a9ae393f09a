//! Service Configuration
//!
//! Command line flags, each with an environment variable fallback so the
//! service can be configured the same way in a container or a shell.

use crate::messaging::protocol::{DEFAULT_PAGE_TOPIC, DEFAULT_PUBSUB_NAME};
use crate::pipeline::sweeper::RetentionPolicy;
use crate::pipeline::worker::WorkerSettings;

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;

/// Where page work-items are published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BusKind {
    /// In-process channel drained by a local simulated worker pool.
    Local,
    /// Dapr sidecar pub/sub; workers acknowledge over HTTP.
    Dapr,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "pagetrack", version, about = "Page fan-out and completion tracking service")]
pub struct Config {
    /// Address the HTTP server binds to.
    #[arg(long, env = "PAGETRACK_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    #[arg(long, env = "PAGETRACK_BUS", value_enum, default_value_t = BusKind::Local)]
    pub bus: BusKind,

    /// Base URL of the Dapr sidecar HTTP API.
    #[arg(long, env = "DAPR_HTTP_ENDPOINT", default_value = "http://127.0.0.1:3500")]
    pub dapr_url: String,

    #[arg(long, env = "PAGETRACK_PUBSUB", default_value = DEFAULT_PUBSUB_NAME)]
    pub pubsub_name: String,

    #[arg(long, env = "PAGETRACK_TOPIC", default_value = DEFAULT_PAGE_TOPIC)]
    pub topic: String,

    /// Local worker pool size (local bus only).
    #[arg(long, env = "PAGETRACK_WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Upper bound of the simulated per-page processing delay.
    #[arg(long, env = "PAGETRACK_MAX_WORK_DELAY_MS", default_value_t = 250)]
    pub max_work_delay_ms: u64,

    /// Probability that a local worker acknowledges a page twice.
    #[arg(long, env = "PAGETRACK_DUPLICATE_RATE", default_value_t = 0.0)]
    pub duplicate_rate: f64,

    /// Capacity of the local work-item channel.
    #[arg(long, env = "PAGETRACK_QUEUE_CAPACITY", default_value_t = 1024)]
    pub queue_capacity: usize,

    /// Largest accepted upload body.
    #[arg(long, env = "PAGETRACK_MAX_UPLOAD_BYTES", default_value_t = 1024 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// How long finished requests stay queryable.
    #[arg(long, env = "PAGETRACK_FINISHED_RETENTION_SECS", default_value_t = 300)]
    pub finished_retention_secs: u64,

    /// Evict unfinished requests after this age. Unset keeps them until evicted explicitly.
    #[arg(long, env = "PAGETRACK_ABANDONED_TTL_SECS")]
    pub abandoned_ttl_secs: Option<u64>,

    #[arg(long, env = "PAGETRACK_SWEEP_INTERVAL_SECS", default_value_t = 30)]
    pub sweep_interval_secs: u64,
}

impl Config {
    /// Rejects values clap cannot check on its own.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=1.0).contains(&self.duplicate_rate) {
            anyhow::bail!(
                "duplicate rate must be within [0, 1], got {}",
                self.duplicate_rate
            );
        }
        if self.sweep_interval_secs == 0 {
            anyhow::bail!("sweep interval must be at least one second");
        }
        Ok(())
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            finished_retention: Duration::from_secs(self.finished_retention_secs),
            abandoned_ttl: self.abandoned_ttl_secs.map(Duration::from_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            worker_count: self.workers,
            max_delay: Duration::from_millis(self.max_work_delay_ms),
            duplicate_rate: self.duplicate_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["pagetrack"]).unwrap();

        assert_eq!(config.bus, BusKind::Local);
        assert_eq!(config.topic, "NewFileUploaded");
        assert_eq!(config.retention().abandoned_ttl, None);
        assert_eq!(
            config.worker_settings().max_delay,
            Duration::from_millis(250)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = Config::try_parse_from([
            "pagetrack",
            "--bus",
            "dapr",
            "--bind",
            "0.0.0.0:8080",
            "--abandoned-ttl-secs",
            "600",
            "--duplicate-rate",
            "1.5",
        ])
        .unwrap();

        assert_eq!(config.bus, BusKind::Dapr);
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(
            config.retention().abandoned_ttl,
            Some(Duration::from_secs(600))
        );
        assert!(config.validate().is_err());
    }
}
