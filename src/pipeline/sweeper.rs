//! Retention Sweeper
//!
//! Periodically evicts finished requests once their retention has passed and,
//! when a TTL is configured, requests that never finished.

use crate::tracking::tree::CompletionTree;
use crate::tracking::types::{now_ms, RequestId};

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// How long a finished request stays queryable.
    pub finished_retention: Duration,
    /// Age after which an unfinished request is dropped. `None` keeps it forever.
    pub abandoned_ttl: Option<Duration>,
    pub sweep_interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            finished_retention: Duration::from_secs(300),
            abandoned_ttl: None,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Evicts every request due at `now` and returns their ids.
pub fn sweep_once(tree: &CompletionTree, policy: &RetentionPolicy, now: u64) -> Vec<RequestId> {
    let due = tree.expired(now, policy.finished_retention, policy.abandoned_ttl);

    due.into_iter()
        .filter(|request_id| match tree.evict(request_id) {
            Ok(()) => true,
            // Evicted concurrently by someone else.
            Err(_) => false,
        })
        .collect()
}

/// Spawns the sweep loop.
pub fn spawn_sweeper(tree: Arc<CompletionTree>, policy: RetentionPolicy) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(policy.sweep_interval);

        loop {
            interval.tick().await;

            let evicted = sweep_once(&tree, &policy, now_ms());
            if !evicted.is_empty() {
                tracing::info!(
                    "Sweeper evicted {} requests, {} still tracked",
                    evicted.len(),
                    tree.request_count()
                );
            }
        }
    })
}
