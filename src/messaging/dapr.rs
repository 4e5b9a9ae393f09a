//! Dapr Publisher
//!
//! Publishes work items through a Dapr sidecar's HTTP pub/sub API:
//! `POST {base}/v1.0/publish/{pubsub}/{topic}` with the item as JSON body.
//! Transient transport errors are retried with exponential backoff and jitter;
//! a non-2xx answer from the sidecar is reported as `Rejected` without retry.

use super::bus::{MessageBus, PublishError, PublishFuture};
use super::protocol::PageWorkItem;

use std::time::Duration;

const PUBLISH_TIMEOUT: Duration = Duration::from_millis(2000);
const PUBLISH_ATTEMPTS: usize = 3;

pub struct DaprBus {
    publish_url: String,
    http_client: reqwest::Client,
}

impl DaprBus {
    pub fn new(base_url: &str, pubsub_name: &str, topic: &str) -> Self {
        Self {
            publish_url: Self::publish_url(base_url, pubsub_name, topic),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn publish_url(base_url: &str, pubsub_name: &str, topic: &str) -> String {
        format!(
            "{}/v1.0/publish/{}/{}",
            base_url.trim_end_matches('/'),
            pubsub_name,
            topic
        )
    }

    async fn post_with_retry<T: serde::Serialize>(
        &self,
        payload: &T,
        timeout: Duration,
        attempts: usize,
    ) -> Result<reqwest::Response, PublishError> {
        let mut delay_ms = 150u64;

        for attempt in 0..attempts {
            let response = self
                .http_client
                .post(&self.publish_url)
                .json(payload)
                .timeout(timeout)
                .send()
                .await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == attempts {
                        return Err(PublishError::Transport(e.to_string()));
                    }
                    tracing::debug!("Publish attempt {} failed: {}", attempt + 1, e);
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
            }
        }

        Err(PublishError::Transport("retry attempts exhausted".to_string()))
    }
}

impl MessageBus for DaprBus {
    fn publish(&self, item: PageWorkItem) -> PublishFuture<'_> {
        Box::pin(async move {
            let response = self
                .post_with_retry(&item, PUBLISH_TIMEOUT, PUBLISH_ATTEMPTS)
                .await?;

            if !response.status().is_success() {
                return Err(PublishError::Rejected(response.status().as_u16()));
            }

            tracing::trace!(
                "Published page {} of {} to {}",
                item.page_number,
                item.file_name,
                self.publish_url
            );
            Ok(())
        })
    }
}
