//! HTTP webhook notifier.
//!
//! POSTs each event as a JSON envelope `{ "topic": ..., "event": ... }` to
//! the configured URL.

use std::time::Duration;

use armwatch_core::config::NotifyConfig;

use crate::traits::{Notifier, NotifyError, TelemetryEvent};

#[derive(Debug)]
pub struct WebhookNotifier {
    url: reqwest::Url,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Fails with [`NotifyError::Config`] unless `url` is an absolute
    /// http(s) URL.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| NotifyError::Config(format!("invalid webhook url {url:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(NotifyError::Config(format!(
                "webhook url must be http or https, got {}",
                url.scheme()
            )));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }

    /// `None` when no webhook URL is configured.
    pub fn from_config(config: &NotifyConfig) -> Result<Option<Self>, NotifyError> {
        config
            .webhook_url
            .as_deref()
            .map(|url| Self::new(url, Duration::from_millis(config.webhook_timeout_ms)))
            .transpose()
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, event: &TelemetryEvent) -> Result<(), NotifyError> {
        let body = serde_json::json!({
            "topic": event.topic(),
            "event": event,
        });

        let response = self.client.post(self.url.clone()).json(&body).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(
                url = %self.url,
                %status,
                body = %body_text,
                "webhook returned non-2xx status"
            );
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body: body_text,
            });
        }

        tracing::trace!(url = %self.url, %status, "webhook notification delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}
