//! Webhook delivery.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::error::Result;
use crate::notify::{Notification, NotificationSink};

/// POSTs each notification as JSON.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: Client,
    url: Url,
}

impl WebhookSink {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            url: Url::parse(url)?,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, notification: &Notification) -> Result<()> {
        self.client
            .post(self.url.clone())
            .json(notification)
            .send()
            .await?
            .error_for_status()?;
        log::info!("Webhook delivered for {}", notification.id);
        Ok(())
    }
}
