//! Webhook notifier posting one embed per drop.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use url::Url;

use super::{Listing, Notifier, NotifyError};

const EMBED_COLOR: u32 = 0x09B1BA;
const DESCRIPTION_LIMIT: usize = 100;

/// Posts Discord-compatible embeds to a webhook URL.
#[derive(Clone)]
pub struct WebhookNotifier {
    endpoint: Url,
    client: Client,
    timeout: Duration,
    username: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            username: "Listing Monitor".to_string(),
        }
    }

    async fn post<T: Serialize + Sync>(&self, payload: &T) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|err| NotifyError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, listing: &Listing) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            username: Some(self.username.clone()),
            content: None,
            embeds: vec![Embed::for_listing(listing)],
        };
        self.post(&payload).await
    }

    async fn announce(&self, message: &str) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            username: Some(self.username.clone()),
            content: Some(message.to_string()),
            embeds: Vec::new(),
        };
        self.post(&payload).await
    }
}

/// Used when no notification endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _listing: &Listing) -> Result<(), NotifyError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    url: String,
    color: u32,
    description: String,
    timestamp: String,
    thumbnail: Thumbnail,
    fields: Vec<EmbedField>,
    footer: Footer,
}

#[derive(Debug, Default, Serialize)]
struct Thumbnail {
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbedField {
    name: &'static str,
    value: String,
    inline: bool,
}

#[derive(Debug, Serialize)]
struct Footer {
    text: String,
}

impl Embed {
    fn for_listing(listing: &Listing) -> Self {
        let thumbnail = Thumbnail {
            url: listing
                .image_url
                .clone()
                .filter(|url| url.starts_with("http")),
        };

        Self {
            title: format!("{} - {}", listing.brand, listing.size),
            url: listing.url.clone(),
            color: EMBED_COLOR,
            description: listing.title.chars().take(DESCRIPTION_LIMIT).collect(),
            timestamp: Utc::now().to_rfc3339(),
            thumbnail,
            fields: vec![
                EmbedField {
                    name: "Price",
                    value: format!("**{}**", listing.price),
                    inline: true,
                },
                EmbedField {
                    name: "Condition",
                    value: listing.status.clone(),
                    inline: true,
                },
                EmbedField {
                    name: "Size",
                    value: listing.size.clone(),
                    inline: true,
                },
            ],
            footer: Footer {
                text: format!("Listing Monitor • ID: {}", listing.id),
            },
        }
    }
}
