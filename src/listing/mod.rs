//! Listing records and the collaborator seams around the detection engine.
//!
//! The engine only talks to these traits; concrete HTTP, HTML and webhook
//! implementations live in the submodules.

pub mod extractor;
pub mod fetcher;
pub mod notifier;

use std::cmp::Ordering;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use url::Url;

use crate::modules::proxy::ProxyEndpoint;

pub use extractor::HtmlListingExtractor;
pub use fetcher::ReqwestFetcher;
pub use notifier::{NoopNotifier, WebhookNotifier};

pub const UNKNOWN_BRAND: &str = "Unknown";
pub const UNKNOWN_PRICE: &str = "?? €";
pub const NOT_AVAILABLE: &str = "N/A";
pub const NO_TITLE: &str = "No Title";

/// Stable listing identifier taken from the detail link.
///
/// Purely numeric ids order by value and sort before every other id; the rest
/// order as plain text among themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListingId(String);

impl ListingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl Ord for ListingId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_numeric(), other.is_numeric()) {
            (true, true) => {
                let lhs = self.0.trim_start_matches('0');
                let rhs = other.0.trim_start_matches('0');
                lhs.len()
                    .cmp(&rhs.len())
                    .then_with(|| lhs.cmp(rhs))
                    .then_with(|| self.0.cmp(&other.0))
            }
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ListingId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ListingId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ListingId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Serialize for ListingId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ListingId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Self(text),
            RawId::Unsigned(value) => Self(value.to_string()),
            RawId::Signed(value) => Self(value.to_string()),
        })
    }
}

/// One listing as rendered in the search results at fetch time.
///
/// Display fields are already resolved to sentinels by the extractor, so
/// downstream code never re-checks them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub id: ListingId,
    pub url: String,
    pub title: String,
    pub brand: String,
    pub price: String,
    pub size: String,
    pub status: String,
    pub image_url: Option<String>,
}

impl Listing {
    /// Listing with only an id and link; every display field holds its
    /// sentinel.
    pub fn new(id: impl Into<ListingId>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: NO_TITLE.to_string(),
            brand: UNKNOWN_BRAND.to_string(),
            price: UNKNOWN_PRICE.to_string(),
            size: NOT_AVAILABLE.to_string(),
            status: NOT_AVAILABLE.to_string(),
            image_url: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = brand.into();
        self
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = price.into();
        self
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// One-line summary used in console output.
    pub fn summary(&self) -> String {
        format!("{} | {} | {}", self.brand, self.price, self.size)
    }
}

/// Raw page as returned by a fetcher.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// Transport-level failure; never a status code.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Notification delivery failure.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("notification request failed: {0}")]
    Transport(String),
}

/// Retrieves the search page through a given proxy.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, proxy: &ProxyEndpoint) -> Result<FetchedPage, FetchError>;
}

/// Turns page markup into listings, newest first.
pub trait Extractor: Send + Sync {
    fn extract(&self, body: &str) -> Vec<Listing>;
}

/// Delivers drop notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, listing: &Listing) -> Result<(), NotifyError>;

    /// Free-form status message (startup announcement). Defaults to a no-op.
    async fn announce(&self, _message: &str) -> Result<(), NotifyError> {
        Ok(())
    }

    /// Whether notifications actually leave the process.
    fn is_enabled(&self) -> bool {
        true
    }
}
