//! Reqwest-backed fetcher.
//!
//! Keeps one client per proxy endpoint so cookies and connection pools stay
//! tied to the outbound identity that created them.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use tokio::sync::Mutex;
use url::Url;

use super::{FetchError, FetchedPage, Fetcher};
use crate::modules::proxy::ProxyEndpoint;

const CHROME_HEADERS: &[(&str, &str)] = &[
    (
        "user-agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    ),
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
    ),
    ("accept-language", "de-DE,de;q=0.9,en-US;q=0.8,en;q=0.7"),
    ("accept-encoding", "gzip, deflate, br"),
    ("upgrade-insecure-requests", "1"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
];

/// HTTP fetcher routing each request through the given proxy.
pub struct ReqwestFetcher {
    timeout: Duration,
    base_headers: HeaderMap,
    clients: Mutex<HashMap<String, reqwest::Client>>,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            base_headers: browser_headers(),
            clients: Mutex::new(HashMap::new()),
        }
    }

    async fn client(&self, proxy: &ProxyEndpoint) -> Result<reqwest::Client, FetchError> {
        let mut guard = self.clients.lock().await;
        if let Some(client) = guard.get(proxy.as_str()) {
            return Ok(client.clone());
        }

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(self.base_headers.clone())
            .timeout(self.timeout)
            .proxy(reqwest::Proxy::all(proxy.as_url().clone()).map_err(map_error)?)
            .build()
            .map_err(map_error)?;

        guard.insert(proxy.as_str().to_string(), client.clone());
        Ok(client)
    }
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(20))
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &Url, proxy: &ProxyEndpoint) -> Result<FetchedPage, FetchError> {
        let client = self.client(proxy).await?;
        let response = client
            .get(url.clone())
            .send()
            .await
            .map_err(map_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_error)?;
        Ok(FetchedPage { status, body })
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    for &(name, value) in CHROME_HEADERS {
        headers.insert(
            header::HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers
}

fn map_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_connect() {
        FetchError::Connect(err.to_string())
    } else {
        FetchError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_headers_are_valid() {
        let headers = browser_headers();
        assert_eq!(headers.len(), CHROME_HEADERS.len());
        assert!(headers.contains_key(header::USER_AGENT));
    }

    #[tokio::test]
    async fn reuses_client_per_proxy() {
        let fetcher = ReqwestFetcher::default();
        let proxy = ProxyEndpoint::normalize("127.0.0.1:8080:user:pass").unwrap();
        fetcher.client(&proxy).await.unwrap();
        fetcher.client(&proxy).await.unwrap();
        assert_eq!(fetcher.clients.lock().await.len(), 1);
    }
}
