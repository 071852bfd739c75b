//! Proxy pool loading and selection.
//!
//! Normalizes raw proxy lines into endpoint URLs and hands out a random
//! endpoint per outbound request. Selection is memoryless; the pool keeps no
//! health statistics and never removes entries on its own.

use rand::seq::SliceRandom;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;
use url::Url;

/// Reasons a raw proxy line is rejected during normalization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProxyParseError {
    #[error("expected host:port:user:pass, got {0} field(s)")]
    TooFewFields(usize),
    #[error("proxy host is empty")]
    EmptyHost,
    #[error("invalid proxy port '{0}'")]
    InvalidPort(String),
    #[error("proxy credentials cannot be attached to this url")]
    Credentials,
    #[error("invalid proxy url: {0}")]
    Url(#[from] url::ParseError),
}

/// Normalized outbound proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    url: Url,
}

impl ProxyEndpoint {
    /// Normalize a raw proxy line.
    ///
    /// Lines starting with `http` are taken as full proxy URLs. Anything else
    /// is read as `host:port:user:pass` from the right, so hosts containing
    /// colons (IPv6 literals) survive and get bracketed.
    pub fn normalize(raw: &str) -> Result<Self, ProxyParseError> {
        let raw = raw.trim();
        if raw.starts_with("http") {
            return Ok(Self {
                url: Url::parse(raw)?,
            });
        }

        let parts: Vec<&str> = raw.split(':').collect();
        if parts.len() < 3 {
            return Err(ProxyParseError::TooFewFields(parts.len()));
        }

        let n = parts.len();
        let password = parts[n - 1];
        let username = parts[n - 2];
        let port = parts[n - 3];
        let host = parts[..n - 3].join(":");

        if host.is_empty() {
            return Err(ProxyParseError::EmptyHost);
        }
        if port.parse::<u16>().is_err() {
            return Err(ProxyParseError::InvalidPort(port.to_string()));
        }

        let authority = if host.contains(':') {
            format!("http://[{host}]:{port}")
        } else {
            format!("http://{host}:{port}")
        };
        let mut url = Url::parse(&authority)?;
        // Setters percent-encode, so reserved characters in credentials
        // cannot leak into the host or path.
        url.set_username(username)
            .and_then(|()| url.set_password(Some(password)))
            .map_err(|()| ProxyParseError::Credentials)?;

        Ok(Self { url })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Host as it appears in the URL (IPv6 literals keep their brackets).
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> Option<u16> {
        self.url.port_or_known_default()
    }

    pub fn username(&self) -> Option<&str> {
        Some(self.url.username()).filter(|user| !user.is_empty())
    }

    pub fn password(&self) -> Option<&str> {
        self.url.password()
    }

    pub fn as_url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Endpoint with credentials masked, for log output.
    pub fn redacted(&self) -> String {
        let mut masked = self.url.clone();
        if masked.password().is_some() {
            let _ = masked.set_password(Some("***"));
        }
        masked.to_string()
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Fixed set of proxy endpoints loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    endpoints: Vec<ProxyEndpoint>,
}

impl ProxyPool {
    pub fn new(endpoints: Vec<ProxyEndpoint>) -> Self {
        Self { endpoints }
    }

    /// Parse a newline-delimited proxy list. Malformed lines are dropped.
    pub fn parse(source: &str) -> Self {
        let mut endpoints = Vec::new();
        for line in source.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match ProxyEndpoint::normalize(line) {
                Ok(endpoint) => endpoints.push(endpoint),
                Err(err) => log::warn!("dropping proxy entry: {err}"),
            }
        }
        Self { endpoints }
    }

    /// Load the proxy list from disk. A missing or unreadable file yields an
    /// empty pool.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let pool = match fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(err) => {
                log::warn!("proxy file {} not readable: {err}", path.display());
                return Self::default();
            }
        };
        log::info!("{} proxies loaded from {}", pool.len(), path.display());
        pool
    }

    /// Uniformly random endpoint, or `None` if the pool is empty.
    pub fn acquire(&self) -> Option<&ProxyEndpoint> {
        self.endpoints.choose(&mut rand::thread_rng())
    }

    /// Re-read `path` when the pool is empty. Returns true if the pool now
    /// holds at least one endpoint.
    pub fn reload_if_empty(&mut self, path: impl AsRef<Path>) -> bool {
        if self.endpoints.is_empty() && path.as_ref().exists() {
            *self = Self::load(path);
        }
        !self.endpoints.is_empty()
    }

    pub fn endpoints(&self) -> &[ProxyEndpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
