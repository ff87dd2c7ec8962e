//! The `Fetch` entry point.
//!
//! # Design
//! `Fetch` holds only its configuration and transport, both behind `Arc`,
//! and carries no mutable state between calls. Each verb method returns a
//! fresh `RequestBuilder` seeded with the prefix-joined URL; URL validation
//! happens right there, so a bad URL is a plain `Err` before any I/O.

use std::sync::Arc;

use crate::builder::RequestBuilder;
use crate::config::FetchConfig;
use crate::error::Result;
use crate::http::HttpMethod;
use crate::transport::Transport;

/// Factory for request builders sharing one configuration.
#[derive(Clone)]
pub struct Fetch {
    config: Arc<FetchConfig>,
    transport: Arc<dyn Transport>,
}

impl Fetch {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_config(transport, FetchConfig::default())
    }

    pub fn with_config(transport: impl Transport + 'static, config: FetchConfig) -> Self {
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Start a request with an arbitrary method.
    pub fn request(&self, method: HttpMethod, url: &str) -> Result<RequestBuilder> {
        RequestBuilder::new(method, url, self.config.clone(), self.transport.clone())
    }

    pub fn get(&self, url: &str) -> Result<RequestBuilder> {
        self.request(HttpMethod::Get, url)
    }

    pub fn post(&self, url: &str) -> Result<RequestBuilder> {
        self.request(HttpMethod::Post, url)
    }

    pub fn put(&self, url: &str) -> Result<RequestBuilder> {
        self.request(HttpMethod::Put, url)
    }

    pub fn delete(&self, url: &str) -> Result<RequestBuilder> {
        self.request(HttpMethod::Delete, url)
    }

    pub fn patch(&self, url: &str) -> Result<RequestBuilder> {
        self.request(HttpMethod::Patch, url)
    }

    pub fn head(&self, url: &str) -> Result<RequestBuilder> {
        self.request(HttpMethod::Head, url)
    }

    pub fn options(&self, url: &str) -> Result<RequestBuilder> {
        self.request(HttpMethod::Options, url)
    }
}

#[cfg(feature = "reqwest")]
impl Default for Fetch {
    /// A client over `ReqwestTransport` with the default configuration.
    fn default() -> Self {
        Self::new(crate::transport::ReqwestTransport::new())
    }
}

impl std::fmt::Debug for Fetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetch").field("config", &self.config).finish()
    }
}
