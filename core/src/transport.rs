//! The seam between the builder and the network.
//!
//! A `Transport` receives a fully built `HttpRequest` and returns the raw
//! `HttpResponse`. It is called exactly once per executed builder and owns
//! every network concern: connections, TLS, timeouts, redirects.

use std::sync::Arc;

use async_trait::async_trait;

use crate::http::{HttpRequest, HttpResponse};

/// Type-erased error returned by transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Performs one HTTP round-trip.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(&self, request: HttpRequest) -> Result<HttpResponse, BoxError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn perform(&self, request: HttpRequest) -> Result<HttpResponse, BoxError> {
        (**self).perform(request).await
    }
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use async_trait::async_trait;

    use super::{BoxError, Transport};
    use crate::http::{Headers, HttpRequest, HttpResponse};

    /// `Transport` backed by a shared `reqwest::Client`.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Wrap a preconfigured client (timeouts, proxies, TLS roots).
        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn perform(&self, request: HttpRequest) -> Result<HttpResponse, BoxError> {
            let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())?;
            let mut builder = self.client.request(method, request.url.as_str());
            for (name, value) in request.headers.iter() {
                builder = builder.header(name, value);
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = copy_headers(response.headers());
            let body = response.bytes().await?.to_vec();

            Ok(HttpResponse { status, headers, body })
        }
    }

    /// Values that are not valid UTF-8 are kept, with the bad bytes replaced.
    fn copy_headers(map: &reqwest::header::HeaderMap) -> Headers {
        let mut headers = Headers::new();
        for (name, value) in map {
            let value = String::from_utf8_lossy(value.as_bytes());
            headers.append(name.as_str(), value.into_owned());
        }
        headers
    }

}
