//! Fluent HTTP request builder over a pluggable transport.
//!
//! # Overview
//! `Fetch` hands out a `RequestBuilder` per call. The builder accumulates
//! query pairs, headers and a body through chained calls, then resolves into
//! one `HttpRequest` that a `Transport` performs. The response is decoded on
//! demand as raw bytes, text or JSON.
//!
//! ```no_run
//! use fetch_core::{Fetch, FetchConfig, ReqwestTransport};
//! use serde_json::json;
//!
//! # async fn demo() -> fetch_core::Result<()> {
//! let fetch = Fetch::with_config(
//!     ReqwestTransport::new(),
//!     FetchConfig::new().with_prefix("http://localhost:3000"),
//! );
//! let body = fetch
//!     .post("/post")?
//!     .query(&[("page", 1)])
//!     .set("x-fetch-io", "hello")
//!     .send(json!({"name": "haoxin"}))
//!     .send(json!({"pass": 123456}))
//!     .json()
//!     .await?;
//! println!("{body}");
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - The body is a tagged union (`Body`) picked by the first body mutator;
//!   mixing families is an error, not a silent override.
//! - Builders are consumed by their terminal call, so a request is sent at
//!   most once.
//! - The transport is a trait object behind `Arc`; `HttpRequest` and
//!   `HttpResponse` are plain data, which keeps the builder testable without
//!   a network.

pub mod body;
pub mod builder;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod query;
pub mod response;
pub mod transport;

pub use body::{Body, BodyMode, Multipart, SendBody};
pub use builder::RequestBuilder;
pub use client::Fetch;
pub use config::{FetchConfig, JsonHandler};
pub use error::{FetchError, Result};
pub use http::{Headers, HttpMethod, HttpRequest, HttpResponse};
pub use response::Response;
pub use transport::{BoxError, Transport};

#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
