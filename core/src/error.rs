//! Error types for the fetch client.
//!
//! # Design
//! `InvalidUrl` is the only error returned synchronously, from the verb
//! factories on `Fetch`. Everything else is carried by the terminal call of a
//! `RequestBuilder`: mutator failures are recorded in the builder and
//! surface once the request is built, transport failures keep their source.

use thiserror::Error;

use crate::body::BodyMode;
use crate::transport::BoxError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Errors produced while building, executing or decoding a request.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL was empty or could not be parsed after prefix joining.
    #[error("invalid url")]
    InvalidUrl,

    /// The transport failed to perform the round-trip.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// The response body is not valid JSON, or does not match the target type.
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),

    /// A query or body value could not be serialized.
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// Two body mutators of different families were used on one request.
    #[error("cannot use a {requested} body after a {current} body")]
    BodyConflict {
        current: BodyMode,
        requested: BodyMode,
    },
}

impl FetchError {
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, FetchError::Decode(_))
    }
}

impl From<serde_urlencoded::ser::Error> for FetchError {
    fn from(err: serde_urlencoded::ser::Error) -> Self {
        FetchError::Encode(err.to_string())
    }
}
