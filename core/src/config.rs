//! Per-client configuration.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Hook run on every parsed `.json()` result before it is returned.
pub type JsonHandler = Arc<dyn Fn(&mut Value) + Send + Sync>;

/// Configuration fixed at `Fetch` construction and shared read-only by
/// every builder it creates.
#[derive(Clone, Default)]
pub struct FetchConfig {
    /// Prepended verbatim to every request URL.
    pub prefix: String,
    pub json_handler: Option<JsonHandler>,
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Install a hook that may mutate each parsed JSON value in place.
    pub fn with_json_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut Value) + Send + Sync + 'static,
    {
        self.json_handler = Some(Arc::new(handler));
        self
    }
}

impl fmt::Debug for FetchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchConfig")
            .field("prefix", &self.prefix)
            .field("json_handler", &self.json_handler.as_ref().map(|_| ".."))
            .finish()
    }
}
