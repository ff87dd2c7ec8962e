//! Decoded view over an `HttpResponse`.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::JsonHandler;
use crate::error::{FetchError, Result};
use crate::http::{Headers, HttpResponse};

/// Response of an executed request.
///
/// The status is exposed as-is; non-2xx responses are not errors.
pub struct Response {
    inner: HttpResponse,
    json_handler: Option<JsonHandler>,
}

impl Response {
    pub(crate) fn new(inner: HttpResponse, json_handler: Option<JsonHandler>) -> Self {
        Self { inner, json_handler }
    }

    pub fn status(&self) -> u16 {
        self.inner.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.inner.status)
    }

    pub fn headers(&self) -> &Headers {
        &self.inner.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers.get(name)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.inner.body
    }

    /// Body as UTF-8; invalid sequences are replaced, so this cannot fail.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.inner.body).into_owned()
    }

    /// Parse the body as JSON and run the client's JSON hook on it once.
    pub fn json(&self) -> Result<Value> {
        let mut value: Value = serde_json::from_slice(&self.inner.body).map_err(FetchError::Decode)?;
        if let Some(handler) = &self.json_handler {
            handler(&mut value);
        }
        Ok(value)
    }

    /// Like `json`, then deserialize the hooked value into `T`.
    pub fn json_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.json()?).map_err(FetchError::Decode)
    }

    pub fn into_inner(self) -> HttpResponse {
        self.inner
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.inner.status)
            .field("headers", &self.inner.headers)
            .field("body_len", &self.inner.body.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde::Deserialize;

    use super::*;

    fn response(body: &[u8]) -> HttpResponse {
        let mut headers = Headers::new();
        headers.insert("content-type", "application/json");
        HttpResponse {
            status: 200,
            headers,
            body: body.to_vec(),
        }
    }

    #[test]
    fn text_and_json_agree() {
        let res = Response::new(response(br#"{"args":{"a":"1"}}"#), None);
        let reparsed: Value = serde_json::from_str(&res.text()).unwrap();
        assert_eq!(reparsed, res.json().unwrap());
    }

    #[test]
    fn text_replaces_invalid_utf8() {
        let res = Response::new(response(&[b'o', b'k', 0xff]), None);
        assert_eq!(res.text(), "ok\u{fffd}");
    }

    #[test]
    fn header_lookup_ignores_case() {
        let res = Response::new(response(b"{}"), None);
        assert_eq!(res.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(res.headers().get("Content-Type"), Some("application/json"));
        assert!(res.is_success());
    }

    #[test]
    fn json_runs_hook_once_per_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler: JsonHandler = Arc::new(move |json: &mut Value| {
            counter.fetch_add(1, Ordering::SeqCst);
            json["meta"] = Value::from("json handler");
        });
        let res = Response::new(response(br#"{"ok":true}"#), Some(handler));

        let json = res.json().unwrap();
        assert_eq!(json["meta"], "json handler");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        res.json().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn malformed_json_is_decode_error() {
        let res = Response::new(response(b"<html></html>"), None);
        assert!(res.json().unwrap_err().is_decode());
    }

    #[test]
    fn json_as_sees_hooked_value() {
        #[derive(Deserialize)]
        struct Tagged {
            ok: bool,
            meta: String,
        }

        let handler: JsonHandler = Arc::new(|json: &mut Value| {
            json["meta"] = Value::from("added");
        });
        let res = Response::new(response(br#"{"ok":true}"#), Some(handler));
        let tagged: Tagged = res.json_as().unwrap();
        assert!(tagged.ok);
        assert_eq!(tagged.meta, "added");
    }
}
