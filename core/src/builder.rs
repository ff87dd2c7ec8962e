//! Chainable request builder.
//!
//! # Design
//! A `RequestBuilder` owns the state of exactly one request. Mutators take
//! `self` by value and hand it back, so a chain reads top to bottom and
//! every builder carries its own isolated state. A mutator that fails
//! (unserializable query, conflicting body family) parks the error in the
//! builder; the remaining mutators become no-ops and the terminal call
//! reports it. Terminal calls consume the builder, which makes a second
//! network call on the same builder unrepresentable.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::body::{Body, BodyMode, SendBody};
use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::http::{Headers, HttpMethod, HttpRequest};
use crate::query;
use crate::response::Response;
use crate::transport::Transport;

const CONTENT_TYPE: &str = "content-type";

/// Everything accumulated for one request before it is built.
#[derive(Debug, Clone)]
struct RequestSpec {
    method: HttpMethod,
    url: String,
    query: Vec<String>,
    headers: Headers,
    body: Body,
}

impl RequestSpec {
    fn into_request(self) -> Result<HttpRequest> {
        let RequestSpec {
            method,
            url,
            query: fragments,
            mut headers,
            body,
        } = self;

        let url = query::merge(&url, &fragments);

        let body = if method.allows_body() {
            if !headers.contains(CONTENT_TYPE) {
                if let Some(content_type) = body.default_content_type() {
                    headers.insert(CONTENT_TYPE, content_type);
                }
            }
            body.encode(headers.get(CONTENT_TYPE))?
        } else {
            if body.mode() != BodyMode::Empty {
                debug!(method = %method, mode = %body.mode(), "dropping request body");
            }
            None
        };

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }
}

/// Builder for a single request, created by the verb methods on `Fetch`.
pub struct RequestBuilder {
    transport: Arc<dyn Transport>,
    config: Arc<FetchConfig>,
    spec: Result<RequestSpec>,
}

impl RequestBuilder {
    /// Join `url` onto the configured prefix and validate it.
    ///
    /// The joined string is only parsed to check it; the request goes out
    /// with it as written, plus any `query()` pairs. Fails with
    /// `FetchError::InvalidUrl` when the joined URL is empty or not absolute.
    pub(crate) fn new(
        method: HttpMethod,
        url: &str,
        config: Arc<FetchConfig>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let joined = format!("{}{}", config.prefix, url);
        if joined.trim().is_empty() {
            return Err(FetchError::InvalidUrl);
        }
        Url::parse(&joined).map_err(|_| FetchError::InvalidUrl)?;

        Ok(Self {
            transport,
            config,
            spec: Ok(RequestSpec {
                method,
                url: joined,
                query: Vec::new(),
                headers: Headers::new(),
                body: Body::Empty,
            }),
        })
    }

    /// Append query pairs after any already in the URL.
    ///
    /// Accepts anything `serde_urlencoded` can serialize: structs, maps,
    /// slices of pairs. Non-string values are sent as their string form.
    #[must_use]
    pub fn query<T: Serialize + ?Sized>(self, params: &T) -> Self {
        let fragment = query::encode(params);
        self.update(|spec| {
            spec.query.push(fragment?);
            Ok(())
        })
    }

    /// Add to the body: a string is one urlencoded `key=value` fragment,
    /// a JSON object is merged into the JSON body.
    #[must_use]
    pub fn send(self, body: impl Into<SendBody>) -> Self {
        let body = body.into();
        self.update(|spec| match body {
            SendBody::Form(fragment) => spec.body.push_fragment(fragment),
            SendBody::Json(map) => spec.body.merge_json(map),
            SendBody::NotAnObject(value) => Err(FetchError::Encode(format!(
                "expected a JSON object body, got `{value}`"
            ))),
        })
    }

    /// `send` for any serializable value that becomes a JSON object.
    #[must_use]
    pub fn send_json<T: Serialize + ?Sized>(self, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => self.send(value),
            Err(err) => self.fail(FetchError::Encode(err.to_string())),
        }
    }

    /// `send` for a struct or map serialized as one urlencoded fragment.
    #[must_use]
    pub fn send_form<T: Serialize + ?Sized>(self, form: &T) -> Self {
        match serde_urlencoded::to_string(form) {
            Ok(fragment) => self.send(fragment),
            Err(err) => self.fail(err.into()),
        }
    }

    /// Add one multipart form field.
    #[must_use]
    pub fn append(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let (name, value) = (name.into(), value.into());
        self.update(|spec| spec.body.push_field(name, value))
    }

    /// Send `bytes` as-is. No content type is implied.
    #[must_use]
    pub fn body(self, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        self.update(|spec| spec.body.set_raw(bytes))
    }

    /// Set a header, replacing any value under the same name.
    ///
    /// An explicit `Content-Type` wins over the one the body would imply.
    #[must_use]
    pub fn set(self, name: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        self.update(|spec| {
            spec.headers.insert(name, value);
            Ok(())
        })
    }

    /// `set` for every pair of `headers`.
    #[must_use]
    pub fn set_headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.update(|spec| {
            for (name, value) in headers {
                spec.headers.insert(name.as_ref(), value);
            }
            Ok(())
        })
    }

    /// Resolve the chain into the request that would be sent, without I/O.
    pub fn build(self) -> Result<HttpRequest> {
        self.spec?.into_request()
    }

    /// Perform the request through the client's transport.
    pub async fn execute(self) -> Result<Response> {
        let RequestBuilder {
            transport,
            config,
            spec,
        } = self;
        let request = spec?.into_request()?;

        debug!(method = %request.method, url = %request.url, "dispatching request");
        let response = transport
            .perform(request)
            .await
            .map_err(FetchError::Transport)?;
        debug!(status = response.status, bytes = response.body.len(), "received response");

        Ok(Response::new(response, config.json_handler.clone()))
    }

    /// Perform the request and return the body as text.
    pub async fn text(self) -> Result<String> {
        Ok(self.execute().await?.text())
    }

    /// Perform the request and return the body as JSON, after the client's
    /// JSON hook has run on it.
    pub async fn json(self) -> Result<Value> {
        self.execute().await?.json()
    }

    /// Perform the request and deserialize the hooked JSON body into `T`.
    pub async fn json_as<T: DeserializeOwned>(self) -> Result<T> {
        self.execute().await?.json_as()
    }

    fn update<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut RequestSpec) -> Result<()>,
    {
        let outcome = match &mut self.spec {
            Ok(spec) => f(spec),
            Err(_) => return self,
        };
        if let Err(err) = outcome {
            self.spec = Err(err);
        }
        self
    }

    fn fail(self, err: FetchError) -> Self {
        self.update(|_| Err(err))
    }
}

impl IntoFuture for RequestBuilder {
    type Output = Result<Response>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.execute())
    }
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("config", &self.config)
            .field("spec", &self.spec)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::transport::testing::RecordingTransport;

    fn builder(method: HttpMethod, url: &str) -> RequestBuilder {
        builder_with(method, url, FetchConfig::default())
    }

    fn builder_with(method: HttpMethod, url: &str, config: FetchConfig) -> RequestBuilder {
        let transport = Arc::new(RecordingTransport::json("{}"));
        RequestBuilder::new(method, url, Arc::new(config), transport).unwrap()
    }

    fn body_json(req: &HttpRequest) -> Value {
        serde_json::from_slice(req.body.as_deref().unwrap()).unwrap()
    }

    #[test]
    fn empty_url_is_rejected_immediately() {
        let transport = Arc::new(RecordingTransport::json("{}"));
        let err = RequestBuilder::new(HttpMethod::Get, "", Arc::default(), transport).unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl));
        assert_eq!(err.to_string(), "invalid url");
    }

    #[test]
    fn relative_url_without_prefix_is_rejected() {
        let transport = Arc::new(RecordingTransport::json("{}"));
        let err = RequestBuilder::new(HttpMethod::Get, "/get", Arc::default(), transport).unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl));
    }

    #[test]
    fn prefix_is_concatenated() {
        let config = FetchConfig::new().with_prefix("http://host/get");
        let req = builder_with(HttpMethod::Get, "", config).build().unwrap();
        assert_eq!(req.url, "http://host/get");

        let config = FetchConfig::new().with_prefix("http://host");
        let req = builder_with(HttpMethod::Get, "/status/204", config).build().unwrap();
        assert_eq!(req.url, "http://host/status/204");
    }

    #[test]
    fn joined_url_is_sent_as_written() {
        let config = FetchConfig::new().with_prefix("http://host");
        let req = builder_with(HttpMethod::Get, "", config).build().unwrap();
        assert_eq!(req.url, "http://host");

        let req = builder(HttpMethod::Get, "http://host/a/../b")
            .query(&[("c", 1)])
            .build()
            .unwrap();
        assert_eq!(req.url, "http://host/a/../b?c=1");
    }

    #[test]
    fn query_keeps_mapping_key_order() {
        let req = builder(HttpMethod::Get, "http://host/get")
            .query(&json!({"pass": 1, "name": "x"}))
            .build()
            .unwrap();
        assert_eq!(req.url, "http://host/get?pass=1&name=x");
    }

    #[test]
    fn send_keeps_mapping_key_order() {
        let req = builder(HttpMethod::Post, "http://host/post")
            .send(json!({"pass": 1, "name": "x"}))
            .send(json!({"type": 2, "pass": 3}))
            .build()
            .unwrap();
        assert_eq!(
            req.body.as_deref(),
            Some(&br#"{"pass":3,"name":"x","type":2}"#[..])
        );
    }

    #[test]
    fn query_calls_accumulate_in_order() {
        let req = builder(HttpMethod::Get, "http://host/get")
            .query(&[("name", "haoxin")])
            .query(&[("pass", 123456)])
            .query(&json!({"type": 1}))
            .build()
            .unwrap();
        assert_eq!(req.url, "http://host/get?name=haoxin&pass=123456&type=1");
    }

    #[test]
    fn query_merges_with_url_query() {
        let req = builder(HttpMethod::Get, "http://host/get?name=haoxin")
            .query(&[("pass", 123456)])
            .query(&[("type", 1)])
            .build()
            .unwrap();
        assert_eq!(req.url, "http://host/get?name=haoxin&pass=123456&type=1");
    }

    #[test]
    fn send_objects_build_json_body() {
        let req = builder(HttpMethod::Post, "http://host/post")
            .send(json!({"name": "haoxin", "pass": 123456}))
            .send(json!({"type": 1}))
            .build()
            .unwrap();
        assert_eq!(req.headers.get("Content-Type"), Some("application/json"));
        assert_eq!(body_json(&req), json!({"name": "haoxin", "pass": 123456, "type": 1}));
    }

    #[test]
    fn send_strings_build_form_body() {
        let req = builder(HttpMethod::Post, "http://host/post")
            .send("name=haoxin")
            .send("pass=123456")
            .build()
            .unwrap();
        assert_eq!(
            req.headers.get("content-type"),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(req.body.as_deref(), Some(&b"name=haoxin&pass=123456"[..]));
    }

    #[test]
    fn explicit_content_type_turns_objects_into_form() {
        let req = builder(HttpMethod::Post, "http://host/post")
            .set("content-type", "application/x-www-form-urlencoded")
            .set("x-fetch-io", "hello")
            .send(json!({"name": "haoxin"}))
            .send(json!({"pass": 123456}))
            .build()
            .unwrap();
        let headers: Vec<(&str, &str)> = req.headers.iter().collect();
        assert_eq!(
            headers,
            vec![
                ("Content-Type", "application/x-www-form-urlencoded"),
                ("X-Fetch-Io", "hello"),
            ]
        );
        assert_eq!(req.body.as_deref(), Some(&b"name=haoxin&pass=123456"[..]));
    }

    #[test]
    fn content_type_set_after_send_still_wins() {
        let req = builder(HttpMethod::Post, "http://host/post")
            .send(json!({"name": "haoxin"}))
            .set_headers([("Content-Type", "application/x-www-form-urlencoded")])
            .build()
            .unwrap();
        assert_eq!(req.body.as_deref(), Some(&b"name=haoxin"[..]));
    }

    #[test]
    fn append_builds_multipart_body() {
        let req = builder(HttpMethod::Post, "http://host/post")
            .append("name", "haoxin")
            .append("desc", "hello world")
            .build()
            .unwrap();
        let content_type = req.headers.get("content-type").unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));

        let boundary = content_type.rsplit('=').next().unwrap();
        let body = String::from_utf8(req.body.unwrap()).unwrap();
        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.ends_with(&format!("--{boundary}--\r\n")));
        let name = body.find("name=\"name\"").unwrap();
        let desc = body.find("name=\"desc\"").unwrap();
        assert!(name < desc);
    }

    #[test]
    fn mixing_send_and_append_fails_at_build() {
        let err = builder(HttpMethod::Post, "http://host/post")
            .append("k1", "v1")
            .send(json!({"a": 1}))
            .set("x-after", "ignored")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::BodyConflict {
                current: BodyMode::Multipart,
                requested: BodyMode::Json
            }
        ));

        let err = builder(HttpMethod::Post, "http://host/post")
            .send("a=1")
            .send(json!({"b": 2}))
            .build()
            .unwrap_err();
        assert!(matches!(err, FetchError::BodyConflict { .. }));
    }

    #[test]
    fn non_object_json_is_an_encode_error() {
        let err = builder(HttpMethod::Post, "http://host/post")
            .send(json!([1, 2, 3]))
            .build()
            .unwrap_err();
        assert!(matches!(err, FetchError::Encode(_)));

        let err = builder(HttpMethod::Get, "http://host/get")
            .query(&42)
            .build()
            .unwrap_err();
        assert!(matches!(err, FetchError::Encode(_)));
    }

    #[test]
    fn typed_senders() {
        #[derive(Serialize)]
        struct Login<'a> {
            name: &'a str,
            pass: u32,
        }
        let login = Login {
            name: "haoxin",
            pass: 123456,
        };

        let req = builder(HttpMethod::Put, "http://host/put")
            .send_json(&login)
            .build()
            .unwrap();
        assert_eq!(body_json(&req), json!({"name": "haoxin", "pass": 123456}));

        let req = builder(HttpMethod::Patch, "http://host/patch")
            .send_form(&login)
            .build()
            .unwrap();
        assert_eq!(req.body.as_deref(), Some(&b"name=haoxin&pass=123456"[..]));
    }

    #[test]
    fn get_ignores_accumulated_body() {
        let req = builder(HttpMethod::Get, "http://host/get")
            .send(json!({"name": "haoxin"}))
            .send(json!({"type": 1}))
            .build()
            .unwrap();
        assert!(req.body.is_none());
        assert!(!req.headers.contains("content-type"));
    }

    #[test]
    fn raw_body_has_no_default_content_type() {
        let req = builder(HttpMethod::Post, "http://host/post")
            .body(b"\x00\x01".to_vec())
            .build()
            .unwrap();
        assert_eq!(req.body.as_deref(), Some(&b"\x00\x01"[..]));
        assert!(req.headers.is_empty());
    }

    #[test]
    fn builders_from_one_config_are_isolated() {
        let config = Arc::new(FetchConfig::default());
        let transport: Arc<dyn Transport> = Arc::new(RecordingTransport::json("{}"));
        let a = RequestBuilder::new(HttpMethod::Post, "http://host/a", config.clone(), transport.clone())
            .unwrap()
            .set("x-a", "1");
        let b = RequestBuilder::new(HttpMethod::Post, "http://host/b", config, transport).unwrap();

        assert!(a.build().unwrap().headers.contains("x-a"));
        assert!(b.build().unwrap().headers.is_empty());
    }

    #[tokio::test]
    async fn awaiting_the_builder_performs_one_call() {
        let transport = Arc::new(RecordingTransport::json(r#"{"args":{}}"#));
        let builder = RequestBuilder::new(
            HttpMethod::Get,
            "http://host/get",
            Arc::default(),
            transport.clone(),
        )
        .unwrap()
        .query(&[("a", 1)]);

        let res = builder.await.unwrap();
        assert_eq!(res.status(), 200);
        assert_eq!(transport.calls(), 1);
        assert_eq!(transport.last().url, "http://host/get?a=1");
    }

    #[tokio::test]
    async fn builder_errors_skip_the_transport() {
        let transport = Arc::new(RecordingTransport::json("{}"));
        let err = RequestBuilder::new(
            HttpMethod::Post,
            "http://host/post",
            Arc::default(),
            transport.clone(),
        )
        .unwrap()
        .send("a=1")
        .append("b", "2")
        .text()
        .await
        .unwrap_err();

        assert!(matches!(err, FetchError::BodyConflict { .. }));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn transport_failures_propagate() {
        let transport = Arc::new(RecordingTransport::failing("connection refused"));
        let err = RequestBuilder::new(HttpMethod::Get, "http://host/get", Arc::default(), transport)
            .unwrap()
            .json()
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "transport error: connection refused");
    }
}
