//! Request body accumulation and encoding.
//!
//! # Design
//! The body is a tagged union chosen by whichever mutator runs first.
//! Further calls from the same family accumulate into it; a call from a
//! different family is a `BodyConflict`. Encoding happens once, when the
//! request is built, so an explicit `Content-Type` set at any point of the
//! chain can still steer how a JSON mapping is serialized.

use std::fmt;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{FetchError, Result};

pub const JSON: &str = "application/json";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

/// Encoding strategy of a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    Empty,
    Json,
    Urlencoded,
    Multipart,
    Raw,
}

impl fmt::Display for BodyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BodyMode::Empty => "empty",
            BodyMode::Json => "json",
            BodyMode::Urlencoded => "urlencoded",
            BodyMode::Multipart => "multipart",
            BodyMode::Raw => "raw",
        };
        f.write_str(name)
    }
}

/// Argument accepted by `RequestBuilder::send`.
///
/// Strings are form fragments (`"name=value"`); JSON objects are mappings
/// merged key by key.
#[derive(Debug, Clone, PartialEq)]
pub enum SendBody {
    Form(String),
    Json(Map<String, Value>),
    /// A JSON value that is not an object; always rejected.
    NotAnObject(Value),
}

impl From<&str> for SendBody {
    fn from(fragment: &str) -> Self {
        SendBody::Form(fragment.to_string())
    }
}

impl From<String> for SendBody {
    fn from(fragment: String) -> Self {
        SendBody::Form(fragment)
    }
}

impl From<Map<String, Value>> for SendBody {
    fn from(map: Map<String, Value>) -> Self {
        SendBody::Json(map)
    }
}

impl From<Value> for SendBody {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => SendBody::Json(map),
            other => SendBody::NotAnObject(other),
        }
    }
}

/// Ordered multipart form fields sharing one boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    boundary: String,
    fields: Vec<(String, String)>,
}

impl Multipart {
    pub fn new() -> Self {
        Self::with_boundary(format!("----FetchFormBoundary{}", Uuid::new_v4().simple()))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            fields: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn content_type(&self) -> String {
        format!("{MULTIPART_FORM_DATA}; boundary={}", self.boundary)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        for (name, value) in &self.fields {
            out.push_str("--");
            out.push_str(&self.boundary);
            out.push_str("\r\n");
            out.push_str(&format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                escape_field_name(name)
            ));
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("--");
        out.push_str(&self.boundary);
        out.push_str("--\r\n");
        out.into_bytes()
    }
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

/// Quotes and line breaks are percent-encoded in field names (RFC 7578 §2).
fn escape_field_name(name: &str) -> String {
    name.replace('"', "%22").replace('\r', "%0D").replace('\n', "%0A")
}

/// Accumulated request body.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    Json(Map<String, Value>),
    Urlencoded(Vec<String>),
    Multipart(Multipart),
    Raw(Vec<u8>),
}

impl Body {
    pub fn mode(&self) -> BodyMode {
        match self {
            Body::Empty => BodyMode::Empty,
            Body::Json(_) => BodyMode::Json,
            Body::Urlencoded(_) => BodyMode::Urlencoded,
            Body::Multipart(_) => BodyMode::Multipart,
            Body::Raw(_) => BodyMode::Raw,
        }
    }

    /// Merge `map` into a JSON body; later keys win.
    pub fn merge_json(&mut self, map: Map<String, Value>) -> Result<()> {
        if let Body::Empty = self {
            *self = Body::Json(Map::new());
        }
        match self {
            Body::Json(acc) => {
                acc.extend(map);
                Ok(())
            }
            other => Err(conflict(other.mode(), BodyMode::Json)),
        }
    }

    /// Add one `key=value` form fragment.
    pub fn push_fragment(&mut self, fragment: String) -> Result<()> {
        if let Body::Empty = self {
            *self = Body::Urlencoded(Vec::new());
        }
        match self {
            Body::Urlencoded(parts) => {
                if !fragment.is_empty() {
                    parts.push(fragment);
                }
                Ok(())
            }
            other => Err(conflict(other.mode(), BodyMode::Urlencoded)),
        }
    }

    /// Add one multipart field.
    pub fn push_field(&mut self, name: String, value: String) -> Result<()> {
        if let Body::Empty = self {
            *self = Body::Multipart(Multipart::new());
        }
        match self {
            Body::Multipart(form) => {
                form.push(name, value);
                Ok(())
            }
            other => Err(conflict(other.mode(), BodyMode::Multipart)),
        }
    }

    /// Replace the body with raw bytes. Repeated calls replace each other.
    pub fn set_raw(&mut self, bytes: Vec<u8>) -> Result<()> {
        match self {
            Body::Empty | Body::Raw(_) => {
                *self = Body::Raw(bytes);
                Ok(())
            }
            other => Err(conflict(other.mode(), BodyMode::Raw)),
        }
    }

    /// Content type the body implies when the caller has not set one.
    pub fn default_content_type(&self) -> Option<String> {
        match self {
            Body::Empty | Body::Raw(_) => None,
            Body::Json(_) => Some(JSON.to_string()),
            Body::Urlencoded(_) => Some(FORM_URLENCODED.to_string()),
            Body::Multipart(form) => Some(form.content_type()),
        }
    }

    /// Serialize the body. `content_type` is the header that will be sent;
    /// a JSON mapping paired with a urlencoded content type is sent as a form.
    pub fn encode(&self, content_type: Option<&str>) -> Result<Option<Vec<u8>>> {
        let bytes = match self {
            Body::Empty => return Ok(None),
            Body::Json(map) if is_form(content_type) => encode_map_as_form(map)?.into_bytes(),
            Body::Json(map) => {
                serde_json::to_vec(map).map_err(|e| FetchError::Encode(e.to_string()))?
            }
            Body::Urlencoded(parts) => parts.join("&").into_bytes(),
            Body::Multipart(form) => form.encode(),
            Body::Raw(bytes) => bytes.clone(),
        };
        Ok(Some(bytes))
    }
}

fn conflict(current: BodyMode, requested: BodyMode) -> FetchError {
    FetchError::BodyConflict { current, requested }
}

fn is_form(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case(FORM_URLENCODED))
}

/// Strings go out verbatim, every other value as its JSON text.
fn encode_map_as_form(map: &Map<String, Value>) -> Result<String> {
    let pairs: Vec<(&str, String)> = map
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.as_str(), value)
        })
        .collect();
    Ok(serde_urlencoded::to_string(pairs)?)
}
