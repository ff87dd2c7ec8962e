use std::collections::BTreeMap;

use axum::{
    body::to_bytes,
    extract::{FromRequest, Multipart, Path, Request},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse},
    routing::{any, delete, get, patch, post, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tracing::debug;

const BODY_LIMIT: usize = 16 * 1024 * 1024;

/// What the echo endpoints report back about the request they received.
#[derive(Clone, Debug, Serialize)]
pub struct Echo {
    pub args: Map<String, Value>,
    pub data: String,
    pub form: Map<String, Value>,
    pub headers: BTreeMap<String, String>,
    pub json: Option<Value>,
    pub method: String,
    pub url: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/get", get(echo))
        .route("/post", post(echo))
        .route("/put", put(echo))
        .route("/patch", patch(echo))
        .route("/delete", delete(echo))
        .route("/anything", any(echo))
        .route("/status/{code}", any(status))
        .route("/html", get(html))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(request: Request) -> Result<Json<Echo>, (StatusCode, String)> {
    let (parts, body) = request.into_parts();

    let args = parse_pairs(parts.uri.query().unwrap_or_default())?;
    let host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost")
        .to_string();
    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let mut echo = Echo {
        args,
        data: String::new(),
        form: Map::new(),
        headers: echo_headers(&parts.headers),
        json: None,
        method: parts.method.to_string(),
        url: format!("http://{host}{}", parts.uri),
    };
    debug!(method = %echo.method, url = %echo.url, content_type = %content_type, "echo");

    if content_type.starts_with("multipart/form-data") {
        let request = Request::from_parts(parts, body);
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
            let name = field.name().unwrap_or_default().to_string();
            let value = field.text().await.map_err(bad_request)?;
            insert_pair(&mut echo.form, name, value);
        }
        return Ok(Json(echo));
    }

    let bytes = to_bytes(body, BODY_LIMIT).await.map_err(bad_request)?;
    echo.data = String::from_utf8_lossy(&bytes).into_owned();
    if content_type.starts_with("application/x-www-form-urlencoded") {
        echo.form = parse_pairs(&echo.data)?;
    } else if content_type.starts_with("application/json") {
        echo.json = serde_json::from_slice(&bytes).ok();
    }
    Ok(Json(echo))
}

async fn status(Path(code): Path<u16>) -> impl IntoResponse {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn html() -> Html<&'static str> {
    Html("<!DOCTYPE html>\n<html><body><h1>fetch</h1></body></html>\n")
}

fn bad_request(err: impl std::fmt::Display) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, err.to_string())
}

/// Decode `a=1&b=2`; a repeated key collects its values into an array.
fn parse_pairs(encoded: &str) -> Result<Map<String, Value>, (StatusCode, String)> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(encoded).map_err(bad_request)?;
    let mut map = Map::new();
    for (key, value) in pairs {
        insert_pair(&mut map, key, value);
    }
    Ok(map)
}

fn insert_pair(map: &mut Map<String, Value>, key: String, value: String) {
    match map.get_mut(&key) {
        Some(Value::Array(values)) => values.push(Value::String(value)),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, Value::String(value)]);
        }
        None => {
            map.insert(key, Value::String(value));
        }
    }
}

fn echo_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((title_case(name.as_str()), value.to_string()))
        })
        .collect()
}

fn title_case(name: &str) -> String {
    name.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}
