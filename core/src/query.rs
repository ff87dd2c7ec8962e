//! Query-string merging.
//!
//! Pairs already present in the URL come first, then every `query()`
//! fragment in call order. Keys are never deduplicated.

use serde::Serialize;

use crate::error::Result;

/// Serialize one `query()` argument into a urlencoded fragment.
pub fn encode<T: Serialize + ?Sized>(query: &T) -> Result<String> {
    Ok(serde_urlencoded::to_string(query)?)
}

/// Append `fragments` to the query string of `url`.
///
/// Everything else in `url` is left byte for byte as the caller wrote it.
/// A `#fragment` stays at the end.
pub fn merge(url: &str, fragments: &[String]) -> String {
    let added: Vec<&str> = fragments
        .iter()
        .map(String::as_str)
        .filter(|f| !f.is_empty())
        .collect();
    if added.is_empty() {
        return url.to_string();
    }

    let (base, anchor) = url.split_at(url.find('#').unwrap_or(url.len()));
    let separator = match base.find('?') {
        None => "?",
        Some(_) if base.ends_with('?') || base.ends_with('&') => "",
        Some(_) => "&",
    };
    format!("{base}{separator}{}{anchor}", added.join("&"))
}
