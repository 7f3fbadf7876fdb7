//! Utility functions and helpers.

pub mod http;
pub mod log;
pub mod time;

use url::Url;

/// Join an endpoint path onto the upstream base URL.
///
/// The base may or may not end with a slash; `path` is always treated as
/// relative to it, so `https://host/ergast/f1` + `2023/driverstandings`
/// keeps the `/ergast/f1` prefix.
pub fn endpoint(base_url: &str, path: &str) -> String {
    let base = format!("{}/", base_url.trim_end_matches('/'));
    let path = path.trim_start_matches('/');
    Url::parse(&base)
        .and_then(|b| b.join(path))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{base}{path}"))
}
