//! Shared plumbing for the HTTP backends.

use std::time::Duration;

use reqwest::{header, Response, StatusCode};

use crate::{Error, Result};

/// Build the client every HTTP backend uses.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|error| Error::Config(format!("failed to build HTTP client: {error}")))
}

/// Require `http(s)://` and drop trailing slashes.
pub(crate) fn normalize_base_url(raw: &str, what: &str) -> Result<String> {
    let base = raw.trim().trim_end_matches('/').to_string();
    if base.is_empty() {
        return Err(Error::Config(format!("{what} URL must not be empty")));
    }
    if !(base.starts_with("https://") || base.starts_with("http://")) {
        return Err(Error::Config(format!(
            "{what} URL must include http:// or https://"
        )));
    }
    Ok(base)
}

/// Percent-encode each segment of a slash-separated key.
pub(crate) fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Map a non-success response onto the error taxonomy.
///
/// 404 is `NotFound`, 429 and 503 are `RateLimited`, other 5xx are
/// transient, and any remaining failure is permanent.
pub(crate) async fn check_status(
    response: Response,
    backend: &'static str,
    operation: &str,
    target: &str,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(format!("{backend} {target}")));
    }
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
        return Err(Error::RateLimited {
            backend,
            retry_after: retry_after(&response),
        });
    }

    let code = status.as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = format!(
        "{backend} {operation} {target} failed with HTTP {code}: {}",
        body_excerpt(&body)
    );
    if status.is_server_error() {
        Err(Error::Network(message))
    } else {
        Err(Error::Storage(message))
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_retry_after)
}

/// Only the delta-seconds form is honoured.
pub(crate) fn parse_retry_after(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Leading part of an error body, enough to identify the server's complaint.
fn body_excerpt(body: &str) -> String {
    const MAX_CHARS: usize = 180;
    body.trim().chars().take(MAX_CHARS).collect()
}
