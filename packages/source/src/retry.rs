//! HTTP retry helpers for transient errors.
//!
//! Every call to the CLIMADA data API or the HDX catalogue goes through
//! [`send_json`], [`send_bytes`] or [`send_status`] rather than
//! `reqwest::RequestBuilder::send()` directly, so that timeouts, connection
//! resets, rate limiting and server errors are retried with exponential
//! backoff.
//!
//! ```ignore
//! let body = retry::send_json(|| client.get(&url).query(&params)).await?;
//! let file = retry::send_bytes(|| client.get(&download_url)).await?;
//! ```

use std::time::Duration;

use crate::SourceError;

/// Maximum number of retry attempts for transient HTTP errors.
///
/// With exponential backoff (2s, 4s, 8s, 16s, 32s) the total wait before
/// giving up is 62 seconds.
const MAX_RETRIES: u32 = 5;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// Builds a client with a user agent and a per-request timeout.
///
/// # Errors
///
/// Returns [`SourceError`] if the client cannot be built.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(Into::into)
}

/// Sends an HTTP request and parses the response body as JSON.
///
/// The `build_request` closure is called on each attempt, since builders
/// are consumed by `.send()`.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after all retries, the
/// server returns a non-retryable status code, or the body is not JSON.
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(build_request: F) -> Result<serde_json::Value, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request, MAX_RETRIES, false).await?;
    let url = response.url().to_string();
    let status = response.status();
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        log::error!(
            "JSON parse failed\n  url: {url}\n  status: {status}\n  body preview: {}",
            preview(&text)
        );
        SourceError::Normalization {
            message: format!(
                "JSON parse failed: {e} (status={status}, received {} bytes)",
                text.len()
            ),
        }
    })
}

/// Sends an HTTP request and returns the raw response body.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after all retries or the
/// body cannot be read.
#[allow(clippy::future_not_send)]
pub async fn send_bytes<F>(build_request: F) -> Result<Vec<u8>, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request, MAX_RETRIES, false).await?;
    Ok(response.bytes().await?.to_vec())
}

/// Sends an HTTP request and returns the final status.
///
/// Transient failures are retried as in [`send_json`], but client errors
/// such as 404 are returned as a status instead of an error, for callers
/// that treat "not found" as an answer.
///
/// # Errors
///
/// Returns [`SourceError`] if the request cannot be sent or the server
/// keeps failing after all retries.
pub async fn send_status<F>(build_request: F) -> Result<reqwest::StatusCode, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let response = send_inner(&build_request, MAX_RETRIES, true).await?;
    Ok(response.status())
}

/// What to do with a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Accept,
    Retry,
    Fail,
}

fn classify(status: reqwest::StatusCode) -> Disposition {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Disposition::Retry
    } else if status.is_client_error() {
        Disposition::Fail
    } else {
        Disposition::Accept
    }
}

/// Core retry loop shared by the `send_*` helpers. With
/// `pass_client_errors`, 4xx responses are returned rather than failed.
#[allow(clippy::future_not_send)]
async fn send_inner<F>(
    build_request: &F,
    max_retries: u32,
    pass_client_errors: bool,
) -> Result<reqwest::Response, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = Duration::from_secs(1u64 << attempt); // 2s, 4s, 8s
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    attempt += 1;
                    continue;
                }
                return Err(SourceError::Http(e));
            }
            Ok(response) => {
                let status = response.status();
                match classify(status) {
                    Disposition::Accept => return Ok(response),
                    Disposition::Retry if attempt < max_retries => {
                        log::warn!("  HTTP {status} from {}", response.url());
                        attempt += 1;
                    }
                    Disposition::Retry => {
                        return Err(SourceError::Normalization {
                            message: format!("HTTP {status} after {max_retries} retries"),
                        });
                    }
                    Disposition::Fail if pass_client_errors => return Ok(response),
                    Disposition::Fail => {
                        let url = response.url().to_string();
                        let body = response.text().await.unwrap_or_default();
                        log::debug!("HTTP {status} from {url}: {}", preview(&body));
                        return Err(SourceError::Normalization {
                            message: format!("HTTP {status} from {url}"),
                        });
                    }
                }
            }
        }
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

fn preview(text: &str) -> &str {
    if text.len() <= BODY_PREVIEW_LEN {
        return text;
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
