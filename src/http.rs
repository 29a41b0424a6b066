use reqwest::header::HeaderMap;
use reqwest::Response;
use std::time::Duration;
use url::Url;

use crate::error::PipelineError;

/// Builds the `reqwest::Client` shared by every backend client.
pub(crate) fn build_client(
    headers: HeaderMap,
    timeout: Option<Duration>,
) -> Result<reqwest::Client, PipelineError> {
    let mut builder = reqwest::Client::builder().default_headers(headers);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Turns a non-success response into an `ApiError` carrying the status and body.
pub(crate) async fn api_error(response: Response) -> PipelineError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    PipelineError::ApiError {
        message: format!("status {}: {}", status, body.trim()),
    }
}

/// Bearer `Authorization` header value, rejecting keys that are not valid header text.
pub(crate) fn bearer(key: &str) -> Result<reqwest::header::HeaderValue, PipelineError> {
    format!("Bearer {}", key)
        .parse()
        .map_err(|_| PipelineError::Config("API key contains invalid header characters".into()))
}

/// Parses a client base URL, adding the trailing slash `Url::join` needs to
/// keep the last path segment.
pub(crate) fn base_url(raw: &str) -> Result<Url, PipelineError> {
    let raw = raw.trim();
    if raw.ends_with('/') {
        Ok(Url::parse(raw)?)
    } else {
        Ok(Url::parse(&format!("{}/", raw))?)
    }
}
