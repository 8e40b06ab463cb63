//! Minimal HTTP client for talking to a running server.

use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use serde_json::Value;

pub const DEFAULT_URL: &str = "http://localhost:5000";

/// Append path segments to a base URL, percent-encoding each segment.
pub fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base).with_context(|| format!("Invalid server URL {base}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("Server URL {base} cannot take a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// GET the endpoint under `base` and decode the JSON body.
pub async fn fetch_json(base: &str, segments: &[&str]) -> Result<Value> {
    let url = endpoint(base, segments)?;
    let resp = reqwest::get(url.clone())
        .await
        .with_context(|| format!("Could not reach {url}"))?
        .error_for_status()
        .with_context(|| format!("Request to {url} failed"))?;
    resp.json()
        .await
        .with_context(|| format!("Response from {url} was not JSON"))
}
