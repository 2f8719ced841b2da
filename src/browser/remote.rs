//! Remote DevTools endpoint discovery

use crate::browser::{BrowserError, BrowserResult};
use std::time::Duration;

/// Resolves a DevTools HTTP endpoint to its browser WebSocket URL
///
/// Accepts `http(s)://host:port` or `ws(s)://host:port`; the WebSocket URL is
/// read from `/json/version`.
pub async fn resolve_ws_url(endpoint: &str) -> BrowserResult<String> {
    let http_url = endpoint
        .replacen("ws://", "http://", 1)
        .replacen("wss://", "https://", 1);
    let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

    tracing::debug!("Resolving DevTools endpoint via {}", version_url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| BrowserError::Launch(e.to_string()))?;

    let response = client
        .get(&version_url)
        .send()
        .await
        .map_err(|e| BrowserError::Launch(format!("{}: {}", version_url, e)))?;

    if !response.status().is_success() {
        return Err(BrowserError::Launch(format!(
            "{} returned HTTP {}",
            version_url,
            response.status()
        )));
    }

    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| BrowserError::Launch(format!("invalid version info: {}", e)))?;

    body.get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| BrowserError::Launch("no webSocketDebuggerUrl in response".to_string()))
}
