// Shared rate-limit handling for the API-based scrapers: one retry on 429,
// honoring Retry-After when the upstream provides it.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Send a request, retrying exactly once on 429. `build` is called per
/// attempt because `RequestBuilder` is consumed by `send`.
pub(crate) async fn send_with_rate_limit_retry<F>(label: &str, build: F) -> Result<reqwest::Response>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let resp = build().send().await.context(format!("{label} request failed"))?;

    if resp.status() != reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Ok(resp);
    }

    let delay = resp
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS);

    warn!(label, delay_secs = delay, "Rate limited, retrying once");
    tokio::time::sleep(Duration::from_secs(delay)).await;

    build()
        .send()
        .await
        .context(format!("{label} retry request failed"))
}

/// Treat any remaining non-success status as an error with the body attached.
pub(crate) async fn check_status(label: &str, resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body: String = resp.text().await.unwrap_or_default().chars().take(300).collect();
    anyhow::bail!("{label} returned {status}: {body}");
}
