pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use serde::Serialize;

/// Desktop viewport + UA shaping. The only anti-bot measures taken: both
/// transparency centers render differently (or not at all) for bare
/// headless defaults.
pub const DEFAULT_VIEWPORT: (u32, u32) = (1920, 1080);
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

/// Options for a `/content` fetch. Timeouts are per-navigation; the selector
/// wait is best-effort on the Browserless side.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    pub url: String,
    pub goto_options: GotoOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_selector: Option<WaitForSelector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_timeout: Option<u64>,
    pub user_agent: String,
    pub viewport: Viewport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GotoOptions {
    pub wait_until: String,
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WaitForSelector {
    pub selector: String,
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl ContentRequest {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            goto_options: GotoOptions {
                wait_until: "load".to_string(),
                timeout: 60_000,
            },
            wait_for_selector: None,
            wait_for_timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport: Viewport {
                width: DEFAULT_VIEWPORT.0,
                height: DEFAULT_VIEWPORT.1,
            },
        }
    }

    pub fn wait_until(mut self, condition: &str) -> Self {
        self.goto_options.wait_until = condition.to_string();
        self
    }

    pub fn goto_timeout(mut self, timeout_ms: u64) -> Self {
        self.goto_options.timeout = timeout_ms;
        self
    }

    pub fn selector(mut self, selector: &str, timeout_ms: u64) -> Self {
        self.wait_for_selector = Some(WaitForSelector {
            selector: selector.to_string(),
            timeout: timeout_ms,
        });
        self
    }

    pub fn settle(mut self, timeout_ms: u64) -> Self {
        self.wait_for_timeout = Some(timeout_ms);
        self
    }
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            // Scroll loops and sadbundle hops run inside a single call; the
            // outer HTTP timeout must sit above the 5-minute scroll ceiling.
            .timeout(Duration::from_secs(360))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let mut endpoint = format!("{}{path}", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }

    /// Fetch fully-rendered HTML for a URL via the `/content` endpoint.
    pub async fn content(&self, request: &ContentRequest) -> Result<String> {
        let resp = self
            .client
            .post(self.endpoint("/content"))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }

    /// Run a Puppeteer ESM script via the `/function` endpoint and parse its
    /// JSON return value. `context` is exposed to the script verbatim.
    pub async fn function(
        &self,
        code: &str,
        context: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let body = serde_json::json!({
            "code": code,
            "context": context,
        });

        let resp = self
            .client
            .post(self.endpoint("/function"))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            let head: String = text.chars().take(200).collect();
            BrowserlessError::BadScriptOutput(format!("{e}: {head}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_request_serializes_camel_case() {
        let req = ContentRequest::new("https://example.com")
            .wait_until("domcontentloaded")
            .selector("creative-details .ad-container", 5_000)
            .settle(1_000);
        let json = serde_json::to_value(&req).unwrap();

        assert_eq!(json["url"], "https://example.com");
        assert_eq!(json["gotoOptions"]["waitUntil"], "domcontentloaded");
        assert_eq!(json["gotoOptions"]["timeout"], 60_000);
        assert_eq!(
            json["waitForSelector"]["selector"],
            "creative-details .ad-container"
        );
        assert_eq!(json["waitForTimeout"], 1_000);
        assert_eq!(json["viewport"]["width"], 1920);
    }

    #[test]
    fn optional_waits_are_omitted() {
        let req = ContentRequest::new("https://example.com");
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("waitForSelector").is_none());
        assert!(json.get("waitForTimeout").is_none());
    }
}
