//! SerpAPI client for the Google Ads Transparency Center engine: the
//! API-driven alternative to the browser walk, used when no browser service
//! is configured. Responses are cached for five minutes per query.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use tracing::info;

use adscope_common::identity::json_source_id;
use adscope_common::urls::{domain_from_url, is_blocked_url};
use adscope_common::{AdFormat, MediaType, NormalizedAd, Platform, ScrapeTarget};

use crate::batch::BatchBuffer;
use crate::cache::{TtlCache, DEFAULT_TTL};
use crate::http::{check_status, send_with_rate_limit_retry};
use crate::traits::{AdScraper, BatchSink, ScrapeOptions};

const SERPAPI_BASE: &str = "https://serpapi.com/search";
const DEFAULT_LIMIT: usize = 100;

pub struct SerpApiScraper {
    client: reqwest::Client,
    api_key: String,
    cache: TtlCache,
}

impl SerpApiScraper {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            cache: TtlCache::new(DEFAULT_TTL),
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<NormalizedAd>> {
        let cache_key = format!("google:{query}:{limit}");
        let raws = match self.cache.get(&cache_key) {
            Some(cached) => {
                info!(query, "SerpAPI cache hit");
                cached
            }
            None => {
                let num = limit.min(100).to_string();
                let resp = send_with_rate_limit_retry("serpapi", || {
                    self.client.get(SERPAPI_BASE).query(&[
                        ("engine", "google_ads_transparency_center"),
                        ("text", query),
                        ("api_key", self.api_key.as_str()),
                        ("num", num.as_str()),
                    ])
                })
                .await?;
                let resp = check_status("serpapi", resp).await?;
                let data: serde_json::Value =
                    resp.json().await.context("Malformed SerpAPI response")?;

                let raws: Vec<serde_json::Value> = data
                    .get("ad_creatives")
                    .and_then(|v| v.as_array())
                    .map(|arr| arr.iter().take(limit).cloned().collect())
                    .unwrap_or_default();
                self.cache.insert(&cache_key, raws.clone());
                raws
            }
        };

        // Text creatives carry no renderable content through this engine.
        Ok(raws
            .iter()
            .map(normalize_serp_ad)
            .filter(|ad| ad.format != AdFormat::Text)
            .collect())
    }
}

#[async_trait]
impl AdScraper for SerpApiScraper {
    fn name(&self) -> &str {
        "serpapi"
    }

    async fn run(
        &self,
        target: &ScrapeTarget,
        options: &ScrapeOptions,
        sink: &dyn BatchSink,
    ) -> Result<u32> {
        let limit = options.max_results.unwrap_or(DEFAULT_LIMIT);
        let ads = self.search(&target.source_value, limit).await?;
        info!(target = %target.label(), count = ads.len(), "SerpAPI search complete");

        let mut buffer = BatchBuffer::new(sink);
        for ad in ads {
            buffer.push(ad).await?;
        }
        buffer.finish().await
    }
}

fn unix_date(value: Option<&serde_json::Value>) -> Option<chrono::NaiveDate> {
    let ts = value?.as_i64()?;
    DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}

pub fn normalize_serp_ad(raw: &serde_json::Value) -> NormalizedAd {
    let source_id = raw
        .get("ad_creative_id")
        .and_then(|v| v.as_str())
        .map(String::from)
        .unwrap_or_else(|| json_source_id("google", raw));

    let advertiser_name = raw
        .get("advertiser")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown")
        .to_string();

    let format = match raw.get("format").and_then(|v| v.as_str()) {
        Some(f) => f
            .to_lowercase()
            .parse::<AdFormat>()
            .unwrap_or(AdFormat::Image),
        None => AdFormat::Image,
    };
    let format = match format {
        AdFormat::Text | AdFormat::Image | AdFormat::Video => format,
        _ => AdFormat::Image,
    };
    let media_type = if format == AdFormat::Video {
        MediaType::Video
    } else {
        MediaType::Image
    };

    let landing = raw
        .get("target_domain")
        .and_then(|v| v.as_str())
        .map(|d| {
            if d.starts_with("http") {
                d.to_string()
            } else {
                format!("https://{d}")
            }
        })
        .filter(|u| !is_blocked_url(u));

    let mut ad = NormalizedAd::new(
        source_id,
        Platform::Google,
        format,
        advertiser_name,
        raw.get("image")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        media_type,
    );
    ad.advertiser_handle = raw
        .get("advertiser_id")
        .and_then(|v| v.as_str())
        .map(String::from);
    ad.preview_url = raw
        .get("details_link")
        .and_then(|v| v.as_str())
        .map(String::from);
    ad.start_date = unix_date(raw.get("first_shown"));
    ad.end_date = unix_date(raw.get("last_shown"));
    ad.domain = landing.as_deref().and_then(domain_from_url);
    ad.landing_page_url = landing;
    ad.raw_data = raw.clone();
    ad
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serp_ad_is_normalized() {
        let raw = serde_json::json!({
            "ad_creative_id": "CR555",
            "advertiser": "Acme",
            "advertiser_id": "AR123",
            "image": "https://tpc.googlesyndication.com/simgad/42",
            "details_link": "https://adstransparency.google.com/advertiser/AR123/creative/CR555",
            "format": "image",
            "first_shown": 1700000000,
            "last_shown": 1705000000,
            "target_domain": "acme.com",
        });
        let ad = normalize_serp_ad(&raw);
        assert_eq!(ad.source_id, "CR555");
        assert_eq!(ad.advertiser_name, "Acme");
        assert_eq!(ad.platform, Platform::Google);
        assert_eq!(ad.media_type, MediaType::Image);
        assert_eq!(ad.landing_page_url.as_deref(), Some("https://acme.com"));
        assert_eq!(ad.domain.as_deref(), Some("acme.com"));
        assert_eq!(ad.start_date.unwrap().to_string(), "2023-11-14");
    }

    #[test]
    fn missing_creative_id_falls_back_to_stable_json_hash() {
        let raw = serde_json::json!({"advertiser": "Acme", "image": "https://x/1.jpg"});
        let a = normalize_serp_ad(&raw);
        let b = normalize_serp_ad(&raw);
        assert_eq!(a.source_id, b.source_id);
        assert_eq!(a.source_id.len(), 16);
    }

    #[test]
    fn unknown_format_defaults_to_image() {
        let raw = serde_json::json!({"ad_creative_id": "CR1", "format": "weird"});
        assert_eq!(normalize_serp_ad(&raw).format, AdFormat::Image);
    }

    #[test]
    fn blocked_target_domain_is_dropped() {
        let raw = serde_json::json!({
            "ad_creative_id": "CR1",
            "image": "https://x/1.jpg",
            "target_domain": "shop.naver.com",
        });
        let ad = normalize_serp_ad(&raw);
        assert_eq!(ad.landing_page_url, None);
        assert_eq!(ad.domain, None);
    }
}
