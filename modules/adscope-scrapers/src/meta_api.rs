//! Meta Graph `ads_archive` client. Covers the API-driven Meta path and all
//! Instagram targets (Instagram ads only surface through the Graph API's
//! `publisher_platforms`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::info;

use adscope_common::identity::json_source_id;
use adscope_common::urls::{domain_from_url, is_blocked_url};
use adscope_common::{AdFormat, MediaType, NormalizedAd, Platform, ScrapeTarget};

use crate::batch::BatchBuffer;
use crate::http::{check_status, send_with_rate_limit_retry};
use crate::traits::{AdScraper, BatchSink, ScrapeOptions};

const GRAPH_BASE: &str = "https://graph.facebook.com/v23.0";
const DEFAULT_LIMIT: usize = 25;

const AD_FIELDS: &str = "id,ad_creative_bodies,ad_creative_link_titles,ad_creative_link_captions,\
ad_snapshot_url,page_name,page_id,publisher_platforms,estimated_audience_size,impressions,spend,\
currency,ad_delivery_start_time,ad_delivery_stop_time";

pub struct MetaApiScraper {
    client: reqwest::Client,
    access_token: String,
    country: String,
}

impl MetaApiScraper {
    pub fn new(access_token: &str, country: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.to_string(),
            country: country.to_string(),
        }
    }

    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<NormalizedAd>> {
        let countries = format!("[\"{}\"]", self.country);
        let limit_str = limit.to_string();

        let resp = send_with_rate_limit_retry("ads_archive", || {
            self.client
                .get(format!("{GRAPH_BASE}/ads_archive"))
                .query(&[
                    ("access_token", self.access_token.as_str()),
                    ("search_terms", keyword),
                    ("ad_reached_countries", countries.as_str()),
                    ("ad_type", "ALL"),
                    ("fields", AD_FIELDS),
                    ("limit", limit_str.as_str()),
                ])
        })
        .await?;
        let resp = check_status("ads_archive", resp).await?;
        let data: serde_json::Value = resp.json().await.context("Malformed ads_archive response")?;

        Ok(data
            .get("data")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().map(normalize_archive_ad).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl AdScraper for MetaApiScraper {
    fn name(&self) -> &str {
        "meta_api"
    }

    async fn run(
        &self,
        target: &ScrapeTarget,
        options: &ScrapeOptions,
        sink: &dyn BatchSink,
    ) -> Result<u32> {
        let limit = options.max_results.unwrap_or(DEFAULT_LIMIT);
        let ads = self.search(&target.source_value, limit).await?;
        info!(target = %target.label(), count = ads.len(), "ads_archive search complete");

        let mut buffer = BatchBuffer::new(sink);
        for ad in ads {
            buffer.push(ad).await?;
        }
        buffer.finish().await
    }
}

fn iso_date(value: Option<&serde_json::Value>) -> Option<NaiveDate> {
    let s = value?.as_str()?;
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()
}

fn first_str(raw: &serde_json::Value, key: &str) -> Option<String> {
    raw.get(key)?
        .as_array()?
        .first()?
        .as_str()
        .map(String::from)
}

pub fn normalize_archive_ad(raw: &serde_json::Value) -> NormalizedAd {
    let publisher_platforms: Vec<&str> = raw
        .get("publisher_platforms")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|p| p.as_str()).collect())
        .unwrap_or_default();
    let platform = if publisher_platforms.contains(&"instagram")
        && !publisher_platforms.contains(&"facebook")
    {
        Platform::Instagram
    } else {
        Platform::Meta
    };

    let source_id = raw
        .get("id")
        .and_then(|v| v.as_str())
        .map(String::from)
        .unwrap_or_else(|| json_source_id("meta_api", raw));

    let snapshot_url = raw
        .get("ad_snapshot_url")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let mut ad = NormalizedAd::new(
        source_id,
        platform,
        AdFormat::Image,
        raw.get("page_name")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .to_string(),
        snapshot_url.clone(),
        MediaType::Image,
    );
    ad.advertiser_handle = raw.get("page_id").and_then(|v| v.as_str()).map(String::from);
    ad.preview_url = (!snapshot_url.is_empty()).then_some(snapshot_url);
    ad.ad_copy = first_str(raw, "ad_creative_bodies");
    ad.cta_text = first_str(raw, "ad_creative_link_titles");
    ad.start_date = iso_date(raw.get("ad_delivery_start_time"));
    ad.end_date = iso_date(raw.get("ad_delivery_stop_time"));

    let landing = first_str(raw, "ad_creative_link_captions")
        .map(|c| if c.starts_with("http") { c } else { format!("https://{c}") })
        .filter(|u| !is_blocked_url(u));
    ad.domain = landing.as_deref().and_then(domain_from_url);
    ad.landing_page_url = landing;
    ad.raw_data = raw.clone();
    ad
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_ad_is_normalized() {
        let raw = serde_json::json!({
            "id": "1234567890",
            "page_name": "Acme Korea",
            "page_id": "987",
            "ad_snapshot_url": "https://www.facebook.com/ads/archive/render_ad/?id=1234567890",
            "ad_creative_bodies": ["Winter sale"],
            "ad_creative_link_titles": ["Shop now"],
            "ad_creative_link_captions": ["acme.com"],
            "publisher_platforms": ["facebook", "instagram"],
            "ad_delivery_start_time": "2026-01-15T00:00:00+0000",
            "ad_delivery_stop_time": "2026-02-15",
        });
        let ad = normalize_archive_ad(&raw);
        assert_eq!(ad.source_id, "1234567890");
        assert_eq!(ad.platform, Platform::Meta);
        assert_eq!(ad.ad_copy.as_deref(), Some("Winter sale"));
        assert_eq!(ad.cta_text.as_deref(), Some("Shop now"));
        assert_eq!(ad.landing_page_url.as_deref(), Some("https://acme.com"));
        assert_eq!(ad.domain.as_deref(), Some("acme.com"));
        assert_eq!(ad.start_date.unwrap().to_string(), "2026-01-15");
        assert_eq!(ad.end_date.unwrap().to_string(), "2026-02-15");
    }

    #[test]
    fn instagram_only_ads_map_to_instagram_platform() {
        let raw = serde_json::json!({
            "id": "1",
            "page_name": "Acme",
            "ad_snapshot_url": "https://www.facebook.com/ads/archive/render_ad/?id=1",
            "publisher_platforms": ["instagram"],
        });
        assert_eq!(normalize_archive_ad(&raw).platform, Platform::Instagram);
    }

    #[test]
    fn missing_id_gets_deterministic_fallback() {
        let raw = serde_json::json!({"page_name": "Acme"});
        assert_eq!(
            normalize_archive_ad(&raw).source_id,
            normalize_archive_ad(&raw).source_id
        );
    }
}
