//! TikTok Commercial Content API client.
//!
//! The research API currently serves EU data only; non-EU queries may come
//! back empty. That is logged once per call, not treated as an error.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{info, warn};

use adscope_common::identity::json_source_id;
use adscope_common::urls::{domain_from_url, is_blocked_url};
use adscope_common::{AdFormat, MediaType, NormalizedAd, Platform, ScrapeTarget};

use crate::batch::BatchBuffer;
use crate::http::{check_status, send_with_rate_limit_retry};
use crate::traits::{AdScraper, BatchSink, ScrapeOptions};

const TIKTOK_API_BASE: &str = "https://open.tiktokapis.com/v2/research/adlib/ad/query/";
const DEFAULT_LIMIT: usize = 25;

pub struct TikTokScraper {
    client: reqwest::Client,
    api_key: String,
}

impl TikTokScraper {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
        }
    }

    async fn search(&self, keyword: &str, limit: usize) -> Result<Vec<NormalizedAd>> {
        warn!("TikTok Commercial Content API serves EU data only; results may be empty");

        let payload = serde_json::json!({
            "filters": { "ad_text": { "values": [keyword] } },
            "max_count": limit,
        });

        let resp = send_with_rate_limit_retry("tiktok adlib", || {
            self.client
                .post(TIKTOK_API_BASE)
                .bearer_auth(&self.api_key)
                .json(&payload)
        })
        .await?;
        let resp = check_status("tiktok adlib", resp).await?;
        let data: serde_json::Value = resp.json().await.context("Malformed TikTok response")?;

        Ok(data
            .pointer("/data/ads")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().map(normalize_tiktok_ad).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl AdScraper for TikTokScraper {
    fn name(&self) -> &str {
        "tiktok"
    }

    async fn run(
        &self,
        target: &ScrapeTarget,
        options: &ScrapeOptions,
        sink: &dyn BatchSink,
    ) -> Result<u32> {
        let limit = options.max_results.unwrap_or(DEFAULT_LIMIT);
        let ads = self.search(&target.source_value, limit).await?;
        info!(target = %target.label(), count = ads.len(), "TikTok search complete");

        let mut buffer = BatchBuffer::new(sink);
        for ad in ads {
            buffer.push(ad).await?;
        }
        buffer.finish().await
    }
}

fn string_or_number(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn iso_date(value: Option<&serde_json::Value>) -> Option<NaiveDate> {
    let s = value?.as_str()?;
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()
}

pub fn normalize_tiktok_ad(raw: &serde_json::Value) -> NormalizedAd {
    let source_id = string_or_number(raw.get("ad_id"))
        .or_else(|| string_or_number(raw.get("id")))
        .unwrap_or_else(|| json_source_id("tiktok", raw));

    let advertiser_name = raw
        .get("business_name")
        .or_else(|| raw.get("advertiser_name"))
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown")
        .to_string();

    let videos = raw.get("videos").and_then(|v| v.as_array());
    let images = raw.get("images").and_then(|v| v.as_array());

    let (thumbnail, preview, media_type) = match videos.and_then(|v| v.first()) {
        Some(video) => {
            let thumb = video
                .get("cover_image_url")
                .or_else(|| video.get("thumbnail"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let url = video.get("url").and_then(|v| v.as_str()).map(String::from);
            (thumb, url, MediaType::Video)
        }
        None => match images.and_then(|v| v.first()) {
            Some(image) => {
                let thumb = image
                    .get("url")
                    .or_else(|| image.get("image_url"))
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                (thumb.clone(), (!thumb.is_empty()).then_some(thumb), MediaType::Image)
            }
            None => (String::new(), None, MediaType::Image),
        },
    };
    let format = if media_type == MediaType::Video {
        AdFormat::Video
    } else {
        AdFormat::Image
    };

    let landing = raw
        .get("landing_page_url")
        .and_then(|v| v.as_str())
        .map(String::from)
        .filter(|u| !is_blocked_url(u));

    let mut ad = NormalizedAd::new(source_id, Platform::Tiktok, format, advertiser_name, thumbnail, media_type);
    ad.advertiser_handle = raw
        .get("advertiser_handle")
        .and_then(|v| v.as_str())
        .map(String::from);
    ad.preview_url = preview;
    ad.ad_copy = raw
        .get("ad_text")
        .or_else(|| raw.get("ad_copy"))
        .and_then(|v| v.as_str())
        .map(String::from);
    ad.cta_text = raw.get("cta_text").and_then(|v| v.as_str()).map(String::from);
    ad.start_date = iso_date(raw.get("first_shown_date").or_else(|| raw.get("start_date")));
    ad.end_date = iso_date(raw.get("last_shown_date").or_else(|| raw.get("end_date")));
    ad.domain = landing.as_deref().and_then(domain_from_url);
    ad.landing_page_url = landing;
    ad.raw_data = raw.clone();
    ad
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_ad_is_normalized() {
        let raw = serde_json::json!({
            "ad_id": 777001,
            "business_name": "Acme",
            "ad_text": "Big winter drop",
            "videos": [{"cover_image_url": "https://p16.tiktokcdn.com/cover.jpg", "url": "https://v16.tiktokcdn.com/clip.mp4"}],
            "first_shown_date": "2026-01-02",
            "last_shown_date": "2026-02-02",
            "landing_page_url": "https://www.acme.com/drop",
        });
        let ad = normalize_tiktok_ad(&raw);
        assert_eq!(ad.source_id, "777001");
        assert_eq!(ad.platform, Platform::Tiktok);
        assert_eq!(ad.media_type, MediaType::Video);
        assert_eq!(ad.thumbnail_url, "https://p16.tiktokcdn.com/cover.jpg");
        assert_eq!(ad.preview_url.as_deref(), Some("https://v16.tiktokcdn.com/clip.mp4"));
        assert_eq!(ad.ad_copy.as_deref(), Some("Big winter drop"));
        assert_eq!(ad.domain.as_deref(), Some("acme.com"));
        assert_eq!(ad.start_date.unwrap().to_string(), "2026-01-02");
    }

    #[test]
    fn image_ad_uses_first_image() {
        let raw = serde_json::json!({
            "id": "im1",
            "business_name": "Acme",
            "images": [{"url": "https://p16.tiktokcdn.com/img.jpg"}],
        });
        let ad = normalize_tiktok_ad(&raw);
        assert_eq!(ad.media_type, MediaType::Image);
        assert_eq!(ad.thumbnail_url, "https://p16.tiktokcdn.com/img.jpg");
        assert_eq!(ad.preview_url.as_deref(), Some("https://p16.tiktokcdn.com/img.jpg"));
    }

    #[test]
    fn missing_ids_fall_back_to_stable_hash() {
        let raw = serde_json::json!({"business_name": "Acme"});
        assert_eq!(normalize_tiktok_ad(&raw).source_id, normalize_tiktok_ad(&raw).source_id);
    }

    #[test]
    fn blocked_landing_is_dropped() {
        let raw = serde_json::json!({
            "ad_id": "1",
            "business_name": "Acme",
            "images": [{"url": "https://p16.tiktokcdn.com/img.jpg"}],
            "landing_page_url": "https://story.kakao.com/acme",
        });
        let ad = normalize_tiktok_ad(&raw);
        assert_eq!(ad.landing_page_url, None);
        assert_eq!(ad.domain, None);
    }
}
