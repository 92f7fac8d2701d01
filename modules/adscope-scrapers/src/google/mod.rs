//! Google Ads Transparency scraper: browser-driven listing walks plus the
//! per-creative variant extraction in [`variants`].

pub mod scripts;
pub mod variants;

use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Days, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use adscope_common::urls::{extract_creative_id, is_blocked_url, normalize_domain};
use adscope_common::{ScrapeTarget, SourceType};
use browserless_client::{BrowserlessClient, ContentRequest};

use crate::batch::BatchBuffer;
use crate::traits::{AdScraper, BatchSink, ScrapeOptions};
use variants::{collect_variants, page_common_landing, parse_sadbundle_adurl, variant_to_ad};
use variants::{DetailSnapshot, FrameSnapshot};

const TRANSPARENCY_BASE: &str = "https://adstransparency.google.com";
/// Hard ceiling on the listing scroll loop.
const SCROLL_TIMEOUT_MS: u64 = 300_000;
/// Consecutive zero-growth scrolls before the listing walk stops.
const SCROLL_STALL_LIMIT: u32 = 3;
const SCROLL_PAUSE_MS: u64 = 2_000;
const MAX_SCROLLS_UNLIMITED: u32 = 100;
const MAX_SCROLLS_BOUNDED: u32 = 15;
/// Keyword mode visits at most this many advertisers from the dropdown.
const MAX_ADVERTISERS: usize = 3;

pub struct GoogleScraper {
    browser: BrowserlessClient,
    region: String,
}

#[derive(Deserialize)]
struct ListingResult {
    #[serde(default)]
    anchors: Vec<String>,
    #[serde(default, rename = "sawExpansion")]
    saw_expansion: bool,
}

#[derive(Deserialize)]
struct AdvertisersResult {
    #[serde(default)]
    advertisers: Vec<String>,
}

#[derive(Deserialize)]
struct DetailResult {
    #[serde(default)]
    found: bool,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    advertiser: String,
    #[serde(default)]
    html: String,
    #[serde(default)]
    body_text: String,
    #[serde(default)]
    frames: Vec<FrameSnapshot>,
}

impl GoogleScraper {
    pub fn new(browser: BrowserlessClient, region: &str) -> Self {
        Self {
            browser,
            region: region.to_string(),
        }
    }

    async fn scrape_domain(
        &self,
        target: &ScrapeTarget,
        options: &ScrapeOptions,
        sink: &dyn BatchSink,
    ) -> Result<u32> {
        let bare = normalize_domain(&target.source_value);
        let listing_url = format!("{TRANSPARENCY_BASE}/?region={}&domain={bare}", self.region);
        info!(domain = %bare, mode = %options.mode, "Google domain scrape starting");

        let max_scrolls = if options.max_results.is_none() {
            MAX_SCROLLS_UNLIMITED
        } else {
            MAX_SCROLLS_BOUNDED
        };
        let listing_context = serde_json::json!({
            "url": listing_url,
            "maxResults": options.max_results.unwrap_or(0),
            "maxScrolls": max_scrolls,
            "stallLimit": SCROLL_STALL_LIMIT,
            "timeoutMs": SCROLL_TIMEOUT_MS,
            "scrollPauseMs": SCROLL_PAUSE_MS,
            "settleMs": 5_000,
        });
        // A dead root listing is retried once before the target fails.
        let raw = match self
            .browser
            .function(scripts::LISTING_SCROLL, listing_context.clone())
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(domain = %bare, error = %e, "Listing walk failed, retrying once");
                self.browser
                    .function(scripts::LISTING_SCROLL, listing_context)
                    .await
                    .context("Listing walk failed")?
            }
        };
        let listing: ListingResult =
            serde_json::from_value(raw).context("Malformed listing result")?;

        if !listing.saw_expansion {
            warn!(domain = %bare, "'See all ads' expansion button not found, using initial grid only");
        }

        let mut anchors = listing.anchors;
        if let Some(max) = options.max_results {
            anchors.truncate(max);
        }
        info!(domain = %bare, anchors = anchors.len(), "Creative anchors collected");

        if options.is_incremental() {
            let (remaining, skipped) =
                filter_known_anchors(anchors, &options.known_creative_ids);
            info!(
                domain = %bare,
                skipped,
                remaining = remaining.len(),
                "Incremental filter applied"
            );
            anchors = remaining;
            if anchors.is_empty() {
                info!(domain = %bare, "Incremental scrape: no new creatives");
                return Ok(0);
            }
        }

        let mut buffer = BatchBuffer::new(sink);
        let mut seen = HashSet::new();
        let mut total = 0usize;
        self.visit_details(&anchors, &bare, options, &mut buffer, &mut seen, &mut total)
            .await?;

        let emitted = buffer.finish().await?;
        info!(domain = %bare, emitted, "Google domain scrape complete");
        Ok(emitted)
    }

    async fn scrape_keyword(
        &self,
        target: &ScrapeTarget,
        options: &ScrapeOptions,
        sink: &dyn BatchSink,
    ) -> Result<u32> {
        let keyword = target.source_value.trim();
        let today = Utc::now().date_naive();
        let window_start = today - Days::new(90);
        let base_url = format!(
            "{TRANSPARENCY_BASE}/?region={}&start_date={}&end_date={}",
            self.region,
            window_start.format("%Y-%m-%d"),
            today.format("%Y-%m-%d"),
        );
        info!(keyword, "Google keyword scrape starting");

        let dropdown_context = serde_json::json!({ "url": base_url, "keyword": keyword });
        let raw = match self
            .browser
            .function(scripts::KEYWORD_ADVERTISERS, dropdown_context.clone())
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(keyword, error = %e, "Advertiser dropdown walk failed, retrying once");
                self.browser
                    .function(scripts::KEYWORD_ADVERTISERS, dropdown_context)
                    .await
                    .context("Advertiser dropdown walk failed")?
            }
        };
        let advertisers: AdvertisersResult =
            serde_json::from_value(raw).context("Malformed advertiser list")?;

        if advertisers.advertisers.is_empty() {
            warn!(keyword, "No advertisers found in dropdown");
            return Ok(0);
        }
        let to_visit = &advertisers.advertisers[..advertisers.advertisers.len().min(MAX_ADVERTISERS)];
        info!(
            keyword,
            found = advertisers.advertisers.len(),
            visiting = to_visit.len(),
            "Advertiser dropdown collected"
        );

        let mut buffer = BatchBuffer::new(sink);
        let mut seen = HashSet::new();
        let mut total = 0usize;

        for (index, advertiser) in to_visit.iter().enumerate() {
            if !options.under_limit(total) {
                break;
            }
            let remaining = options.max_results.map(|m| m - total).unwrap_or(0);

            let result = self
                .browser
                .function(
                    scripts::KEYWORD_ADVERTISER_ADS,
                    serde_json::json!({
                        "url": base_url,
                        "keyword": keyword,
                        "advertiserIndex": index,
                        "maxCreatives": remaining,
                    }),
                )
                .await;
            let anchors = match result {
                Ok(raw) => {
                    serde_json::from_value::<ListingResult>(raw)
                        .map(|r| r.anchors)
                        .unwrap_or_default()
                }
                Err(e) => {
                    warn!(keyword, advertiser, error = %e, "Advertiser walk failed, skipping");
                    continue;
                }
            };

            info!(keyword, advertiser, anchors = anchors.len(), "Advertiser creatives collected");
            self.visit_details(&anchors, advertiser, options, &mut buffer, &mut seen, &mut total)
                .await?;
        }

        let emitted = buffer.finish().await?;
        info!(keyword, emitted, "Google keyword scrape complete");
        Ok(emitted)
    }

    /// Visit each detail page, extract variants, resolve landing URLs, and
    /// push normalized ads. A single dead page is a warning; the walk
    /// continues.
    async fn visit_details(
        &self,
        anchors: &[String],
        advertiser_fallback: &str,
        options: &ScrapeOptions,
        buffer: &mut BatchBuffer<'_>,
        seen: &mut HashSet<String>,
        total: &mut usize,
    ) -> Result<()> {
        for (i, href) in anchors.iter().enumerate() {
            if !options.under_limit(*total) {
                info!(max = ?options.max_results, "Result cap reached, stopping detail walk");
                return Ok(());
            }

            let detail_url = build_detail_url(href, &self.region);
            debug!(n = i + 1, of = anchors.len(), href, "Visiting detail page");

            let raw = match self
                .browser
                .function(
                    scripts::DETAIL_SNAPSHOT,
                    serde_json::json!({
                        "url": detail_url,
                        "containerTimeoutMs": 5_000,
                        "contentTimeoutMs": 5_000,
                    }),
                )
                .await
            {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(href, error = %e, "Detail page load failed, skipping");
                    continue;
                }
            };
            let detail: DetailResult = match serde_json::from_value(raw) {
                Ok(d) => d,
                Err(e) => {
                    warn!(href, error = %e, "Malformed detail snapshot, skipping");
                    continue;
                }
            };
            if !detail.found {
                warn!(href, reason = ?detail.reason, "Detail page skipped");
                continue;
            }

            let advertiser = if detail.advertiser.is_empty() {
                advertiser_fallback.to_string()
            } else {
                detail.advertiser.clone()
            };
            let snapshot = DetailSnapshot {
                advertiser: advertiser.clone(),
                html: detail.html,
                body_text: detail.body_text,
                frames: detail.frames,
            };

            let variants = collect_variants(&snapshot);
            if variants.is_empty() {
                debug!(href, "No variants resolved");
                continue;
            }
            info!(advertiser = %advertiser, variants = variants.len(), "Variants collected");

            let page_landing = page_common_landing(&snapshot).filter(|u| !is_blocked_url(u));
            let creative_id = extract_creative_id(href);

            for variant in &variants {
                let mut landing = None;
                if variant.content_url.contains("sadbundle") {
                    landing = match self.sadbundle_landing(&variant.content_url).await {
                        Ok(url) => url.filter(|u| !is_blocked_url(u)),
                        Err(e) => {
                            warn!(content_url = %variant.content_url, error = %e, "sadbundle landing resolution failed");
                            None
                        }
                    };
                }
                let landing = landing
                    .or_else(|| {
                        variant
                            .anchor_href
                            .clone()
                            .filter(|a| !is_blocked_url(a))
                    })
                    .or_else(|| page_landing.clone());

                let mut ad = variant_to_ad(&advertiser, variant, landing.as_deref());
                ad.creative_id = creative_id.clone();

                if seen.insert(ad.source_id.clone()) {
                    buffer.push(ad).await?;
                    *total += 1;
                    if !options.under_limit(*total) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Navigate to a sadbundle document and recover its `adurl=` parameter.
    async fn sadbundle_landing(&self, sadbundle_url: &str) -> Result<Option<String>> {
        let request = ContentRequest::new(sadbundle_url)
            .wait_until("load")
            .goto_timeout(15_000)
            .settle(2_000);
        let html = self.browser.content(&request).await?;
        Ok(parse_sadbundle_adurl(&html))
    }
}

#[async_trait]
impl AdScraper for GoogleScraper {
    fn name(&self) -> &str {
        "google"
    }

    async fn run(
        &self,
        target: &ScrapeTarget,
        options: &ScrapeOptions,
        sink: &dyn BatchSink,
    ) -> Result<u32> {
        match target.source_type {
            SourceType::Domain => self.scrape_domain(target, options, sink).await,
            SourceType::Keyword => self.scrape_keyword(target, options, sink).await,
            SourceType::PageId => {
                anyhow::bail!("page_id sources are not supported on google")
            }
        }
    }
}

fn build_detail_url(href: &str, region: &str) -> String {
    let mut url = format!("{TRANSPARENCY_BASE}{href}");
    if !url.contains("region=") {
        let sep = if url.contains('?') { '&' } else { '?' };
        url.push_str(&format!("{sep}region={region}"));
    }
    url
}

/// Drop anchors whose creative id is already stored. Anchors without a
/// parseable id are kept (they still need a visit to be identified).
fn filter_known_anchors(
    anchors: Vec<String>,
    known: &HashSet<String>,
) -> (Vec<String>, usize) {
    let before = anchors.len();
    let remaining: Vec<String> = anchors
        .into_iter()
        .filter(|href| {
            extract_creative_id(href).map_or(true, |cid| !known.contains(&cid))
        })
        .collect();
    let skipped = before - remaining.len();
    (remaining, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_url_gets_region_appended_once() {
        assert_eq!(
            build_detail_url("/advertiser/AR1/creative/CR1", "KR"),
            "https://adstransparency.google.com/advertiser/AR1/creative/CR1?region=KR"
        );
        assert_eq!(
            build_detail_url("/advertiser/AR1/creative/CR1?foo=1", "KR"),
            "https://adstransparency.google.com/advertiser/AR1/creative/CR1?foo=1&region=KR"
        );
        assert_eq!(
            build_detail_url("/advertiser/AR1/creative/CR1?region=KR", "KR"),
            "https://adstransparency.google.com/advertiser/AR1/creative/CR1?region=KR"
        );
    }

    #[test]
    fn known_creatives_are_filtered_unknown_kept() {
        let known: HashSet<String> = ["CR1".to_string(), "CR2".to_string()].into();
        let anchors = vec![
            "/advertiser/A/creative/CR1".to_string(),
            "/advertiser/A/creative/CR2".to_string(),
            "/advertiser/A/creative/CR3".to_string(),
            "/advertiser/A/unparseable".to_string(),
        ];
        let (remaining, skipped) = filter_known_anchors(anchors, &known);
        assert_eq!(skipped, 2);
        assert_eq!(
            remaining,
            vec![
                "/advertiser/A/creative/CR3".to_string(),
                "/advertiser/A/unparseable".to_string(),
            ]
        );
    }

    #[test]
    fn all_known_yields_empty_visit_list() {
        let known: HashSet<String> =
            ["CR1".to_string(), "CR2".to_string(), "CR3".to_string()].into();
        let anchors = vec![
            "/a/creative/CR1".to_string(),
            "/a/creative/CR2".to_string(),
            "/a/creative/CR3".to_string(),
        ];
        let (remaining, skipped) = filter_known_anchors(anchors, &known);
        assert!(remaining.is_empty());
        assert_eq!(skipped, 3);
    }
}
