//! Meta Ad Library scraper. The library is a scroll-loaded feed (roughly
//! newest-first); cards carry everything, so there are no detail pages.
//!
//! A Browserless session is per-call, so the scroll walk runs in escalating
//! passes: each pass re-opens the listing, scrolls N rounds, and extracts
//! every loaded card. After a pass the normalized cards are checked against
//! the known-identity set; a hit means the feed has reached already-stored
//! territory and the walk stops.

use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Days, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use adscope_common::identity::meta_source_id;
use adscope_common::urls::{domain_from_url, is_blocked_url};
use adscope_common::{AdFormat, MediaType, NormalizedAd, Platform, ScrapeTarget, SourceType};
use browserless_client::BrowserlessClient;

use crate::batch::BatchBuffer;
use crate::traits::{AdScraper, BatchSink, ScrapeOptions};

const AD_LIBRARY_BASE: &str = "https://www.facebook.com/ads/library/";
/// Scroll rounds in the first pass; also the sampling cadence for the
/// incremental early-termination check.
const META_SAMPLE_CADENCE: u32 = 3;
const SCROLL_PAUSE_MS: u64 = 2_000;

pub struct MetaScraper {
    browser: BrowserlessClient,
    region: String,
}

/// One ad card as the in-page extraction returns it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCard {
    #[serde(default)]
    pub advertiser_name: String,
    #[serde(default)]
    pub content_url: String,
    /// `<video poster>` when the card is a video.
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub landing_page_url: String,
}

#[derive(Deserialize)]
struct ScrollResult {
    #[serde(default)]
    cards: Vec<RawCard>,
    #[serde(default, rename = "heightStalled")]
    height_stalled: bool,
}

impl MetaScraper {
    pub fn new(browser: BrowserlessClient, region: &str) -> Self {
        Self {
            browser,
            region: region.to_string(),
        }
    }

    fn listing_url(&self, target: &ScrapeTarget) -> String {
        let today = Utc::now().date_naive();
        let window_start = today - Days::new(90);
        let dates = format!(
            "&start_date[min]={}&start_date[max]={}",
            window_start.format("%Y-%m-%d"),
            today.format("%Y-%m-%d"),
        );

        match target.source_type {
            SourceType::PageId => {
                let page_id = parse_page_id(&target.source_value);
                format!(
                    "{AD_LIBRARY_BASE}?active_status=active&ad_type=all&country={}\
                     &view_all_page_id={page_id}&search_type=page&media_type=all{dates}",
                    self.region,
                )
            }
            _ => {
                let keyword = urlencoding::encode(&target.source_value);
                format!(
                    "{AD_LIBRARY_BASE}?active_status=active&ad_type=all&country={}\
                     &q={keyword}&search_type=keyword_unordered{dates}",
                    self.region,
                )
            }
        }
    }
}

#[async_trait]
impl AdScraper for MetaScraper {
    fn name(&self) -> &str {
        "meta"
    }

    async fn run(
        &self,
        target: &ScrapeTarget,
        options: &ScrapeOptions,
        sink: &dyn BatchSink,
    ) -> Result<u32> {
        let url = self.listing_url(target);
        let cap = scroll_cap(options.max_results);
        info!(target = %target.label(), scroll_cap = cap, "Meta scrape starting");

        let mut rounds = META_SAMPLE_CADENCE.min(cap);
        let mut cards: Vec<RawCard> = Vec::new();

        loop {
            let pass_context = serde_json::json!({
                "url": url,
                "maxScrolls": rounds,
                "scrollPauseMs": SCROLL_PAUSE_MS,
            });
            // A dead listing is retried once before the target fails.
            let raw = match self.browser.function(SCROLL_EXTRACT, pass_context.clone()).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(target = %target.label(), error = %e, "Listing walk failed, retrying once");
                    self.browser
                        .function(SCROLL_EXTRACT, pass_context)
                        .await
                        .context("Ad Library listing walk failed")?
                }
            };
            let result: ScrollResult =
                serde_json::from_value(raw).context("Malformed listing result")?;
            cards = result.cards;
            info!(target = %target.label(), rounds, cards = cards.len(), "Scroll pass complete");

            if result.height_stalled {
                break;
            }
            if let Some(max) = options.max_results {
                if cards.len() >= max {
                    break;
                }
            }
            if options.is_incremental() && !options.known_source_ids.is_empty() {
                let hit = cards
                    .iter()
                    .any(|c| options.known_source_ids.contains(&card_source_id(c)));
                if hit {
                    info!(target = %target.label(), "Known ad reached, stopping scroll walk");
                    break;
                }
            }
            if rounds >= cap {
                break;
            }
            rounds = (rounds * 2).min(cap);
        }

        if cards.is_empty() {
            warn!(target = %target.label(), "No ad cards extracted");
            return Ok(0);
        }

        let mut buffer = BatchBuffer::new(sink);
        let mut seen = HashSet::new();
        let mut emitted = 0usize;
        for card in &cards {
            if !options.under_limit(emitted) {
                break;
            }
            let ad = normalize_card(card);
            if ad.source_id.is_empty() || !seen.insert(ad.source_id.clone()) {
                continue;
            }
            buffer.push(ad).await?;
            emitted += 1;
        }

        let total = buffer.finish().await?;
        info!(target = %target.label(), total, "Meta scrape complete");
        Ok(total)
    }
}

fn card_source_id(card: &RawCard) -> String {
    meta_source_id(&card.advertiser_name, &card.content_url)
}

/// Turn one raw card into the shared ad schema. Blocked landing pages are
/// dropped but the ad is kept.
pub fn normalize_card(card: &RawCard) -> NormalizedAd {
    let has_video =
        card.thumbnail_url.is_some() || card.content_url.to_lowercase().contains("video");
    let media_type = if has_video { MediaType::Video } else { MediaType::Image };
    let format = if has_video { AdFormat::Video } else { AdFormat::Image };

    let thumbnail = if has_video {
        card.thumbnail_url.clone().unwrap_or_default()
    } else {
        card.content_url.clone()
    };

    let landing = (!card.landing_page_url.is_empty() && !is_blocked_url(&card.landing_page_url))
        .then(|| card.landing_page_url.clone());

    let mut ad = NormalizedAd::new(
        card_source_id(card),
        Platform::Meta,
        format,
        card.advertiser_name.clone(),
        thumbnail,
        media_type,
    );
    ad.preview_url = (!card.content_url.is_empty()).then(|| card.content_url.clone());
    ad.domain = landing.as_deref().and_then(domain_from_url);
    ad.landing_page_url = landing;
    ad.raw_data = serde_json::to_value(card).unwrap_or(serde_json::Value::Null);
    ad
}

/// Python-era cap carried over: at least 3 scroll rounds, one round per five
/// requested results, 100 for unbounded walks.
fn scroll_cap(max_results: Option<usize>) -> u32 {
    match max_results {
        Some(max) => (max as u32 / 5).max(3),
        None => 100,
    }
}

/// Accept a raw page id, an Ad Library URL, or a profile URL.
pub fn parse_page_id(input: &str) -> String {
    let input = input.trim();
    if !input.is_empty() && input.chars().all(|c| c.is_ascii_digit()) {
        return input.to_string();
    }
    if let Ok(url) = url::Url::parse(input) {
        for (key, value) in url.query_pairs() {
            if key == "view_all_page_id" || key == "id" {
                return value.into_owned();
            }
        }
    }
    input.to_string()
}

/// Scroll-and-extract pass. Card extraction mirrors the library's DOM: one
/// `div._7jyh` container per ad, with an `<hr>`-sectioning fallback when the
/// class hash rotates.
const SCROLL_EXTRACT: &str = r#"
export default async function ({ page, context }) {
  const { url, maxScrolls, scrollPauseMs } = context;
  await page.setViewport({ width: 1920, height: 1080 });
  await page.goto(url, { waitUntil: "networkidle2", timeout: 60000 });

  const cookieSelectors = [
    'button[data-cookiebanner="accept_button"]',
    'button[title="Allow all cookies"]',
    'button[title="모든 쿠키 허용"]',
  ];
  for (const selector of cookieSelectors) {
    const btn = await page.$(selector);
    if (btn) {
      await btn.click();
      await new Promise((r) => setTimeout(r, 2000));
      break;
    }
  }
  await new Promise((r) => setTimeout(r, 5000));

  let prevHeight = 0;
  let heightStalled = false;
  for (let i = 0; i < maxScrolls; i++) {
    await page.evaluate(() => window.scrollTo(0, document.body.scrollHeight));
    await new Promise((r) => setTimeout(r, scrollPauseMs));
    const height = await page.evaluate(() => document.body.scrollHeight);
    if (height === prevHeight) {
      heightStalled = true;
      break;
    }
    prevHeight = height;
  }

  const cards = await page.evaluate(() => {
    const extract = (section) => {
      const ad = { advertiser_name: "", content_url: "", thumbnail_url: null, landing_page_url: "" };

      const profileImg = section.querySelector("img._8nqq");
      ad.advertiser_name = profileImg ? profileImg.alt : "";
      if (!ad.advertiser_name) {
        const pageLink = section.querySelector('a[href*="facebook.com/"] span');
        if (pageLink) ad.advertiser_name = pageLink.textContent.trim();
      }

      const videoContainer = section.querySelector('[data-testid="ad-content-body-video-container"]');
      const videos = videoContainer
        ? videoContainer.querySelectorAll("video")
        : section.querySelectorAll("video");
      for (const v of videos) {
        let src = v.src || "";
        if (!src) {
          const s = v.querySelector("source");
          if (s) src = s.src || "";
        }
        if (src) {
          ad.content_url = src;
          ad.thumbnail_url = v.poster || null;
          break;
        }
      }

      if (!ad.content_url) {
        for (const img of section.querySelectorAll("img")) {
          const src = img.src || "";
          const cls = img.className || "";
          if (cls.includes("_8nqq")) continue;
          if (src.startsWith("data:") || src.includes("emoji")) continue;
          if (src.includes("scontent") && src.includes("fbcdn.net") && !src.includes("s60x60")) {
            ad.content_url = src;
            break;
          }
        }
      }
      if (!ad.content_url) {
        for (const img of section.querySelectorAll("img")) {
          const src = img.src || "";
          if (img.className.includes("_8nqq")) continue;
          if (src.startsWith("http") && !src.startsWith("data:") && !src.includes("emoji")) {
            ad.content_url = src;
            break;
          }
        }
      }

      const cta = section.querySelector('a[href*="l.facebook.com/l.php"]');
      if (cta) {
        try {
          const u = new URL(cta.href).searchParams.get("u");
          ad.landing_page_url = u ? decodeURIComponent(u) : cta.href;
        } catch (e) {
          ad.landing_page_url = cta.href;
        }
      }
      if (!ad.landing_page_url) {
        for (const link of section.querySelectorAll("a[href]")) {
          const h = link.href || "";
          if (h.startsWith("http") && !h.includes("facebook.com") && !h.includes("instagram.com")) {
            ad.landing_page_url = h;
            break;
          }
        }
      }

      return ad;
    };

    let results = [];
    const containers = Array.from(document.querySelectorAll("div._7jyh")).slice(0, 200);
    for (const container of containers) {
      const section =
        container.closest("div.xh8yej3") ||
        (container.parentElement && container.parentElement.parentElement) ||
        container;
      const ad = extract(section);
      if (ad.advertiser_name || ad.content_url) results.push(ad);
    }

    if (!results.length) {
      const hrs = Array.from(document.querySelectorAll("hr")).slice(0, 200);
      for (const hr of hrs) {
        const section = hr.nextElementSibling;
        if (!section) continue;
        const ad = extract(section);
        if (ad.advertiser_name || ad.content_url) results.push(ad);
      }
    }

    return results;
  });

  return { data: { cards, heightStalled }, type: "application/json" };
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_id_ignores_cdn_query_churn() {
        let a = RawCard {
            advertiser_name: "Acme".to_string(),
            content_url: "https://scontent.fbcdn.net/v/t39/img.jpg?sig=aaa&oh=1".to_string(),
            ..Default::default()
        };
        let b = RawCard {
            advertiser_name: "Acme".to_string(),
            content_url: "https://scontent.fbcdn.net/v/t39/img.jpg?sig=bbb&oh=2".to_string(),
            ..Default::default()
        };
        assert_eq!(normalize_card(&a).source_id, normalize_card(&b).source_id);
    }

    #[test]
    fn blocked_landing_is_nulled_but_ad_kept() {
        // E6: l.php unwrapping happened in-page; the decoded URL is blocked.
        let card = RawCard {
            advertiser_name: "Acme".to_string(),
            content_url: "https://scontent.fbcdn.net/v/t39/img.jpg".to_string(),
            landing_page_url: "https://naver.me/xyz".to_string(),
            ..Default::default()
        };
        let ad = normalize_card(&card);
        assert_eq!(ad.landing_page_url, None);
        assert_eq!(ad.domain, None);
        assert!(!ad.source_id.is_empty());
    }

    #[test]
    fn clean_landing_produces_domain() {
        let card = RawCard {
            advertiser_name: "Acme".to_string(),
            content_url: "https://scontent.fbcdn.net/v/t39/img.jpg".to_string(),
            landing_page_url: "https://www.acme.com/promo".to_string(),
            ..Default::default()
        };
        let ad = normalize_card(&card);
        assert_eq!(ad.landing_page_url.as_deref(), Some("https://www.acme.com/promo"));
        assert_eq!(ad.domain.as_deref(), Some("acme.com"));
    }

    #[test]
    fn video_poster_drives_video_media_type() {
        let card = RawCard {
            advertiser_name: "Acme".to_string(),
            content_url: "https://video.fbcdn.net/v/clip.mp4".to_string(),
            thumbnail_url: Some("https://scontent.fbcdn.net/poster.jpg".to_string()),
            ..Default::default()
        };
        let ad = normalize_card(&card);
        assert_eq!(ad.media_type, MediaType::Video);
        assert_eq!(ad.thumbnail_url, "https://scontent.fbcdn.net/poster.jpg");
        assert_eq!(ad.preview_url.as_deref(), Some("https://video.fbcdn.net/v/clip.mp4"));
    }

    #[test]
    fn page_id_parsed_from_every_input_shape() {
        assert_eq!(parse_page_id("123456789"), "123456789");
        assert_eq!(
            parse_page_id("https://www.facebook.com/ads/library/?view_all_page_id=987&x=1"),
            "987"
        );
        assert_eq!(
            parse_page_id("https://www.facebook.com/profile.php?id=555"),
            "555"
        );
        assert_eq!(parse_page_id("acme.brand"), "acme.brand");
    }

    #[test]
    fn scroll_cap_scales_with_max_results() {
        assert_eq!(scroll_cap(Some(10)), 3);
        assert_eq!(scroll_cap(Some(500)), 100);
        assert_eq!(scroll_cap(None), 100);
    }

    #[test]
    fn listing_url_shapes() {
        let browser = BrowserlessClient::new("http://localhost:3000", None);
        let scraper = MetaScraper::new(browser, "KR");

        let keyword_target = ScrapeTarget {
            brand_id: None,
            brand_name: "acme".to_string(),
            platform: Platform::Meta,
            source_type: SourceType::Keyword,
            source_value: "acme shoes".to_string(),
        };
        let url = scraper.listing_url(&keyword_target);
        assert!(url.contains("q=acme%20shoes"));
        assert!(url.contains("search_type=keyword_unordered"));
        assert!(url.contains("country=KR"));
        assert!(url.contains("start_date[min]="));

        let page_target = ScrapeTarget {
            source_type: SourceType::PageId,
            source_value: "987".to_string(),
            ..keyword_target
        };
        let url = scraper.listing_url(&page_target);
        assert!(url.contains("view_all_page_id=987"));
        assert!(url.contains("search_type=page"));
    }
}
