//! Variant extraction for a Google Transparency creative detail page.
//!
//! A detail page renders every alternate rendition of one creative at once
//! (hidden-class toggled), each inside a `.creative-sub-container`. Content
//! hides behind four shapes: a direct `simgad` image, a YouTube iframe, a
//! sadbundle iframe, or an `adframe` iframe whose inner document carries the
//! `simgad` image. Pure-text ads render none of these and only declare
//! "형식: 텍스트" / "Format: Text" in the page body.
//!
//! Everything here is pure: it operates on an HTML snapshot of the page plus
//! per-frame HTML snapshots (the cross-origin-safe capture), so the whole
//! resolution chain is testable without a browser.

use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use adscope_common::identity::{google_source_id, google_text_source_id};
use adscope_common::urls::{domain_from_url, extract_youtube_video_id, youtube_canonical_urls};
use adscope_common::{AdFormat, MediaType, NormalizedAd, Platform};

/// Rendered state of one detail page: top document + every iframe's inner
/// document, captured host-side so cross-origin frames are readable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailSnapshot {
    pub advertiser: String,
    pub html: String,
    #[serde(default)]
    pub body_text: String,
    #[serde(default)]
    pub frames: Vec<FrameSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FrameSnapshot {
    pub url: String,
    #[serde(default)]
    pub html: String,
}

/// One alternate rendition of the creative.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Variant {
    pub content_url: String,
    pub anchor_href: Option<String>,
    pub is_video: bool,
    pub is_text: bool,
    pub ad_copy_text: Option<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub youtube_video_id: Option<String>,
}

/// Hosts that never count as landing-URL candidates inside a sub-container.
const ANCHOR_SKIP_DOMAINS: [&str; 5] = [
    "adstransparency.google.com",
    "support.google.com",
    "policies.google.com",
    "safety.google",
    "about.google",
];

/// Wider skip list for frame-level anchors and the page-common landing scan.
const LANDING_SKIP_DOMAINS: [&str; 8] = [
    "adstransparency.google.com",
    "support.google.com",
    "policies.google.com",
    "safety.google",
    "google.com/ads",
    "about.google",
    "blog.google",
    "googlesyndication.com",
];

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

fn first_attr(scope: ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    scope
        .select(&sel(css))
        .find_map(|el| el.value().attr(attr))
        .map(String::from)
}

fn has(scope: ElementRef<'_>, css: &str) -> bool {
    scope.select(&sel(css)).next().is_some()
}

fn element_text(scope: ElementRef<'_>) -> String {
    scope
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Does the page declare the text-ad format, in either locale?
pub fn is_text_format(body_text: &str) -> bool {
    let re = Regex::new(r"(?i)(?:형식|Format)\s*[:：]\s*(?:텍스트|Text)").expect("valid regex");
    re.is_match(body_text)
}

/// `content_url`s that are render plumbing, not creative content.
/// Text variants are exempt (their URL is synthetic).
pub fn is_junk_url(url: &str) -> bool {
    if url.is_empty() {
        return true;
    }
    let lower = url.to_lowercase();
    lower.contains("safeframe")
        || lower.trim_end_matches('/').ends_with("/adframe")
        || lower.starts_with("about:")
}

/// Synthetic stable URL for a text-only variant.
pub fn synthetic_text_url(text: &str) -> String {
    let head: String = text.chars().take(100).collect();
    format!("text_ad:{}", BASE64.encode(head.as_bytes()))
}

/// Enumerate every display variant on the page.
///
/// Resolution chain (first non-empty wins): sub-container DOM walk →
/// per-frame walk → whole-container text fallback. Junk URLs are filtered
/// and variants deduped by `content_url` across the chain.
pub fn collect_variants(snapshot: &DetailSnapshot) -> Vec<Variant> {
    let text_ad_page = is_text_format(&snapshot.body_text);

    let mut variants = collect_from_subcontainers(&snapshot.html, &snapshot.frames, text_ad_page);

    if variants.is_empty() {
        variants = collect_from_frames(&snapshot.frames);
    }

    if variants.is_empty() && text_ad_page {
        if let Some(text) = container_text(&snapshot.html) {
            variants.push(Variant {
                content_url: synthetic_text_url(&text),
                is_text: true,
                ad_copy_text: Some(text),
                ..Default::default()
            });
        }
    }

    let mut seen = HashSet::new();
    variants.retain(|v| {
        (v.is_text || !is_junk_url(&v.content_url)) && seen.insert(v.content_url.clone())
    });
    variants
}

fn collect_from_subcontainers(
    html: &str,
    frames: &[FrameSnapshot],
    text_ad_page: bool,
) -> Vec<Variant> {
    let doc = Html::parse_document(html);
    let Some(container) = doc.select(&sel("creative-details .ad-container")).next() else {
        return Vec::new();
    };

    let subs: Vec<ElementRef> = container.select(&sel(".creative-sub-container")).collect();
    let targets = if subs.is_empty() { vec![container] } else { subs };

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for sub in targets {
        let mut is_video = has(sub, r#"iframe[src*="youtube"]"#)
            || has(sub, r#"iframe[src*="youtube_vertical_player"]"#)
            || has(sub, "video");
        let mut video_url = None;
        let mut thumbnail_url = None;
        let mut youtube_video_id = None;

        if is_video {
            thumbnail_url = first_attr(sub, r#"img[src*="ytimg"]"#, "src");
            if let Some(t) = &thumbnail_url {
                youtube_video_id = extract_youtube_video_id(t);
            }
            if thumbnail_url.is_none() {
                thumbnail_url = first_attr(sub, r#"img[src*="simgad"]"#, "src");
            }

            video_url = first_attr(sub, r#"iframe[src*="youtube_vertical_player"]"#, "src")
                .or_else(|| first_attr(sub, r#"iframe[src*="youtube"]"#, "src"));
            if let Some(v) = &video_url {
                youtube_video_id = youtube_video_id.or_else(|| extract_youtube_video_id(v));
            }
            if video_url.is_none() {
                video_url = first_attr(sub, "video", "src")
                    .or_else(|| first_attr(sub, "video source", "src"));
            }
        }

        // Content URL priority: simgad image, YouTube iframe, sadbundle
        // iframe, adframe inner walk, then any non-plumbing iframe.
        let mut content_url = first_attr(sub, r#"img[src*="simgad"]"#, "src")
            .or_else(|| first_attr(sub, r#"iframe[src*="youtube"]"#, "src"))
            .or_else(|| first_attr(sub, r#"iframe[src*="sadbundle"]"#, "src"));

        if content_url.is_none() {
            if let Some(adframe_src) = first_attr(sub, r#"iframe[src*="adframe"]"#, "src") {
                if let Some(inner) = adframe_content(frames, &adframe_src) {
                    content_url = inner.content_url;
                    if !is_video && inner.is_video {
                        is_video = true;
                        video_url = inner.video_url;
                        thumbnail_url = thumbnail_url.or(inner.thumbnail_url);
                        youtube_video_id = youtube_video_id.or(inner.youtube_video_id);
                    }
                }
            }
        }

        if content_url.is_none() {
            content_url = sub
                .select(&sel("iframe[src]"))
                .filter_map(|f| f.value().attr("src"))
                .find(|src| {
                    let s = src.to_lowercase();
                    !s.is_empty()
                        && !s.contains("safeframe")
                        && !s.contains("adframe")
                        && !s.starts_with("about:")
                })
                .map(String::from);
        }

        let anchor_href = sub
            .select(&sel("a[href]"))
            .filter_map(|a| a.value().attr("href"))
            .find(|h| h.starts_with("http") && !ANCHOR_SKIP_DOMAINS.iter().any(|d| h.contains(d)))
            .map(String::from);

        let is_text = text_ad_page && !is_video;
        let sub_text = element_text(sub);

        match content_url {
            Some(url) => {
                if youtube_video_id.is_none() {
                    youtube_video_id = extract_youtube_video_id(&url);
                }
                if seen.insert(url.clone()) {
                    out.push(Variant {
                        content_url: url,
                        anchor_href,
                        is_video,
                        is_text,
                        ad_copy_text: (is_text && !sub_text.is_empty()).then(|| sub_text.clone()),
                        video_url,
                        thumbnail_url,
                        youtube_video_id,
                    });
                }
            }
            None if text_ad_page && !sub_text.is_empty() => {
                let synthetic = synthetic_text_url(&sub_text);
                if seen.insert(synthetic.clone()) {
                    out.push(Variant {
                        content_url: synthetic,
                        anchor_href,
                        is_text: true,
                        ad_copy_text: Some(sub_text),
                        ..Default::default()
                    });
                }
            }
            None => {}
        }
    }

    out
}

struct FrameContent {
    content_url: Option<String>,
    is_video: bool,
    video_url: Option<String>,
    thumbnail_url: Option<String>,
    youtube_video_id: Option<String>,
}

/// Find the frame backing an `adframe` iframe and pull creative content out
/// of its inner document.
fn adframe_content(frames: &[FrameSnapshot], adframe_src: &str) -> Option<FrameContent> {
    let frame = frames
        .iter()
        .find(|f| f.url == adframe_src)
        .or_else(|| frames.iter().find(|f| f.url.contains("adframe")))?;
    if frame.html.is_empty() {
        return None;
    }

    let doc = Html::parse_document(&frame.html);
    let root = doc.root_element();

    let mut content_url = first_attr(root, r#"img[src*="simgad"]"#, "src");
    if content_url.is_none() {
        content_url = root
            .select(&sel("iframe[src]"))
            .filter_map(|f| f.value().attr("src"))
            .find(|s| s.contains("simgad") || s.contains("youtube"))
            .map(String::from);
    }

    let mut is_video = false;
    let mut video_url = None;
    let mut thumbnail_url = None;
    let mut youtube_video_id = None;
    if has(root, r#"iframe[src*="youtube"]"#) || has(root, "video") {
        is_video = true;
        video_url = first_attr(root, r#"iframe[src*="youtube"]"#, "src");
        if let Some(v) = &video_url {
            youtube_video_id = extract_youtube_video_id(v);
        }
        thumbnail_url = first_attr(root, r#"img[src*="ytimg"]"#, "src");
        if let Some(t) = &thumbnail_url {
            youtube_video_id = youtube_video_id.or_else(|| extract_youtube_video_id(t));
        }
    }

    Some(FrameContent {
        content_url,
        is_video,
        video_url,
        thumbnail_url,
        youtube_video_id,
    })
}

/// Fallback when the top-document walk finds nothing: resolve each captured
/// frame's inner document directly.
fn collect_from_frames(frames: &[FrameSnapshot]) -> Vec<Variant> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for frame in frames {
        if frame.html.is_empty() {
            continue;
        }
        let doc = Html::parse_document(&frame.html);
        let root = doc.root_element();

        let mut is_video = false;
        let mut video_url = None;
        let mut thumbnail_url = None;
        let mut youtube_video_id = None;

        if has(root, r#"iframe[src*="youtube"]"#)
            || has(root, r#"iframe[src*="youtube_vertical_player"]"#)
            || has(root, "video")
        {
            is_video = true;
            video_url = first_attr(root, r#"iframe[src*="youtube_vertical_player"]"#, "src")
                .or_else(|| first_attr(root, r#"iframe[src*="youtube"]"#, "src"))
                .or_else(|| first_attr(root, "video", "src"))
                .or_else(|| first_attr(root, "video source", "src"));
            if let Some(v) = &video_url {
                youtube_video_id = extract_youtube_video_id(v);
            }
            thumbnail_url = first_attr(root, r#"img[src*="ytimg"]"#, "src");
            if let Some(t) = &thumbnail_url {
                youtube_video_id = youtube_video_id.or_else(|| extract_youtube_video_id(t));
            }
        }

        let mut content_url = first_attr(root, r#"img[src*="simgad"]"#, "src");
        if content_url.is_none() {
            content_url = root
                .select(&sel("iframe[src]"))
                .filter_map(|f| f.value().attr("src"))
                .find(|s| s.contains("simgad") || s.contains("youtube"))
                .map(String::from);
        }
        if content_url.is_none() {
            content_url = root
                .select(&sel("img[src]"))
                .filter_map(|i| i.value().attr("src"))
                .find(|s| s.starts_with("http") && !s.contains("googlesyndication"))
                .map(String::from);
        }

        let anchor_href = root
            .select(&sel("a[href]"))
            .filter_map(|a| a.value().attr("href"))
            .find(|h| {
                h.starts_with("http")
                    && !LANDING_SKIP_DOMAINS.iter().any(|d| h.contains(d))
                    && !h.contains("safeframe")
            })
            .map(String::from);

        let Some(url) = content_url else { continue };
        if youtube_video_id.is_none() {
            youtube_video_id = extract_youtube_video_id(&url);
        }
        if is_junk_url(&url) || !seen.insert(url.clone()) {
            continue;
        }

        out.push(Variant {
            content_url: url,
            anchor_href,
            is_video,
            is_text: false,
            ad_copy_text: None,
            video_url,
            thumbnail_url,
            youtube_video_id,
        });
    }

    out
}

/// Full text of the ad container, for the pure-text fallback.
fn container_text(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let container = doc.select(&sel("creative-details .ad-container")).next()?;
    let text = element_text(container);
    (!text.is_empty()).then_some(text)
}

/// Page-common landing URL, tried once per detail page:
/// 1. a `대상:` / `Destination:` label followed by a URL in the body text,
/// 2. the first external anchor inside `creative-details`,
/// 3. a `googleadservices.com…adurl=` redirect anywhere in the DOM.
pub fn page_common_landing(snapshot: &DetailSnapshot) -> Option<String> {
    let label_re =
        Regex::new(r"(?i)(?:대상|Destination)[:\s]*(https?://\S+)").expect("valid regex");
    if let Some(c) = label_re.captures(&snapshot.body_text) {
        return Some(c[1].to_string());
    }

    let doc = Html::parse_document(&snapshot.html);
    if let Some(details) = doc.select(&sel("creative-details")).next() {
        let external = details
            .select(&sel("a[href]"))
            .filter_map(|a| a.value().attr("href"))
            .find(|h| {
                h.starts_with("http") && !LANDING_SKIP_DOMAINS.iter().any(|d| h.contains(d))
            });
        if let Some(href) = external {
            return Some(href.to_string());
        }
    }

    let adservices_re =
        Regex::new(r#"googleadservices\.com[^"']*adurl=(https?[^"&<>\s\\]+)"#).expect("valid regex");
    adservices_re
        .captures(&snapshot.html)
        .map(|c| urlencoding::decode(&c[1]).map(|s| s.into_owned()).unwrap_or_else(|_| c[1].to_string()))
}

/// First `adurl=` parameter in a rendered sadbundle document, URL-decoded.
pub fn parse_sadbundle_adurl(html: &str) -> Option<String> {
    let re = Regex::new(r#"adurl=(https?[^"&<>\s\\]+)"#).expect("valid regex");
    re.captures(html)
        .map(|c| urlencoding::decode(&c[1]).map(|s| s.into_owned()).unwrap_or_else(|_| c[1].to_string()))
}

/// URL fragments that mark a content URL as video even when the DOM gave no
/// player element.
const VIDEO_URL_KEYWORDS: [&str; 6] = [
    "youtube.com",
    "youtu.be",
    "ytimg.com",
    "youtube_vertical_player",
    "youtube_player",
    "video_player",
];

/// Turn one variant into the shared ad schema.
///
/// Video ads with a recoverable YouTube id get the canonical ytimg thumbnail
/// and watch URL; text ads carry an empty thumbnail only when the content
/// URL is synthetic.
pub fn variant_to_ad(
    advertiser_name: &str,
    variant: &Variant,
    landing_url: Option<&str>,
) -> NormalizedAd {
    let raw_data = serde_json::json!({
        "advertiser_name": advertiser_name,
        "variant": variant,
    });

    if variant.is_text {
        let ad_copy = variant.ad_copy_text.clone().unwrap_or_default();
        let has_real_image =
            !variant.content_url.is_empty() && !variant.content_url.starts_with("text_ad:");

        let source_id = if has_real_image {
            google_source_id(advertiser_name, &variant.content_url)
        } else {
            google_text_source_id(advertiser_name, &ad_copy)
        };

        let mut ad = NormalizedAd::new(
            source_id,
            Platform::Google,
            AdFormat::Text,
            advertiser_name.to_string(),
            if has_real_image { variant.content_url.clone() } else { String::new() },
            MediaType::Text,
        );
        ad.ad_copy = Some(ad_copy);
        ad.landing_page_url = landing_url.map(String::from);
        ad.domain = landing_url.and_then(domain_from_url);
        ad.raw_data = raw_data;
        return ad;
    }

    let content_url = variant.content_url.as_str();
    let lower = content_url.to_lowercase();
    let is_video =
        variant.is_video || VIDEO_URL_KEYWORDS.iter().any(|k| lower.contains(k));

    let video_id = variant.youtube_video_id.clone().or_else(|| {
        [Some(content_url), variant.thumbnail_url.as_deref(), variant.video_url.as_deref()]
            .into_iter()
            .flatten()
            .find_map(extract_youtube_video_id)
    });

    let (thumbnail_url, preview_url) = if is_video {
        match &video_id {
            Some(id) => {
                let (thumb, watch) = youtube_canonical_urls(id);
                (thumb, Some(watch))
            }
            None => (
                variant
                    .thumbnail_url
                    .clone()
                    .unwrap_or_else(|| content_url.to_string()),
                variant
                    .video_url
                    .clone()
                    .or_else(|| (!content_url.is_empty()).then(|| content_url.to_string())),
            ),
        }
    } else {
        (
            content_url.to_string(),
            (!content_url.is_empty()).then(|| content_url.to_string()),
        )
    };

    let media_type = if is_video { MediaType::Video } else { MediaType::Image };
    let format = if is_video { AdFormat::Video } else { AdFormat::Image };

    let mut ad = NormalizedAd::new(
        google_source_id(advertiser_name, content_url),
        Platform::Google,
        format,
        advertiser_name.to_string(),
        thumbnail_url,
        media_type,
    );
    ad.preview_url = preview_url;
    ad.landing_page_url = landing_url.map(String::from);
    ad.domain = landing_url.and_then(domain_from_url);
    ad.raw_data = raw_data;
    ad
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail_page(sub_containers: &str, body_text: &str) -> DetailSnapshot {
        DetailSnapshot {
            advertiser: "Acme".to_string(),
            html: format!(
                r#"<html><body><creative-details><div class="ad-container">{sub_containers}</div></creative-details></body></html>"#
            ),
            body_text: body_text.to_string(),
            frames: Vec::new(),
        }
    }

    #[test]
    fn simgad_image_variant_is_collected() {
        let snap = detail_page(
            r#"<div class="creative-sub-container">
                 <img src="https://tpc.googlesyndication.com/simgad/123"/>
                 <a href="https://acme.com/shop">shop</a>
               </div>"#,
            "",
        );
        let variants = collect_variants(&snap);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].content_url, "https://tpc.googlesyndication.com/simgad/123");
        assert_eq!(variants[0].anchor_href.as_deref(), Some("https://acme.com/shop"));
        assert!(!variants[0].is_video);
    }

    #[test]
    fn mixed_image_and_youtube_variants() {
        // E3: one simgad sub + one YouTube embed sub on the same page.
        let snap = detail_page(
            r#"<div class="creative-sub-container">
                 <img src="https://tpc.googlesyndication.com/simgad/123"/>
               </div>
               <div class="creative-sub-container">
                 <iframe src="https://www.youtube.com/embed/abc12345678"></iframe>
               </div>"#,
            "",
        );
        let variants = collect_variants(&snap);
        assert_eq!(variants.len(), 2);
        assert!(!variants[0].is_video);
        assert!(variants[1].is_video);
        assert_eq!(variants[1].youtube_video_id.as_deref(), Some("abc12345678"));
    }

    #[test]
    fn video_variant_prefers_ytimg_thumbnail() {
        let snap = detail_page(
            r#"<div class="creative-sub-container">
                 <img src="https://i.ytimg.com/vi/abc12345678/hqdefault.jpg"/>
                 <iframe src="https://www.youtube.com/embed/abc12345678"></iframe>
               </div>"#,
            "",
        );
        let variants = collect_variants(&snap);
        assert_eq!(variants.len(), 1);
        let v = &variants[0];
        assert!(v.is_video);
        assert_eq!(v.thumbnail_url.as_deref(), Some("https://i.ytimg.com/vi/abc12345678/hqdefault.jpg"));
        assert_eq!(v.video_url.as_deref(), Some("https://www.youtube.com/embed/abc12345678"));
    }

    #[test]
    fn sadbundle_iframe_is_third_priority() {
        let snap = detail_page(
            r#"<div class="creative-sub-container">
                 <iframe src="https://tpc.googlesyndication.com/sadbundle/xyz/index.html"></iframe>
               </div>"#,
            "",
        );
        let variants = collect_variants(&snap);
        assert_eq!(variants.len(), 1);
        assert!(variants[0].content_url.contains("sadbundle"));
    }

    #[test]
    fn adframe_content_resolved_through_frame_snapshot() {
        let mut snap = detail_page(
            r#"<div class="creative-sub-container">
                 <iframe src="https://googleads.g.doubleclick.net/xbbe/adframe"></iframe>
               </div>"#,
            "",
        );
        snap.frames.push(FrameSnapshot {
            url: "https://googleads.g.doubleclick.net/xbbe/adframe".to_string(),
            html: r#"<html><body><img src="https://tpc.googlesyndication.com/simgad/987"/></body></html>"#
                .to_string(),
        });
        let variants = collect_variants(&snap);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].content_url, "https://tpc.googlesyndication.com/simgad/987");
    }

    #[test]
    fn junk_urls_are_filtered() {
        let snap = detail_page(
            r#"<div class="creative-sub-container">
                 <iframe src="https://tpc.googlesyndication.com/safeframe/1-0-40/html/container.html"></iframe>
               </div>
               <div class="creative-sub-container">
                 <iframe src="about:blank"></iframe>
               </div>"#,
            "",
        );
        assert!(collect_variants(&snap).is_empty());
    }

    #[test]
    fn variants_are_deduped_by_content_url() {
        let snap = detail_page(
            r#"<div class="creative-sub-container">
                 <img src="https://tpc.googlesyndication.com/simgad/123"/>
               </div>
               <div class="creative-sub-container">
                 <img src="https://tpc.googlesyndication.com/simgad/123"/>
               </div>"#,
            "",
        );
        assert_eq!(collect_variants(&snap).len(), 1);
    }

    #[test]
    fn google_help_anchors_are_not_landing_candidates() {
        let snap = detail_page(
            r#"<div class="creative-sub-container">
                 <img src="https://tpc.googlesyndication.com/simgad/123"/>
                 <a href="https://support.google.com/adspolicy">policy</a>
               </div>"#,
            "",
        );
        let variants = collect_variants(&snap);
        assert_eq!(variants[0].anchor_href, None);
    }

    #[test]
    fn text_ad_page_with_no_media_emits_synthetic_variant() {
        // E4: the page declares the text format and renders no image/video.
        let snap = detail_page(
            r#"<div class="creative-sub-container">겨울 세일 최대 50% 할인</div>"#,
            "광고주: Acme\n형식: 텍스트",
        );
        let variants = collect_variants(&snap);
        assert_eq!(variants.len(), 1);
        let v = &variants[0];
        assert!(v.is_text);
        assert!(v.content_url.starts_with("text_ad:"));
        assert_eq!(v.ad_copy_text.as_deref(), Some("겨울 세일 최대 50% 할인"));
    }

    #[test]
    fn english_text_format_label_is_detected() {
        assert!(is_text_format("Advertiser: Acme\nFormat: Text"));
        assert!(is_text_format("Format : text"));
        assert!(is_text_format("형식: 텍스트"));
        assert!(!is_text_format("Format: Image"));
    }

    #[test]
    fn frames_fallback_finds_simgad_inside_cross_origin_frame() {
        let snap = DetailSnapshot {
            advertiser: "Acme".to_string(),
            html: r#"<html><body><creative-details><div class="ad-container">
                       <iframe src="https://tpc.googlesyndication.com/safeframe/x"></iframe>
                     </div></creative-details></body></html>"#
                .to_string(),
            body_text: String::new(),
            frames: vec![FrameSnapshot {
                url: "https://tpc.googlesyndication.com/safeframe/x".to_string(),
                html: r#"<html><body>
                           <img src="https://tpc.googlesyndication.com/simgad/555"/>
                           <a href="https://acme.com/promo">promo</a>
                         </body></html>"#
                    .to_string(),
            }],
        };
        let variants = collect_variants(&snap);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].content_url, "https://tpc.googlesyndication.com/simgad/555");
        assert_eq!(variants[0].anchor_href.as_deref(), Some("https://acme.com/promo"));
    }

    #[test]
    fn whole_container_text_fallback_carries_full_copy() {
        let snap = DetailSnapshot {
            advertiser: "Acme".to_string(),
            html: r#"<html><body><creative-details><div class="ad-container">
                       Acme Winter Sale: everything must go
                     </div></creative-details></body></html>"#
                .to_string(),
            body_text: "Format: Text".to_string(),
            frames: Vec::new(),
        };
        let variants = collect_variants(&snap);
        assert_eq!(variants.len(), 1);
        assert!(variants[0].is_text);
        assert!(variants[0]
            .ad_copy_text
            .as_deref()
            .unwrap()
            .contains("Winter Sale"));
    }

    #[test]
    fn synthetic_text_url_is_stable_for_same_prefix() {
        let a = synthetic_text_url(&format!("{}{}", "x".repeat(100), "one"));
        let b = synthetic_text_url(&format!("{}{}", "x".repeat(100), "two"));
        assert_eq!(a, b);
        assert!(a.starts_with("text_ad:"));
    }

    // --- landing resolution ---

    #[test]
    fn destination_label_wins_page_landing() {
        let snap = DetailSnapshot {
            advertiser: "Acme".to_string(),
            html: r#"<html><body><creative-details>
                       <a href="https://elsewhere.com/x">x</a>
                     </creative-details></body></html>"#
                .to_string(),
            body_text: "대상: https://acme.com/landing\n기타".to_string(),
            frames: Vec::new(),
        };
        assert_eq!(page_common_landing(&snap).as_deref(), Some("https://acme.com/landing"));
    }

    #[test]
    fn external_anchor_is_second_landing_heuristic() {
        let snap = DetailSnapshot {
            advertiser: "Acme".to_string(),
            html: r#"<html><body><creative-details>
                       <a href="https://support.google.com/help">help</a>
                       <a href="https://acme.com/promo">promo</a>
                     </creative-details></body></html>"#
                .to_string(),
            body_text: "no label here".to_string(),
            frames: Vec::new(),
        };
        assert_eq!(page_common_landing(&snap).as_deref(), Some("https://acme.com/promo"));
    }

    #[test]
    fn adservices_redirect_is_last_landing_heuristic() {
        let snap = DetailSnapshot {
            advertiser: "Acme".to_string(),
            html: r#"<html><body><creative-details></creative-details>
                     <script>var u = "https://www.googleadservices.com/pagead/aclk?sa=L&adurl=https%3A%2F%2Facme.com%2Fdeal";</script>
                     </body></html>"#
                .to_string(),
            body_text: String::new(),
            frames: Vec::new(),
        };
        assert_eq!(page_common_landing(&snap).as_deref(), Some("https://acme.com/deal"));
    }

    #[test]
    fn sadbundle_adurl_is_extracted_and_decoded() {
        let html = r#"<html><a href="https://googleads.g.doubleclick.net/aclk?adurl=https%3A%2F%2Facme.com%2Fwinter">go</a></html>"#;
        assert_eq!(parse_sadbundle_adurl(html).as_deref(), Some("https://acme.com/winter"));
        assert_eq!(parse_sadbundle_adurl("<html>nothing</html>"), None);
    }

    // --- normalization ---

    #[test]
    fn video_variant_with_id_gets_canonical_urls() {
        let variant = Variant {
            content_url: "https://www.youtube.com/embed/abc12345678".to_string(),
            is_video: true,
            youtube_video_id: Some("abc12345678".to_string()),
            ..Default::default()
        };
        let ad = variant_to_ad("Acme", &variant, Some("https://acme.com"));
        assert_eq!(ad.thumbnail_url, "https://i.ytimg.com/vi/abc12345678/maxresdefault.jpg");
        assert_eq!(ad.preview_url.as_deref(), Some("https://www.youtube.com/watch?v=abc12345678"));
        assert_eq!(ad.media_type, MediaType::Video);
        assert_eq!(ad.format, AdFormat::Video);
        assert_eq!(ad.domain.as_deref(), Some("acme.com"));
    }

    #[test]
    fn video_id_recovered_from_thumbnail_when_variant_lacks_it() {
        let variant = Variant {
            content_url: "https://example.com/player".to_string(),
            is_video: true,
            thumbnail_url: Some("https://i.ytimg.com/vi/abc12345678/hqdefault.jpg".to_string()),
            ..Default::default()
        };
        let ad = variant_to_ad("Acme", &variant, None);
        assert_eq!(ad.thumbnail_url, "https://i.ytimg.com/vi/abc12345678/maxresdefault.jpg");
        assert_eq!(ad.preview_url.as_deref(), Some("https://www.youtube.com/watch?v=abc12345678"));
    }

    #[test]
    fn image_variant_uses_content_url_for_both_urls() {
        let variant = Variant {
            content_url: "https://tpc.googlesyndication.com/simgad/123".to_string(),
            ..Default::default()
        };
        let ad = variant_to_ad("Acme", &variant, None);
        assert_eq!(ad.thumbnail_url, variant.content_url);
        assert_eq!(ad.preview_url.as_deref(), Some(variant.content_url.as_str()));
        assert_eq!(ad.media_type, MediaType::Image);
    }

    #[test]
    fn text_variant_normalizes_to_empty_thumbnail_and_stable_id() {
        let variant = Variant {
            content_url: synthetic_text_url("겨울 세일"),
            is_text: true,
            ad_copy_text: Some("겨울 세일".to_string()),
            ..Default::default()
        };
        let a = variant_to_ad("Acme", &variant, None);
        let b = variant_to_ad("Acme", &variant, None);
        assert_eq!(a.source_id, b.source_id);
        assert_eq!(a.thumbnail_url, "");
        assert_eq!(a.media_type, MediaType::Text);
        assert_eq!(a.format, AdFormat::Text);
        assert_eq!(a.ad_copy.as_deref(), Some("겨울 세일"));
    }

    #[test]
    fn video_keyword_in_url_forces_video_media_type() {
        let variant = Variant {
            content_url: "https://i.ytimg.com/vi/abc12345678/default.jpg".to_string(),
            is_video: false,
            ..Default::default()
        };
        let ad = variant_to_ad("Acme", &variant, None);
        assert_eq!(ad.media_type, MediaType::Video);
    }
}
