//! URL hygiene shared by every scraper: blocked-domain filtering, bare-domain
//! normalization, YouTube video-id recovery, Google creative-id parsing.

use regex::Regex;

/// Landing pages on these domains are dropped (ad kept, landing URL nulled).
pub const BLOCKED_DOMAINS: [&str; 4] = ["naver.", "kakao.", "facebook.", "instagram."];

pub fn is_blocked_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }
    let lower = url.to_lowercase();
    BLOCKED_DOMAINS.iter().any(|d| lower.contains(d))
}

/// Normalize a domain-ish input (possibly a full URL) to a bare host:
/// scheme stripped, `www.` stripped, lowercased, trailing slash trimmed.
pub fn normalize_domain(input: &str) -> String {
    let mut s = input.trim().to_string();
    if s.contains("://") {
        if let Ok(u) = url::Url::parse(&s) {
            s = u.host_str().unwrap_or_default().to_string();
        } else if let Some(rest) = s.splitn(2, "://").nth(1) {
            s = rest.split('/').next().unwrap_or_default().to_string();
        }
    }
    s.trim_end_matches('/')
        .trim_start_matches("www.")
        .to_lowercase()
}

/// Host of a landing URL with `www.` stripped, lowercased. Empty input or an
/// unparsable URL yields `None`.
pub fn domain_from_url(landing_url: &str) -> Option<String> {
    if landing_url.is_empty() {
        return None;
    }
    let re = Regex::new(r"^https?://(?:www\.)?([^/]+)").expect("valid regex");
    re.captures(landing_url)
        .map(|c| c[1].to_lowercase())
}

/// Extract a YouTube video id from the URL shapes the transparency center
/// renders: ytimg thumbnails, embed/watch/short links, and player URLs
/// carrying a `video_id` query parameter.
pub fn extract_youtube_video_id(url: &str) -> Option<String> {
    if url.is_empty() {
        return None;
    }
    let patterns = [
        r"ytimg\.com/vi/([a-zA-Z0-9_-]{11})",
        r"youtube\.com/watch\?v=([a-zA-Z0-9_-]{11})",
        r"youtube\.com/embed/([a-zA-Z0-9_-]{11})",
        r"youtu\.be/([a-zA-Z0-9_-]{11})",
        r"[?&]video_id=([a-zA-Z0-9_-]{11})",
    ];
    for pattern in patterns {
        let re = Regex::new(pattern).expect("valid regex");
        if let Some(c) = re.captures(url) {
            return Some(c[1].to_string());
        }
    }
    None
}

/// `/creative/CR01534115872354861057` → `CR01534115872354861057`.
pub fn extract_creative_id(href: &str) -> Option<String> {
    let re = Regex::new(r"/creative/(CR\w+)").expect("valid regex");
    re.captures(href).map(|c| c[1].to_string())
}

/// Canonical thumbnail and watch URLs for a YouTube video id.
pub fn youtube_canonical_urls(video_id: &str) -> (String, String) {
    (
        format!("https://i.ytimg.com/vi/{video_id}/maxresdefault.jpg"),
        format!("https://www.youtube.com/watch?v={video_id}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_urls_are_detected() {
        assert!(is_blocked_url("https://naver.me/xyz"));
        assert!(is_blocked_url("https://m.kakao.com/page"));
        assert!(is_blocked_url("https://www.facebook.com/brand"));
        assert!(is_blocked_url("https://Instagram.com/brand"));
        assert!(!is_blocked_url("https://acme.com/landing"));
        assert!(!is_blocked_url(""));
    }

    #[test]
    fn normalize_domain_strips_scheme_www_and_case() {
        assert_eq!(normalize_domain("https://www.Acme.com/"), "acme.com");
        assert_eq!(normalize_domain("www.acme.com"), "acme.com");
        assert_eq!(normalize_domain("acme.com/"), "acme.com");
        assert_eq!(normalize_domain("  acme.com  "), "acme.com");
    }

    #[test]
    fn domain_from_url_matches_host_only() {
        assert_eq!(domain_from_url("https://www.acme.com/a/b?c=1"), Some("acme.com".into()));
        assert_eq!(domain_from_url("http://Acme.COM"), Some("acme.com".into()));
        assert_eq!(domain_from_url("not a url"), None);
        assert_eq!(domain_from_url(""), None);
    }

    #[test]
    fn youtube_id_extracted_from_every_shape() {
        let id = "abc12345678";
        for url in [
            format!("https://i.ytimg.com/vi/{id}/maxresdefault.jpg"),
            format!("https://www.youtube.com/watch?v={id}"),
            format!("https://www.youtube.com/embed/{id}?autoplay=0"),
            format!("https://youtu.be/{id}"),
            format!("https://example.com/youtube_vertical_player?video_id={id}&x=1"),
        ] {
            assert_eq!(extract_youtube_video_id(&url).as_deref(), Some(id), "{url}");
        }
        assert_eq!(extract_youtube_video_id("https://example.com/img.jpg"), None);
    }

    #[test]
    fn creative_id_parsed_from_href() {
        assert_eq!(
            extract_creative_id("/advertiser/AR123/creative/CR01534115872354861057?region=KR"),
            Some("CR01534115872354861057".to_string())
        );
        assert_eq!(extract_creative_id("/advertiser/AR123"), None);
    }

    #[test]
    fn youtube_canonical_urls_shape() {
        let (thumb, watch) = youtube_canonical_urls("abc12345678");
        assert_eq!(thumb, "https://i.ytimg.com/vi/abc12345678/maxresdefault.jpg");
        assert_eq!(watch, "https://www.youtube.com/watch?v=abc12345678");
    }
}
