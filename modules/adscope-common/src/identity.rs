//! Stable source-id fingerprints.
//!
//! Every platform derives a deterministic, platform-scoped fingerprint for
//! each creative so repeated scrapes re-discover the same row. The rules
//! differ per platform because the stable part of a creative differs: Google
//! content URLs are stable as-is, Meta CDN URLs rotate their signing query
//! string, API sources carry native ids.

use sha2::{Digest, Sha256};

/// First 16 hex chars of sha256 over the input.
fn sha16(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)[..16].to_string()
}

/// Google image/video creative: advertiser + full content URL.
pub fn google_source_id(advertiser_name: &str, content_url: &str) -> String {
    sha16(&format!("google:{advertiser_name}:{content_url}"))
}

/// Google text ad with a synthetic `text_ad:` content URL: advertiser + the
/// first 100 chars of the ad text.
pub fn google_text_source_id(advertiser_name: &str, text: &str) -> String {
    let head: String = text.chars().take(100).collect();
    sha16(&format!("google:text:{advertiser_name}:{head}"))
}

/// Meta creative: advertiser + the URL *path* only. The query string carries
/// CDN signing parameters that churn between loads.
pub fn meta_source_id(advertiser_name: &str, content_url: &str) -> String {
    sha16(&format!("meta:{advertiser_name}:{}", url_path(content_url)))
}

/// Fallback identity for API payloads without a native creative id:
/// hash of the canonical (key-sorted) JSON serialization.
pub fn json_source_id(prefix: &str, raw: &serde_json::Value) -> String {
    let canonical = serde_json::to_string(raw).unwrap_or_default();
    sha16(&format!("{prefix}:{canonical}"))
}

/// URL path with scheme/host/query stripped. Falls back to manual query
/// stripping when the input is not an absolute URL.
pub fn url_path(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(u) => u.path().to_string(),
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_id_is_stable_and_16_hex() {
        let a = google_source_id("Acme", "https://tpc.googlesyndication.com/simgad/123");
        let b = google_source_id("Acme", "https://tpc.googlesyndication.com/simgad/123");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn google_id_varies_with_inputs() {
        let a = google_source_id("Acme", "https://x/simgad/1");
        let b = google_source_id("Acme", "https://x/simgad/2");
        let c = google_source_id("Other", "https://x/simgad/1");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn meta_id_ignores_query_string() {
        let a = meta_source_id("Acme", "https://scontent.fbcdn.net/v/t39/img.jpg?sig=abc&oh=1");
        let b = meta_source_id("Acme", "https://scontent.fbcdn.net/v/t39/img.jpg?sig=zzz&oh=2");
        assert_eq!(a, b);

        let c = meta_source_id("Acme", "https://scontent.fbcdn.net/v/t39/other.jpg?sig=abc");
        assert_ne!(a, c);
    }

    #[test]
    fn text_id_uses_first_100_chars_only() {
        let long_a = format!("{}{}", "x".repeat(100), "tail-one");
        let long_b = format!("{}{}", "x".repeat(100), "tail-two");
        assert_eq!(
            google_text_source_id("Acme", &long_a),
            google_text_source_id("Acme", &long_b)
        );
        assert_ne!(
            google_text_source_id("Acme", "short"),
            google_text_source_id("Acme", "other")
        );
    }

    #[test]
    fn text_id_respects_char_boundaries() {
        // Multibyte text must not panic on the 100-char cut.
        let korean = "형식".repeat(80);
        let id = google_text_source_id("광고주", &korean);
        assert_eq!(id.len(), 16);
    }

    #[test]
    fn json_id_is_key_order_independent() {
        let a: serde_json::Value = serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"a": 1, "b": 2}"#).unwrap();
        assert_eq!(json_source_id("serp", &a), json_source_id("serp", &b));
    }

    #[test]
    fn url_path_handles_relative_inputs() {
        assert_eq!(url_path("https://host/a/b.jpg?x=1"), "/a/b.jpg");
        assert_eq!(url_path("/a/b.jpg?x=1"), "/a/b.jpg");
        assert_eq!(url_path(""), "");
    }
}
