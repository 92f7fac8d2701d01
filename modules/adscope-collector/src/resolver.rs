// Resolves a run's target list. Brand sources are the primary path; the
// legacy monitored-domains list only feeds runs configured before brands
// existed.

use sqlx::PgPool;
use tracing::info;

use adscope_common::{Platform, ScrapeTarget, SourceType};
use adscope_store::brands;

pub async fn resolve_targets(pool: &PgPool) -> adscope_store::Result<Vec<ScrapeTarget>> {
    let targets = brands::active_brand_targets(pool).await?;
    if !targets.is_empty() {
        info!(targets = targets.len(), "Resolved active brand sources");
        return Ok(targets);
    }

    let legacy = brands::legacy_domain_targets(pool).await?;
    info!(
        targets = legacy.len(),
        "No active brand sources, using legacy monitored domains"
    );
    Ok(legacy)
}

/// Single ad-hoc target for a `--domain` override: google/domain, no brand.
pub fn adhoc_domain_target(domain: &str) -> ScrapeTarget {
    ScrapeTarget {
        brand_id: None,
        brand_name: String::new(),
        platform: Platform::Google,
        source_type: SourceType::Domain,
        source_value: domain.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adhoc_target_is_google_domain_without_brand() {
        let target = adhoc_domain_target("acme.com");
        assert_eq!(target.platform, Platform::Google);
        assert_eq!(target.source_type, SourceType::Domain);
        assert_eq!(target.source_value, "acme.com");
        assert!(target.brand_id.is_none());
        assert_eq!(target.label(), "google:acme.com");
    }
}
