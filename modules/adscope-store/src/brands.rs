// Brand + source reads for the resolver. Query-function style, one row
// tuple per query, decoded into the shared target type.

use sqlx::PgPool;

use adscope_common::{Platform, ScrapeTarget, SourceType};

use crate::error::{Result, StoreError};

/// Active brands joined with their active sources, ordered so two
/// back-to-back reads produce identical target lists.
pub async fn active_brand_targets(pool: &PgPool) -> Result<Vec<ScrapeTarget>> {
    let rows = sqlx::query_as::<_, (uuid::Uuid, String, String, String, String)>(
        r#"
        SELECT b.id, b.brand_name, s.platform, s.source_type, s.source_value
        FROM brands b
        JOIN brand_sources s ON s.brand_id = b.id
        WHERE b.is_active = TRUE
          AND s.is_active = TRUE
        ORDER BY b.brand_name, s.platform, s.source_value
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(brand_id, brand_name, platform, source_type, source_value)| {
            Ok(ScrapeTarget {
                brand_id: Some(brand_id),
                brand_name,
                platform: parse_platform(&platform)?,
                source_type: parse_source_type(&source_type)?,
                source_value,
            })
        })
        .collect()
}

/// Legacy monitored-domain list: google/domain targets with no brand
/// binding. Read only when no active brand sources exist.
pub async fn legacy_domain_targets(pool: &PgPool) -> Result<Vec<ScrapeTarget>> {
    let rows = sqlx::query_as::<_, (String,)>(
        r#"
        SELECT domain FROM monitored_domains
        WHERE is_active = TRUE
        ORDER BY created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(domain,)| ScrapeTarget {
            brand_id: None,
            brand_name: String::new(),
            platform: Platform::Google,
            source_type: SourceType::Domain,
            source_value: domain,
        })
        .collect())
}

fn parse_platform(s: &str) -> Result<Platform> {
    s.parse().map_err(StoreError::Decode)
}

fn parse_source_type(s: &str) -> Result<SourceType> {
    s.parse().map_err(StoreError::Decode)
}
