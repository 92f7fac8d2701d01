// Postgres persistence for normalized ads. Identity is (source_id, platform).

use std::collections::HashSet;

use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use adscope_common::urls::normalize_domain;
use adscope_common::{MediaType, NormalizedAd, Platform, UpsertCounts};

use crate::error::Result;

#[derive(Clone)]
pub struct AdStore {
    pool: PgPool,
}

impl AdStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Upsert a batch of ads. Each row is atomic on its own; the batch is
    /// not, so the returned counts reflect the rows that actually landed.
    ///
    /// On conflict the mutable fields are refreshed and `updated_at` /
    /// `saved_at` bumped; `created_at` is never touched and a non-null
    /// `creative_id` / `brand_id` is never blanked.
    pub async fn upsert_batch(
        &self,
        ads: &[NormalizedAd],
        brand_id: Option<Uuid>,
    ) -> Result<UpsertCounts> {
        if ads.is_empty() {
            return Ok(UpsertCounts::default());
        }

        let mut counts = UpsertCounts::default();

        for ad in ads {
            if !row_is_valid(ad) {
                continue;
            }

            let effective_brand_id = brand_id.or(ad.brand_id);

            let is_new = sqlx::query_scalar::<_, bool>(
                r#"
                INSERT INTO ads (
                    source_id, platform, format, advertiser_name,
                    advertiser_handle, advertiser_avatar_url,
                    thumbnail_url, preview_url, media_type,
                    ad_copy, cta_text, likes, comments, shares,
                    start_date, end_date, tags,
                    landing_page_url, domain, creative_id,
                    brand_id, raw_data, saved_at
                ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, NOW()
                )
                ON CONFLICT (source_id, platform) DO UPDATE SET
                    advertiser_name = EXCLUDED.advertiser_name,
                    thumbnail_url = EXCLUDED.thumbnail_url,
                    preview_url = EXCLUDED.preview_url,
                    ad_copy = EXCLUDED.ad_copy,
                    cta_text = EXCLUDED.cta_text,
                    end_date = EXCLUDED.end_date,
                    raw_data = EXCLUDED.raw_data,
                    landing_page_url = EXCLUDED.landing_page_url,
                    domain = EXCLUDED.domain,
                    creative_id = COALESCE(EXCLUDED.creative_id, ads.creative_id),
                    brand_id = COALESCE(EXCLUDED.brand_id, ads.brand_id),
                    updated_at = NOW(),
                    saved_at = NOW()
                RETURNING (xmax = 0) AS is_new
                "#,
            )
            .bind(&ad.source_id)
            .bind(ad.platform.to_string())
            .bind(ad.format.to_string())
            .bind(&ad.advertiser_name)
            .bind(&ad.advertiser_handle)
            .bind(&ad.advertiser_avatar_url)
            .bind(&ad.thumbnail_url)
            .bind(&ad.preview_url)
            .bind(ad.media_type.to_string())
            .bind(&ad.ad_copy)
            .bind(&ad.cta_text)
            .bind(ad.likes)
            .bind(ad.comments)
            .bind(ad.shares)
            .bind(ad.start_date)
            .bind(ad.end_date)
            .bind(&ad.tags)
            .bind(&ad.landing_page_url)
            .bind(&ad.domain)
            .bind(&ad.creative_id)
            .bind(effective_brand_id)
            .bind(&ad.raw_data)
            .fetch_one(&self.pool)
            .await?;

            if is_new {
                counts.new += 1;
            } else {
                counts.updated += 1;
            }
        }

        counts.total = counts.new + counts.updated;
        Ok(counts)
    }

    /// Known creative ids for a domain, feeding Google incremental mode.
    /// Matches rows whose normalized `domain` equals the bare domain, or
    /// whose landing URL contains it.
    pub async fn existing_creative_ids(
        &self,
        platform: Platform,
        domain: &str,
    ) -> Result<HashSet<String>> {
        let bare = normalize_domain(domain);

        let rows = sqlx::query_scalar::<_, String>(
            r#"
            SELECT creative_id FROM ads
            WHERE platform = $1
              AND creative_id IS NOT NULL
              AND (REPLACE(COALESCE(domain, ''), 'www.', '') = $2
                   OR landing_page_url LIKE '%' || $2 || '%')
            "#,
        )
        .bind(platform.to_string())
        .bind(&bare)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    /// Known source ids for a platform (optionally scoped to a brand),
    /// feeding the Meta scroll early-termination check.
    pub async fn existing_source_ids(
        &self,
        platform: Platform,
        brand_id: Option<Uuid>,
    ) -> Result<HashSet<String>> {
        let rows = sqlx::query_scalar::<_, String>(
            r#"
            SELECT source_id FROM ads
            WHERE platform = $1
              AND ($2::uuid IS NULL OR brand_id = $2)
            "#,
        )
        .bind(platform.to_string())
        .bind(brand_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    pub async fn total_ads(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM ads")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Precondition check: a missing source id, or a missing thumbnail on a
/// non-text ad, rejects the row without aborting its siblings.
fn row_is_valid(ad: &NormalizedAd) -> bool {
    if ad.source_id.is_empty() {
        warn!(
            advertiser = %ad.advertiser_name,
            platform = %ad.platform,
            "Rejecting ad with empty source_id"
        );
        return false;
    }
    if ad.thumbnail_url.is_empty() && ad.media_type != MediaType::Text {
        warn!(
            source_id = %ad.source_id,
            platform = %ad.platform,
            "Rejecting non-text ad with empty thumbnail_url"
        );
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use adscope_common::AdFormat;

    fn ad(source_id: &str, thumbnail: &str, media_type: MediaType) -> NormalizedAd {
        NormalizedAd::new(
            source_id.to_string(),
            Platform::Google,
            AdFormat::Image,
            "Acme".to_string(),
            thumbnail.to_string(),
            media_type,
        )
    }

    #[test]
    fn rows_without_source_id_are_rejected() {
        assert!(!row_is_valid(&ad("", "https://x/t.jpg", MediaType::Image)));
    }

    #[test]
    fn non_text_rows_need_a_thumbnail() {
        assert!(!row_is_valid(&ad("abc", "", MediaType::Image)));
        assert!(!row_is_valid(&ad("abc", "", MediaType::Video)));
        assert!(row_is_valid(&ad("abc", "", MediaType::Text)));
        assert!(row_is_valid(&ad("abc", "https://x/t.jpg", MediaType::Image)));
    }
}
