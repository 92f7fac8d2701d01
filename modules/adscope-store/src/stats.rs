// Per-brand daily collection stats. Same-day rows accumulate; they are
// never replaced. Fire-and-forget like the activity log.

use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use adscope_common::Platform;

pub async fn record_daily_stats(
    pool: &PgPool,
    brand_id: Uuid,
    platform: Platform,
    new_count: u32,
    updated_count: u32,
    total_scraped: u32,
) {
    let result = sqlx::query(
        r#"
        INSERT INTO daily_brand_stats (brand_id, platform, new_count, updated_count, total_scraped)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (brand_id, stat_date, platform) DO UPDATE SET
            new_count = daily_brand_stats.new_count + EXCLUDED.new_count,
            updated_count = daily_brand_stats.updated_count + EXCLUDED.updated_count,
            total_scraped = daily_brand_stats.total_scraped + EXCLUDED.total_scraped,
            updated_at = NOW()
        "#,
    )
    .bind(brand_id)
    .bind(platform.to_string())
    .bind(new_count as i32)
    .bind(updated_count as i32)
    .bind(total_scraped as i32)
    .execute(pool)
    .await;

    if let Err(e) = result {
        warn!(%brand_id, %platform, error = %e, "Failed to record daily stats");
    }
}
