// Append-only activity log. Writes are fire-and-forget: a failed insert is
// logged locally and never propagated to the collection path.

use sqlx::PgPool;
use tracing::warn;

pub async fn log_activity(
    pool: &PgPool,
    event_type: &str,
    event_subtype: Option<&str>,
    title: &str,
    message: &str,
    metadata: serde_json::Value,
) {
    let result = sqlx::query(
        r#"
        INSERT INTO activity_logs (event_type, event_subtype, title, message, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(event_type)
    .bind(event_subtype)
    .bind(title)
    .bind(message)
    .bind(metadata)
    .execute(pool)
    .await;

    if let Err(e) = result {
        warn!(event_type, title, error = %e, "Failed to write activity log");
    }
}
