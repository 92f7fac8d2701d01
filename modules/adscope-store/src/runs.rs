// Batch-run accountability rows. The run row is updated after every target
// so a run in flight is inspectable from the outside.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use adscope_common::{BatchRun, BatchRunStatus};

use crate::error::{Result, StoreError};

#[derive(Clone)]
pub struct RunStore {
    pool: PgPool,
}

/// Aggregates written back into the run row mid-flight and at finalization.
#[derive(Debug, Clone, Default)]
pub struct RunProgress {
    pub total_ads_scraped: u32,
    pub total_ads_new: u32,
    pub total_ads_updated: u32,
    pub domain_results: serde_json::Value,
    pub errors: Vec<String>,
}

impl RunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new run row in `running` state and return its id.
    pub async fn create(&self, trigger_type: &str) -> Result<Uuid> {
        let run_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO batch_runs (id, started_at, status, trigger_type)
            VALUES ($1, NOW(), $2, $3)
            "#,
        )
        .bind(run_id)
        .bind(BatchRunStatus::Running.to_string())
        .bind(trigger_type)
        .execute(&self.pool)
        .await?;

        tracing::info!(%run_id, trigger_type, "Batch run created");
        Ok(run_id)
    }

    pub async fn set_total_targets(&self, run_id: Uuid, total_targets: u32) -> Result<()> {
        sqlx::query("UPDATE batch_runs SET total_targets = $1 WHERE id = $2")
            .bind(total_targets as i32)
            .bind(run_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Persist partial aggregates after a target completes. Totals only ever
    /// grow, so successive reads of the row see non-decreasing counts.
    pub async fn update_progress(&self, run_id: Uuid, progress: &RunProgress) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE batch_runs SET
                total_ads_scraped = $1,
                total_ads_new = $2,
                total_ads_updated = $3,
                domain_results = $4,
                errors = $5
            WHERE id = $6
            "#,
        )
        .bind(progress.total_ads_scraped as i32)
        .bind(progress.total_ads_new as i32)
        .bind(progress.total_ads_updated as i32)
        .bind(&progress.domain_results)
        .bind(serde_json::json!(progress.errors))
        .bind(run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn finalize(
        &self,
        run_id: Uuid,
        status: BatchRunStatus,
        progress: &RunProgress,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE batch_runs SET
                status = $1,
                finished_at = NOW(),
                total_ads_scraped = $2,
                total_ads_new = $3,
                total_ads_updated = $4,
                domain_results = $5,
                errors = $6
            WHERE id = $7
            "#,
        )
        .bind(status.to_string())
        .bind(progress.total_ads_scraped as i32)
        .bind(progress.total_ads_new as i32)
        .bind(progress.total_ads_updated as i32)
        .bind(&progress.domain_results)
        .bind(serde_json::json!(progress.errors))
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        tracing::info!(%run_id, %status, "Batch run finalized");
        Ok(())
    }

    /// Best-effort terminal write for the signal path: a run killed mid-
    /// flight must not sit in `running` forever.
    pub async fn mark_failed(&self, run_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE batch_runs
            SET status = $1, finished_at = NOW()
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(BatchRunStatus::Failed.to_string())
        .bind(run_id)
        .bind(BatchRunStatus::Running.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find(&self, run_id: Uuid) -> Result<Option<BatchRun>> {
        let row = sqlx::query_as::<
            _,
            (
                Uuid,
                DateTime<Utc>,
                Option<DateTime<Utc>>,
                String,
                String,
                i32,
                i32,
                i32,
                i32,
                serde_json::Value,
                serde_json::Value,
            ),
        >(
            r#"
            SELECT id, started_at, finished_at, status, trigger_type,
                   total_targets, total_ads_scraped, total_ads_new,
                   total_ads_updated, domain_results, errors
            FROM batch_runs
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_batch_run).transpose()
    }
}

fn row_to_batch_run(
    r: (
        Uuid,
        DateTime<Utc>,
        Option<DateTime<Utc>>,
        String,
        String,
        i32,
        i32,
        i32,
        i32,
        serde_json::Value,
        serde_json::Value,
    ),
) -> Result<BatchRun> {
    Ok(BatchRun {
        id: r.0,
        started_at: r.1,
        finished_at: r.2,
        status: r.3.parse().map_err(StoreError::Decode)?,
        trigger_type: r.4,
        total_targets: r.5 as u32,
        total_ads_scraped: r.6 as u32,
        total_ads_new: r.7 as u32,
        total_ads_updated: r.8 as u32,
        domain_results: r.9,
        errors: serde_json::from_value(r.10).unwrap_or_default(),
    })
}
