//! Collection orchestrator: one batch run across all resolved targets.
//!
//! Run lifecycle: created → running → (completed | failed). Per-target
//! failures never fail the run; they land in the errors list and the run
//! still completes. The run row is re-persisted after every target so a run
//! in flight is inspectable.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, Utc, Weekday};
use sqlx::PgPool;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use adscope_common::{
    BatchRunStatus, Config, DryRunPlan, Platform, RunMode, RunReport, RunSummary, ScrapeTarget,
    SourceType, TargetResult, TriggerType,
};
use adscope_scrapers::{
    AdScraper, GoogleScraper, MetaApiScraper, MetaScraper, ScrapeOptions, SerpApiScraper,
    TikTokScraper,
};
use adscope_store::{activity, stats, AdStore, RunProgress, RunStore};
use browserless_client::BrowserlessClient;

use crate::resolver;
use crate::sink::{SinkCounts, StoreSink};

/// Platform → driver wiring for one process. Browser-driven drivers are
/// preferred; API drivers stand in when no browser service is configured.
#[derive(Clone, Default)]
pub struct ScraperSet {
    pub google: Option<Arc<dyn AdScraper>>,
    pub meta: Option<Arc<dyn AdScraper>>,
    pub instagram: Option<Arc<dyn AdScraper>>,
    pub tiktok: Option<Arc<dyn AdScraper>>,
}

impl ScraperSet {
    pub fn from_config(config: &Config) -> Self {
        let has_browser = !config.browserless_url.is_empty();
        let token = (!config.browserless_token.is_empty()).then_some(config.browserless_token.as_str());

        let google: Option<Arc<dyn AdScraper>> = if has_browser {
            Some(Arc::new(GoogleScraper::new(
                BrowserlessClient::new(&config.browserless_url, token),
                &config.region,
            )))
        } else if !config.serpapi_key.is_empty() {
            info!("No browser service configured, google targets use SerpAPI");
            Some(Arc::new(SerpApiScraper::new(&config.serpapi_key)))
        } else {
            None
        };

        let meta: Option<Arc<dyn AdScraper>> = if has_browser {
            Some(Arc::new(MetaScraper::new(
                BrowserlessClient::new(&config.browserless_url, token),
                &config.region,
            )))
        } else if !config.meta_access_token.is_empty() {
            info!("No browser service configured, meta targets use the Graph API");
            Some(Arc::new(MetaApiScraper::new(
                &config.meta_access_token,
                &config.region,
            )))
        } else {
            None
        };

        let instagram: Option<Arc<dyn AdScraper>> = (!config.meta_access_token.is_empty())
            .then(|| {
                Arc::new(MetaApiScraper::new(&config.meta_access_token, &config.region))
                    as Arc<dyn AdScraper>
            });

        let tiktok: Option<Arc<dyn AdScraper>> = (!config.tiktok_api_key.is_empty())
            .then(|| Arc::new(TikTokScraper::new(&config.tiktok_api_key)) as Arc<dyn AdScraper>);

        Self { google, meta, instagram, tiktok }
    }

    pub fn for_platform(&self, platform: Platform) -> Option<Arc<dyn AdScraper>> {
        match platform {
            Platform::Google => self.google.clone(),
            Platform::Meta => self.meta.clone(),
            Platform::Instagram => self.instagram.clone(),
            Platform::Tiktok => self.tiktok.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunParams {
    pub trigger_type: TriggerType,
    pub domain: Option<String>,
    pub mode: RunMode,
    pub dry_run: bool,
}

#[derive(Clone)]
pub struct Orchestrator {
    pool: PgPool,
    ads: AdStore,
    runs: RunStore,
    scrapers: ScraperSet,
    concurrency: usize,
    active_run: Arc<Mutex<Option<Uuid>>>,
}

impl Orchestrator {
    pub fn new(pool: PgPool, scrapers: ScraperSet, concurrency: usize) -> Self {
        Self {
            ads: AdStore::new(pool.clone()),
            runs: RunStore::new(pool.clone()),
            pool,
            scrapers,
            concurrency: concurrency.max(1),
            active_run: Arc::new(Mutex::new(None)),
        }
    }

    /// Execute one batch run (or return the dry-run plan).
    pub async fn run_batch(&self, params: RunParams) -> Result<RunReport> {
        let mode = resolve_auto_mode(params.mode, Utc::now().weekday());
        if params.mode == RunMode::Auto {
            info!(resolved = %mode, "Auto mode resolved");
        }

        let targets = match &params.domain {
            Some(domain) => vec![resolver::adhoc_domain_target(domain)],
            None => resolver::resolve_targets(&self.pool).await?,
        };
        let trigger = params.trigger_type.to_string();

        if params.dry_run {
            info!(targets = targets.len(), "Dry run: resolved targets only");
            return Ok(RunReport::Plan(DryRunPlan {
                trigger_type: trigger,
                mode,
                total_targets: targets.len() as u32,
                targets: targets.iter().map(ScrapeTarget::label).collect(),
            }));
        }

        let run_id = self.runs.create(&trigger).await?;
        *self.active_run.lock().await = Some(run_id);

        let result = self.execute_run(run_id, &trigger, mode, targets).await;

        *self.active_run.lock().await = None;
        if result.is_err() {
            // Run-fatal path: never leave the row in `running`.
            if let Err(e) = self.runs.mark_failed(run_id).await {
                error!(%run_id, error = %e, "Failed to mark interrupted run as failed");
            }
        }
        result
    }

    /// Best-effort terminal write for the signal path.
    pub async fn abort_active_run(&self) {
        let run_id = *self.active_run.lock().await;
        if let Some(run_id) = run_id {
            warn!(%run_id, "Aborting active run");
            if let Err(e) = self.runs.mark_failed(run_id).await {
                error!(%run_id, error = %e, "Failed to mark aborted run as failed");
            }
        }
    }

    async fn execute_run(
        &self,
        run_id: Uuid,
        trigger: &str,
        mode: RunMode,
        targets: Vec<ScrapeTarget>,
    ) -> Result<RunReport> {
        let total_targets = targets.len() as u32;
        self.runs.set_total_targets(run_id, total_targets).await?;
        activity::log_activity(
            &self.pool,
            "collection",
            Some("batch_started"),
            "Batch collection started",
            "",
            serde_json::json!({
                "run_id": run_id,
                "mode": mode,
                "trigger_type": trigger,
                "total_targets": total_targets,
            }),
        )
        .await;

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = JoinSet::new();
        for target in targets {
            let semaphore = semaphore.clone();
            let worker = self.clone();
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                let result = worker.scrape_target(&target, mode).await;
                (target, result)
            });
        }

        let mut progress = RunProgress::default();
        let mut results_map = serde_json::Map::new();
        let mut target_results = Vec::new();

        while let Some(joined) = join_set.join_next().await {
            let (target, result) = joined.context("Scrape task panicked")?;

            progress.total_ads_scraped += result.ads_scraped;
            progress.total_ads_new += result.ads_new;
            progress.total_ads_updated += result.ads_updated;
            if let Some(err) = &result.error {
                progress.errors.push(err.clone());
                activity::log_activity(
                    &self.pool,
                    "collection",
                    Some("batch_failed"),
                    &format!("Target {} failed", result.target),
                    err,
                    serde_json::json!({"run_id": run_id, "target": result.target}),
                )
                .await;
            }
            results_map.insert(result.target.clone(), serde_json::to_value(&result)?);
            progress.domain_results = serde_json::Value::Object(results_map.clone());

            // Run-row freshness after each target is a debugging contract;
            // losing the run row is run-fatal.
            self.runs.update_progress(run_id, &progress).await?;

            if result.ads_new > 0 {
                activity::log_activity(
                    &self.pool,
                    "ad_change",
                    Some("new_ads_found"),
                    &format!("{} new ads saved", result.ads_new),
                    "",
                    serde_json::json!({
                        "new": result.ads_new,
                        "updated": result.ads_updated,
                        "target": result.target,
                        "brand_id": target.brand_id,
                    }),
                )
                .await;
            }
            if result.ads_new + result.ads_updated > 0 {
                if let Some(brand_id) = target.brand_id {
                    stats::record_daily_stats(
                        &self.pool,
                        brand_id,
                        target.platform,
                        result.ads_new,
                        result.ads_updated,
                        result.ads_scraped,
                    )
                    .await;
                }
            }

            info!(
                target = %result.target,
                scraped = result.ads_scraped,
                new = result.ads_new,
                updated = result.ads_updated,
                error = result.error.is_some(),
                "Target finished"
            );
            target_results.push(result);
        }

        let status = final_status(progress.errors.len() as u32, total_targets, progress.total_ads_scraped);
        self.runs.finalize(run_id, status, &progress).await?;
        activity::log_activity(
            &self.pool,
            "collection",
            Some("batch_completed"),
            "Batch collection completed",
            "",
            serde_json::json!({
                "run_id": run_id,
                "status": status,
                "total_ads_scraped": progress.total_ads_scraped,
                "total_ads_new": progress.total_ads_new,
                "total_ads_updated": progress.total_ads_updated,
                "errors": progress.errors.len(),
            }),
        )
        .await;

        info!(
            %run_id,
            %status,
            targets = total_targets,
            scraped = progress.total_ads_scraped,
            new = progress.total_ads_new,
            updated = progress.total_ads_updated,
            errors = progress.errors.len(),
            "Batch run finished"
        );

        Ok(RunReport::Summary(RunSummary {
            batch_run_id: run_id,
            trigger_type: trigger.to_string(),
            mode,
            status,
            total_targets,
            total_ads_scraped: progress.total_ads_scraped,
            total_ads_new: progress.total_ads_new,
            total_ads_updated: progress.total_ads_updated,
            target_results,
            errors: progress.errors,
        }))
    }

    /// Scrape one target. Failures are captured into the result; this never
    /// errors the run.
    async fn scrape_target(&self, target: &ScrapeTarget, mode: RunMode) -> TargetResult {
        let label = target.label();
        info!(target = %label, %mode, "Target starting");
        let started = Instant::now();

        match self.scrape_target_inner(target, mode).await {
            Ok(counts) => TargetResult {
                target: label,
                ads_scraped: counts.scraped,
                ads_new: counts.new,
                ads_updated: counts.updated,
                duration_seconds: round1(started.elapsed().as_secs_f64()),
                error: None,
            },
            Err(e) => {
                let message = target_error(&label, &e);
                error!(target = %label, error = %message, "Target failed");
                TargetResult {
                    target: label,
                    duration_seconds: round1(started.elapsed().as_secs_f64()),
                    error: Some(message),
                    ..Default::default()
                }
            }
        }
    }

    async fn scrape_target_inner(
        &self,
        target: &ScrapeTarget,
        mode: RunMode,
    ) -> Result<SinkCounts> {
        let scraper = self
            .scrapers
            .for_platform(target.platform)
            .ok_or_else(|| anyhow!("No scraper configured for platform {}", target.platform))?;

        let mut options = ScrapeOptions {
            mode,
            ..Default::default()
        };
        if mode == RunMode::Incremental {
            match target.platform {
                Platform::Google if target.source_type == SourceType::Domain => {
                    options.known_creative_ids = self
                        .ads
                        .existing_creative_ids(Platform::Google, &target.source_value)
                        .await
                        .unwrap_or_else(|e| {
                            warn!(error = %e, "Failed to load known creative ids");
                            Default::default()
                        });
                }
                Platform::Meta => {
                    options.known_source_ids = self
                        .ads
                        .existing_source_ids(Platform::Meta, target.brand_id)
                        .await
                        .unwrap_or_else(|e| {
                            warn!(error = %e, "Failed to load known source ids");
                            Default::default()
                        });
                }
                _ => {}
            }
        }

        let sink = StoreSink::new(self.ads.clone(), target.clone());
        scraper.run(target, &options, &sink).await?;
        Ok(sink.counts())
    }
}

/// Auto mode: the weekly full pass lands on Sunday, every other day is
/// incremental.
pub fn resolve_auto_mode(mode: RunMode, weekday: Weekday) -> RunMode {
    match mode {
        RunMode::Auto => {
            if weekday == Weekday::Sun {
                RunMode::Full
            } else {
                RunMode::Incremental
            }
        }
        other => other,
    }
}

/// A run only fails when every target errored and not a single ad was
/// collected; partial success is the norm and still counts as completed.
pub fn final_status(errors: u32, total_targets: u32, total_scraped: u32) -> BatchRunStatus {
    if total_targets > 0 && errors == total_targets && total_scraped == 0 {
        BatchRunStatus::Failed
    } else {
        BatchRunStatus::Completed
    }
}

fn target_error(label: &str, e: &anyhow::Error) -> String {
    format!("[{label}] {e:#}")
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_mode_is_full_on_sunday_only() {
        assert_eq!(resolve_auto_mode(RunMode::Auto, Weekday::Sun), RunMode::Full);
        assert_eq!(resolve_auto_mode(RunMode::Auto, Weekday::Mon), RunMode::Incremental);
        assert_eq!(resolve_auto_mode(RunMode::Auto, Weekday::Sat), RunMode::Incremental);
        assert_eq!(resolve_auto_mode(RunMode::Full, Weekday::Mon), RunMode::Full);
        assert_eq!(resolve_auto_mode(RunMode::Incremental, Weekday::Sun), RunMode::Incremental);
    }

    #[test]
    fn partial_failure_still_completes() {
        assert_eq!(final_status(1, 3, 10), BatchRunStatus::Completed);
        assert_eq!(final_status(3, 3, 5), BatchRunStatus::Completed);
        assert_eq!(final_status(0, 3, 0), BatchRunStatus::Completed);
        assert_eq!(final_status(0, 0, 0), BatchRunStatus::Completed);
    }

    #[test]
    fn total_failure_with_zero_ads_fails() {
        assert_eq!(final_status(3, 3, 0), BatchRunStatus::Failed);
        assert_eq!(final_status(1, 1, 0), BatchRunStatus::Failed);
    }

    #[test]
    fn target_error_carries_label_and_chain() {
        let e = anyhow!("HTTP 500").context("Listing walk failed");
        let msg = target_error("acme/google:acme.com", &e);
        assert!(msg.starts_with("[acme/google:acme.com] "));
        assert!(msg.contains("Listing walk failed"));
        assert!(msg.contains("HTTP 500"));
    }
}
