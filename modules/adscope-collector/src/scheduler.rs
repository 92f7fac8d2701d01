//! Cron-style trigger loop: frequent incremental passes plus one weekly full
//! pass. If the previous job of the same kind is still running, the tick is
//! skipped, never queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{Datelike, Local, Timelike, Weekday};
use tracing::{error, info, warn};

use adscope_common::{RunMode, RunReport, TriggerType};

use crate::orchestrator::{Orchestrator, RunParams};

const TICK_SECONDS: u64 = 30;

pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    incremental_hours: u32,
    full_day: Weekday,
    full_hour: u32,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        incremental_hours: u32,
        full_day: &str,
        full_hour: u32,
    ) -> Self {
        Self {
            orchestrator,
            incremental_hours: incremental_hours.max(1),
            full_day: parse_weekday(full_day),
            full_hour,
        }
    }

    pub async fn run(self) -> Result<()> {
        info!(
            incremental_hours = self.incremental_hours,
            full_day = %self.full_day,
            full_hour = self.full_hour,
            "Scheduler started"
        );

        let incremental_busy = Arc::new(AtomicBool::new(false));
        let full_busy = Arc::new(AtomicBool::new(false));
        let mut last_incremental: Option<String> = None;
        let mut last_full: Option<String> = None;

        let mut interval = tokio::time::interval(Duration::from_secs(TICK_SECONDS));
        loop {
            interval.tick().await;
            let now = Local::now();

            if incremental_due(now.hour(), now.minute(), self.incremental_hours) {
                let key = now.format("%Y-%m-%d %H").to_string();
                if last_incremental.as_deref() != Some(&key) {
                    last_incremental = Some(key);
                    self.spawn_job(
                        "incremental",
                        incremental_busy.clone(),
                        TriggerType::ScheduledIncremental,
                        RunMode::Incremental,
                    );
                }
            }

            if full_due(now.weekday(), now.hour(), now.minute(), self.full_day, self.full_hour) {
                let key = now.format("%Y-%m-%d").to_string();
                if last_full.as_deref() != Some(&key) {
                    last_full = Some(key);
                    self.spawn_job(
                        "full",
                        full_busy.clone(),
                        TriggerType::ScheduledFull,
                        RunMode::Full,
                    );
                }
            }
        }
    }

    fn spawn_job(
        &self,
        kind: &'static str,
        busy: Arc<AtomicBool>,
        trigger_type: TriggerType,
        mode: RunMode,
    ) {
        if busy.swap(true, Ordering::SeqCst) {
            warn!(kind, "Previous job still running, skipping this tick");
            return;
        }

        info!(kind, "Scheduled batch starting");
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            let params = RunParams {
                trigger_type,
                domain: None,
                mode,
                dry_run: false,
            };
            match orchestrator.run_batch(params).await {
                Ok(RunReport::Summary(summary)) => info!(
                    kind,
                    scraped = summary.total_ads_scraped,
                    new = summary.total_ads_new,
                    "Scheduled batch finished"
                ),
                Ok(RunReport::Plan(_)) => {}
                Err(e) => error!(kind, error = %e, "Scheduled batch failed"),
            }
            busy.store(false, Ordering::SeqCst);
        });
    }
}

fn incremental_due(hour: u32, minute: u32, every_hours: u32) -> bool {
    minute == 0 && hour % every_hours == 0
}

fn full_due(weekday: Weekday, hour: u32, minute: u32, full_day: Weekday, full_hour: u32) -> bool {
    minute == 0 && weekday == full_day && hour == full_hour
}

fn parse_weekday(s: &str) -> Weekday {
    s.parse().unwrap_or_else(|_| {
        warn!(value = s, "Unrecognized weekday, defaulting to Sunday");
        Weekday::Sun
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_fires_on_matching_hours_at_minute_zero() {
        assert!(incremental_due(0, 0, 4));
        assert!(incremental_due(4, 0, 4));
        assert!(incremental_due(20, 0, 4));
        assert!(!incremental_due(5, 0, 4));
        assert!(!incremental_due(4, 1, 4));
        assert!(!incremental_due(4, 59, 4));
    }

    #[test]
    fn full_fires_on_configured_day_and_hour() {
        assert!(full_due(Weekday::Sun, 3, 0, Weekday::Sun, 3));
        assert!(!full_due(Weekday::Mon, 3, 0, Weekday::Sun, 3));
        assert!(!full_due(Weekday::Sun, 4, 0, Weekday::Sun, 3));
        assert!(!full_due(Weekday::Sun, 3, 30, Weekday::Sun, 3));
    }

    #[test]
    fn weekday_parsing_accepts_short_names() {
        assert_eq!(parse_weekday("sun"), Weekday::Sun);
        assert_eq!(parse_weekday("mon"), Weekday::Mon);
        assert_eq!(parse_weekday("friday"), Weekday::Fri);
        assert_eq!(parse_weekday("not-a-day"), Weekday::Sun);
    }
}
