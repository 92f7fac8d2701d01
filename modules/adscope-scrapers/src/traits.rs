use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

use adscope_common::{NormalizedAd, RunMode, ScrapeTarget, UpsertCounts};

/// Receives batches as a scraper produces them. The production sink upserts
/// into the store and accumulates per-target counters; tests swap in an
/// in-memory one.
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn emit(&self, ads: Vec<NormalizedAd>) -> Result<UpsertCounts>;
}

/// Per-call scrape options, shared by every platform driver.
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub headless: bool,
    /// `None` = unbounded collection.
    pub max_results: Option<usize>,
    pub mode: RunMode,
    /// Google incremental mode: creative ids already stored for this domain.
    pub known_creative_ids: HashSet<String>,
    /// Meta incremental mode: source ids already stored for this brand.
    pub known_source_ids: HashSet<String>,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            headless: true,
            max_results: None,
            mode: RunMode::Full,
            known_creative_ids: HashSet::new(),
            known_source_ids: HashSet::new(),
        }
    }
}

impl ScrapeOptions {
    pub fn is_incremental(&self) -> bool {
        self.mode == RunMode::Incremental
    }

    /// True while `count` is still under the configured cap.
    pub fn under_limit(&self, count: usize) -> bool {
        match self.max_results {
            Some(max) => count < max,
            None => true,
        }
    }
}

/// One platform driver. A single call drives one browser or HTTP session
/// sequentially; the orchestrator decides how many run in parallel.
///
/// Per-item failures are warnings and the scraper continues; only a dead
/// root listing, auth rejection, or launch failure errors the call.
#[async_trait]
pub trait AdScraper: Send + Sync {
    fn name(&self) -> &str;

    /// Scrape one target, streaming batches into `sink`. Returns the number
    /// of ads emitted.
    async fn run(
        &self,
        target: &ScrapeTarget,
        options: &ScrapeOptions,
        sink: &dyn BatchSink,
    ) -> Result<u32>;
}
