// Store-backed batch sink: the bridge between a scraper's emission stream
// and the ad store. One sink per target; it owns that target's counters.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use adscope_common::urls::normalize_domain;
use adscope_common::{NormalizedAd, ScrapeTarget, SourceType, UpsertCounts};
use adscope_scrapers::BatchSink;
use adscope_store::AdStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct SinkCounts {
    pub scraped: u32,
    pub new: u32,
    pub updated: u32,
}

pub struct StoreSink {
    store: AdStore,
    target: ScrapeTarget,
    counts: Mutex<SinkCounts>,
}

impl StoreSink {
    pub fn new(store: AdStore, target: ScrapeTarget) -> Self {
        Self {
            store,
            target,
            counts: Mutex::new(SinkCounts::default()),
        }
    }

    pub fn counts(&self) -> SinkCounts {
        *self.counts.lock().expect("sink counts lock poisoned")
    }
}

#[async_trait]
impl BatchSink for StoreSink {
    async fn emit(&self, mut ads: Vec<NormalizedAd>) -> Result<UpsertCounts> {
        // Domain targets stamp their bare domain onto ads that resolved no
        // landing page of their own.
        if self.target.source_type == SourceType::Domain {
            let bare = normalize_domain(&self.target.source_value);
            for ad in &mut ads {
                if ad.domain.is_none() {
                    ad.domain = Some(bare.clone());
                }
            }
        }

        let scraped = ads.len() as u32;
        let counts = self.store.upsert_batch(&ads, self.target.brand_id).await?;

        let mut guard = self.counts.lock().expect("sink counts lock poisoned");
        guard.scraped += scraped;
        guard.new += counts.new;
        guard.updated += counts.updated;

        Ok(counts)
    }
}
