use anyhow::Result;
use tracing::info;

use adscope_common::NormalizedAd;

use crate::traits::BatchSink;

/// Ads are handed to the sink every this many items; the remainder goes out
/// on `finish`. Nothing is retained after a flush.
pub const BATCH_SIZE: usize = 50;

pub struct BatchBuffer<'a> {
    sink: &'a dyn BatchSink,
    buffer: Vec<NormalizedAd>,
    emitted: u32,
}

impl<'a> BatchBuffer<'a> {
    pub fn new(sink: &'a dyn BatchSink) -> Self {
        Self {
            sink,
            buffer: Vec::new(),
            emitted: 0,
        }
    }

    pub async fn push(&mut self, ad: NormalizedAd) -> Result<()> {
        self.buffer.push(ad);
        if self.buffer.len() >= BATCH_SIZE {
            self.flush().await?;
        }
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.buffer);
        let count = batch.len() as u32;
        self.sink.emit(batch).await?;
        self.emitted += count;
        info!(batch = count, total = self.emitted, "Batch emitted");
        Ok(())
    }

    /// Flush the remainder and return the total number of ads emitted.
    pub async fn finish(mut self) -> Result<u32> {
        self.flush().await?;
        Ok(self.emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use adscope_common::{AdFormat, MediaType, Platform, UpsertCounts};

    struct RecordingSink {
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl BatchSink for RecordingSink {
        async fn emit(&self, ads: Vec<NormalizedAd>) -> Result<UpsertCounts> {
            self.batches.lock().unwrap().push(ads.len());
            Ok(UpsertCounts {
                new: ads.len() as u32,
                updated: 0,
                total: ads.len() as u32,
            })
        }
    }

    fn ad(i: usize) -> NormalizedAd {
        NormalizedAd::new(
            format!("id{i}"),
            Platform::Google,
            AdFormat::Image,
            "Acme".to_string(),
            "https://x/t.jpg".to_string(),
            MediaType::Image,
        )
    }

    #[tokio::test]
    async fn flushes_every_batch_size_and_remainder_on_finish() {
        let sink = RecordingSink { batches: Mutex::new(Vec::new()) };
        let mut buffer = BatchBuffer::new(&sink);

        for i in 0..(BATCH_SIZE * 2 + 7) {
            buffer.push(ad(i)).await.unwrap();
        }
        let total = buffer.finish().await.unwrap();

        assert_eq!(total, (BATCH_SIZE * 2 + 7) as u32);
        assert_eq!(*sink.batches.lock().unwrap(), vec![BATCH_SIZE, BATCH_SIZE, 7]);
    }

    #[tokio::test]
    async fn finish_with_nothing_buffered_emits_nothing() {
        let sink = RecordingSink { batches: Mutex::new(Vec::new()) };
        let buffer = BatchBuffer::new(&sink);
        assert_eq!(buffer.finish().await.unwrap(), 0);
        assert!(sink.batches.lock().unwrap().is_empty());
    }
}
