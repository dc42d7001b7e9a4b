//! Ordered item stages applied to every record a crawl pass yields.

pub mod export;
pub mod stages;

pub use export::{JsonExporter, load_product_links};
pub use stages::{DuplicatesStage, ValidationStage};

use crate::error::ExportError;
use crate::results::CrawlRecord;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// One step of the item pipeline
#[async_trait]
pub trait ItemStage<T: CrawlRecord>: Send {
    fn name(&self) -> &'static str;

    /// Pass the item on, possibly modified, or drop it by returning `None`
    async fn process(&mut self, item: T) -> Option<T>;

    /// Called once after the last item
    fn close(&mut self) -> Result<(), ExportError> {
        Ok(())
    }
}

/// Counts kept while draining a pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub received: usize,
    pub errors: usize,
    pub dropped: usize,
}

pub struct Pipeline<T: CrawlRecord> {
    stages: Vec<Box<dyn ItemStage<T>>>,
    stats: PipelineStats,
}

impl<T: CrawlRecord> Default for Pipeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CrawlRecord> Pipeline<T> {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            stats: PipelineStats::default(),
        }
    }

    /// Append a stage; stages run in the order they were added
    pub fn with_stage(mut self, stage: impl ItemStage<T> + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub async fn process(&mut self, item: T) -> Option<T> {
        self.stats.received += 1;
        if item.error().is_some() {
            self.stats.errors += 1;
        }

        let mut item = item;
        for stage in self.stages.iter_mut() {
            match stage.process(item).await {
                Some(next) => item = next,
                None => {
                    ::log::debug!("Item dropped by {} stage", stage.name());
                    self.stats.dropped += 1;
                    return None;
                }
            }
        }
        Some(item)
    }

    /// Close every stage, stopping at the first failure
    pub fn close(&mut self) -> Result<PipelineStats, ExportError> {
        for stage in self.stages.iter_mut() {
            stage.close()?;
        }
        ::log::info!(
            "Pipeline closed: {} items received, {} errors, {} dropped",
            self.stats.received,
            self.stats.errors,
            self.stats.dropped
        );
        Ok(self.stats)
    }

    /// Feed everything from `rx` through the stages, then close them
    pub async fn drain(mut self, mut rx: mpsc::Receiver<T>) -> Result<PipelineStats, ExportError> {
        while let Some(item) = rx.recv().await {
            self.process(item).await;
        }
        self.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::LinkPageRecord;
    use crate::seen::SeenUrls;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl ItemStage<LinkPageRecord> for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn process(&mut self, item: LinkPageRecord) -> Option<LinkPageRecord> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Some(item)
        }
    }

    fn success(url: &str) -> LinkPageRecord {
        LinkPageRecord::success(url, vec![format!("{}/p", url)], 1)
    }

    #[tokio::test]
    async fn test_drain_counts_and_drops() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(success("https://example.test/a")).await.unwrap();
        tx.send(success("https://example.test/a")).await.unwrap();
        tx.send(LinkPageRecord::error("https://example.test/b", "timeout"))
            .await
            .unwrap();
        drop(tx);

        let pipeline = Pipeline::new()
            .with_stage(ValidationStage::new())
            .with_stage(DuplicatesStage::new(SeenUrls::new()));
        let stats = pipeline.drain(rx).await.unwrap();

        assert_eq!(
            stats,
            PipelineStats {
                received: 3,
                errors: 1,
                dropped: 1
            }
        );
    }

    #[tokio::test]
    async fn test_dropped_item_skips_later_stages() {
        let reached = Arc::new(AtomicUsize::new(0));
        let mut pipeline = Pipeline::new()
            .with_stage(DuplicatesStage::new(SeenUrls::new()))
            .with_stage(Counting(reached.clone()));

        assert!(pipeline.process(success("https://example.test/a")).await.is_some());
        assert!(pipeline.process(success("https://example.test/a")).await.is_none());
        assert_eq!(reached.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.close().unwrap().dropped, 1);
    }
}
