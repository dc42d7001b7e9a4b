use crate::pipeline::ItemStage;
use crate::results::CrawlRecord;
use crate::seen::SeenUrls;
use async_trait::async_trait;

/// Logs error records and success records with empty required fields.
/// Never drops anything.
#[derive(Debug, Default)]
pub struct ValidationStage;

impl ValidationStage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl<T: CrawlRecord> ItemStage<T> for ValidationStage {
    fn name(&self) -> &'static str {
        "validation"
    }

    async fn process(&mut self, item: T) -> Option<T> {
        if let Some(error) = item.error() {
            ::log::error!("Error record for {}: {}", item.url(), error);
            return Some(item);
        }

        let missing = item.missing_fields();
        if !missing.is_empty() {
            ::log::warn!("Record for {} is missing {}", item.url(), missing.join(", "));
        }
        Some(item)
    }
}

/// Drops success records whose URL already went through this run.
/// Error records always pass.
#[derive(Debug, Clone)]
pub struct DuplicatesStage {
    seen: SeenUrls,
    duplicates: usize,
}

impl DuplicatesStage {
    pub fn new(seen: SeenUrls) -> Self {
        Self {
            seen,
            duplicates: 0,
        }
    }
}

#[async_trait]
impl<T: CrawlRecord> ItemStage<T> for DuplicatesStage {
    fn name(&self) -> &'static str {
        "duplicates"
    }

    async fn process(&mut self, item: T) -> Option<T> {
        if item.error().is_some() {
            return Some(item);
        }
        if self.seen.insert_if_new(item.url()).await {
            Some(item)
        } else {
            self.duplicates += 1;
            ::log::debug!("Duplicate item found: {}", item.url());
            None
        }
    }

    fn close(&mut self) -> Result<(), crate::error::ExportError> {
        if self.duplicates > 0 {
            ::log::info!("Dropped {} duplicate items", self.duplicates);
        }
        Ok(())
    }
}
