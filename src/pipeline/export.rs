use crate::error::ExportError;
use crate::parsers::listing::LinkSet;
use crate::pipeline::ItemStage;
use crate::results::{CrawlRecord, LinkPageRecord};
use crate::utils::sibling_with_extension;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Collects records and writes them as a pretty JSON array on close,
/// optionally with a CSV copy next to it.
#[derive(Debug)]
pub struct JsonExporter {
    path: PathBuf,
    csv_path: Option<PathBuf>,
    rows: Vec<Value>,
}

impl JsonExporter {
    /// Export to `output_dir/file_name`; with `write_csv` also to the `.csv` sibling
    pub fn new(output_dir: &Path, file_name: &str, write_csv: bool) -> Self {
        Self {
            path: output_dir.join(file_name),
            csv_path: write_csv.then(|| sibling_with_extension(output_dir, file_name, "csv")),
            rows: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<T: CrawlRecord> ItemStage<T> for JsonExporter {
    fn name(&self) -> &'static str {
        "export"
    }

    async fn process(&mut self, item: T) -> Option<T> {
        match serde_json::to_value(&item) {
            Ok(row) => self.rows.push(row),
            Err(e) => ::log::error!("Failed to serialize record for {}: {}", item.url(), e),
        }
        Some(item)
    }

    fn close(&mut self) -> Result<(), ExportError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_json(&self.path, &self.rows)?;
        ::log::info!("Wrote {} records to {}", self.rows.len(), self.path.display());

        if let Some(csv_path) = &self.csv_path {
            write_csv(csv_path, &self.rows)?;
            ::log::info!("Wrote {} rows to {}", self.rows.len(), csv_path.display());
        }
        Ok(())
    }
}

fn write_json(path: &Path, rows: &[Value]) -> Result<(), ExportError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, rows)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Flatten a JSON value into one CSV cell
fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(cell).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// Write `rows` with the sorted union of their field names as the header
pub fn write_csv(path: &Path, rows: &[Value]) -> Result<(), ExportError> {
    let columns: BTreeSet<&str> = rows
        .iter()
        .filter_map(Value::as_object)
        .flat_map(|row| row.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&columns)?;
    for row in rows {
        let record = columns
            .iter()
            .map(|column| row.get(*column).map(cell).unwrap_or_default());
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a links file written by the discovery pass and return its product
/// URLs, deduplicated in first-seen order. Error records are skipped.
pub fn load_product_links<P: AsRef<Path>>(path: P) -> Result<Vec<String>, ExportError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let records: Vec<LinkPageRecord> = serde_json::from_reader(reader)?;

    let mut links = LinkSet::new();
    for record in &records {
        for link in record.product_links() {
            links.insert(link.clone());
        }
    }
    ::log::info!(
        "Loaded {} product links from {} records in {}",
        links.len(),
        records.len(),
        path.as_ref().display()
    );
    Ok(links.into())
}
