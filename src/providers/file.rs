use crate::core::rates::{DEFAULT_BASE, RateSource, RateTable};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RatesDocument {
    Envelope {
        base: Option<String>,
        rates: HashMap<String, f64>,
    },
    Flat(HashMap<String, f64>),
}

/// Reads an already merged `code -> rate` map handed over by the host,
/// optionally wrapped in a `{ base, rates }` envelope.
pub struct FileRateSource {
    path: PathBuf,
    base: Option<String>,
}

impl FileRateSource {
    pub fn new<P: Into<PathBuf>>(path: P, base: Option<&str>) -> Self {
        Self {
            path: path.into(),
            base: base.map(str::to_string),
        }
    }
}

#[async_trait]
impl RateSource for FileRateSource {
    #[instrument(name = "FileRatesRead", skip(self))]
    async fn fetch_rates(&self) -> Result<RateTable> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read rates file: {}", self.path.display()))?;

        let document: RatesDocument = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse rates file: {}", self.path.display()))?;

        let (doc_base, rates) = match document {
            RatesDocument::Envelope { base, rates } => (base, rates),
            RatesDocument::Flat(rates) => (None, rates),
        };
        let base = self
            .base
            .clone()
            .or(doc_base)
            .unwrap_or_else(|| DEFAULT_BASE.to_string());
        debug!(
            path = %self.path.display(),
            base = %base,
            count = rates.len(),
            "Loaded rates file"
        );

        let modified: Option<DateTime<Utc>> = tokio::fs::metadata(&self.path)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);

        let table = RateTable::from_rates(&base, rates);
        if table.is_empty() {
            return Err(anyhow!(
                "Rates file {} has no usable rates",
                self.path.display()
            ));
        }

        Ok(match modified {
            Some(at) => table.with_fetched_at(at),
            None => table,
        })
    }
}
