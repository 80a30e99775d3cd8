//! Rate table and the source abstraction that populates it

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

pub const DEFAULT_BASE: &str = "USD";

/// A single currency known to the rate table.
///
/// `conversion_rate` is the number of units of this currency that one base
/// unit buys. Fiat rates arrive in this form; crypto prices are inverted
/// before they get here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyEntry {
    pub conversion_rate: f64,
    pub display_name: Option<String>,
}

/// Immutable snapshot of all known conversion rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateTable {
    base: String,
    entries: BTreeMap<String, CurrencyEntry>,
    fetched_at: Option<DateTime<Utc>>,
}

impl RateTable {
    /// Table with no rates, used until a source answers.
    pub fn empty() -> Self {
        Self {
            base: DEFAULT_BASE.to_string(),
            entries: BTreeMap::new(),
            fetched_at: None,
        }
    }

    /// Builds a table from raw entries. Codes are uppercased and entries whose
    /// rate is not a positive finite number are dropped.
    pub fn from_entries<I>(base: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (String, CurrencyEntry)>,
    {
        let mut valid = BTreeMap::new();
        for (code, entry) in entries {
            let code = code.trim().to_uppercase();
            if code.is_empty() {
                continue;
            }
            if !is_valid_rate(entry.conversion_rate) {
                warn!(
                    code = %code,
                    rate = entry.conversion_rate,
                    "Dropping currency with invalid conversion rate"
                );
                continue;
            }
            valid.insert(code, entry);
        }

        Self {
            base: base.to_uppercase(),
            entries: valid,
            fetched_at: None,
        }
    }

    /// Convenience constructor for plain code to rate maps.
    pub fn from_rates<I>(base: &str, rates: I) -> Self
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        Self::from_entries(
            base,
            rates.into_iter().map(|(code, rate)| {
                (
                    code,
                    CurrencyEntry {
                        conversion_rate: rate,
                        display_name: None,
                    },
                )
            }),
        )
    }

    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = Some(fetched_at);
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn get(&self, code: &str) -> Option<&CurrencyEntry> {
        self.entries.get(&code.to_uppercase())
    }

    pub fn rate(&self, code: &str) -> Option<f64> {
        self.get(code).map(|e| e.conversion_rate)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    /// Known codes in sorted order.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CurrencyEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self::empty()
    }
}

pub fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

/// Anything that can produce a full rate table: the remote rate documents or
/// a map handed over by the host.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rates(&self) -> Result<RateTable>;
}
