//! Holdings grouped by tag and the extra cross pairs listed in the config.

use super::calculator::CalcError;
use super::config::HoldingConfig;
use super::rates::{RateTable, is_valid_rate};
use std::collections::BTreeMap;
use tracing::warn;

pub const UNTAGGED: &str = "Untagged";

/// Value of each tag group, in the table's base currency.
pub type TagTotals = BTreeMap<String, f64>;
pub type PairRates = BTreeMap<String, f64>;

/// Collapses repeated codes into one amount per code, keeping the order in
/// which codes first appear.
pub fn aggregate_holdings(holdings: &[HoldingConfig]) -> Vec<(String, f64)> {
    let mut merged: Vec<(String, f64)> = Vec::with_capacity(holdings.len());
    for holding in holdings {
        match merged.iter_mut().find(|(code, _)| *code == holding.code) {
            Some((_, amount)) => *amount += holding.amount,
            None => merged.push((holding.code.clone(), holding.amount)),
        }
    }
    merged
}

fn tag_of(holding: &HoldingConfig) -> &str {
    holding
        .tag
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNTAGGED)
}

/// Sums each holding's base-currency value under its tag. Holdings whose
/// code has no rate are left out.
pub fn tag_totals(rates: &RateTable, holdings: &[HoldingConfig]) -> Result<TagTotals, CalcError> {
    let mut totals = TagTotals::new();
    for holding in holdings {
        let Some(rate) = rates.rate(&holding.code) else {
            continue;
        };
        *totals.entry(tag_of(holding).to_string()).or_insert(0.0) += holding.amount / rate;
    }

    if let Some((tag, _)) = totals.iter().find(|(_, value)| !value.is_finite()) {
        return Err(CalcError::OutOfRange { key: tag.clone() });
    }
    Ok(totals)
}

/// Cross rate for each `A/B` entry, read like the exchange map: units of `B`
/// per one `A`. Returns the priced pairs and the ones that could not be
/// priced.
pub fn pair_rates(rates: &RateTable, pairs: &[String]) -> (PairRates, Vec<String>) {
    let mut priced = PairRates::new();
    let mut unpriced = Vec::new();

    for pair in pairs {
        let rate = pair
            .split_once('/')
            .and_then(|(from, to)| Some((rates.rate(from.trim())?, rates.rate(to.trim())?)))
            .map(|(from, to)| to / from)
            .filter(|rate| is_valid_rate(*rate));
        match rate {
            Some(rate) => {
                priced.insert(pair.clone(), rate);
            }
            None => {
                warn!(pair = %pair, "Cannot price configured pair");
                unpriced.push(pair.clone());
            }
        }
    }

    (priced, unpriced)
}
