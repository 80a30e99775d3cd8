//! Application state: the rate table and the user's holdings, kept as
//! separate immutable snapshots and swapped as a whole on every change.

use super::calculator::{
    CalcError, Calculator, ExchangeMap, LocalCalculator, SelectedCurrency, Selection, TotalMap,
};
use super::rates::{RateSource, RateTable};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error, PartialEq)]
pub enum StateError {
    #[error("unknown currency: {0}")]
    UnknownCurrency(String),
    #[error("currency {0} is not selected")]
    NotSelected(String),
    #[error("invalid amount for {code}: {amount}")]
    InvalidAmount { code: String, amount: f64 },
}

/// Selected currencies and the amount held of each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Holdings {
    amounts: BTreeMap<String, f64>,
}

impl Holdings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_selected(&self, code: &str) -> bool {
        self.amounts.contains_key(&code.to_uppercase())
    }

    /// Held amount; deselected codes always report zero.
    pub fn amount(&self, code: &str) -> f64 {
        self.amounts
            .get(&code.to_uppercase())
            .copied()
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.amounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    fn with_selected(&self, code: String) -> Self {
        let mut next = self.clone();
        next.amounts.entry(code).or_insert(0.0);
        next
    }

    fn with_amount(&self, code: String, amount: f64) -> Self {
        let mut next = self.clone();
        next.amounts.insert(code, amount);
        next
    }

    fn without(&self, code: &str) -> Self {
        let mut next = self.clone();
        next.amounts.remove(code);
        next
    }
}

/// Maps derived from the current state; never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedTotals {
    pub total: TotalMap,
    pub exchange: ExchangeMap,
}

impl DerivedTotals {
    pub fn is_empty(&self) -> bool {
        self.total.is_empty()
    }
}

/// A versioned, immutable view of everything the summary depends on.
#[derive(Debug, Clone)]
pub struct AppState {
    pub version: u64,
    pub rates: Arc<RateTable>,
    pub holdings: Arc<Holdings>,
}

impl AppState {
    pub fn new(rates: RateTable) -> Self {
        Self {
            version: 0,
            rates: Arc::new(rates),
            holdings: Arc::new(Holdings::new()),
        }
    }

    fn next(&self, rates: Arc<RateTable>, holdings: Arc<Holdings>) -> Self {
        Self {
            version: self.version + 1,
            rates,
            holdings,
        }
    }

    /// Selected holdings joined with their rates. Codes missing from the
    /// rate table are left out.
    pub fn selection(&self) -> Selection {
        self.holdings
            .amounts
            .iter()
            .filter_map(|(code, amount)| {
                self.rates
                    .rate(code)
                    .map(|rate| (code.clone(), SelectedCurrency::new(rate, *amount)))
            })
            .collect()
    }

    pub fn derive(&self, calculator: &dyn Calculator) -> Result<DerivedTotals, CalcError> {
        let selected = self.selection();
        Ok(DerivedTotals {
            total: calculator.compute_totals(&selected)?,
            exchange: calculator.compute_exchange_rates(&selected)?,
        })
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(RateTable::empty())
    }
}

/// Owns the current `AppState` and replaces it on each mutation.
pub struct Session {
    state: AppState,
    calculator: Box<dyn Calculator>,
}

impl Session {
    pub fn new(rates: RateTable) -> Self {
        Self::with_calculator(rates, Box::new(LocalCalculator))
    }

    pub fn with_calculator(rates: RateTable, calculator: Box<dyn Calculator>) -> Self {
        Self {
            state: AppState::new(rates),
            calculator,
        }
    }

    /// Current snapshot. Cloning it is cheap and it never changes underneath
    /// the caller.
    pub fn snapshot(&self) -> AppState {
        self.state.clone()
    }

    pub fn version(&self) -> u64 {
        self.state.version
    }

    pub fn rates(&self) -> &RateTable {
        &self.state.rates
    }

    pub fn holdings(&self) -> &Holdings {
        &self.state.holdings
    }

    /// Fetches a fresh table from `source`. On failure the previous table
    /// stays in place and the error is only logged.
    pub async fn refresh(&mut self, source: &dyn RateSource) -> bool {
        match source.fetch_rates().await {
            Ok(table) => {
                info!(currencies = table.len(), "Rate table updated");
                self.replace_rates(table);
                true
            }
            Err(e) => {
                error!(error = %e, "Problem with fetching currency data");
                false
            }
        }
    }

    pub fn replace_rates(&mut self, rates: RateTable) {
        self.state = self
            .state
            .next(Arc::new(rates), Arc::clone(&self.state.holdings));
    }

    pub fn select(&mut self, code: &str) -> Result<(), StateError> {
        let code = self.known_code(code)?;
        let holdings = self.state.holdings.with_selected(code);
        self.swap_holdings(holdings);
        Ok(())
    }

    /// Removes `code` from the selection; its amount goes back to zero.
    pub fn deselect(&mut self, code: &str) -> Result<(), StateError> {
        let code = code.trim().to_uppercase();
        if !self.state.holdings.is_selected(&code) {
            return Err(StateError::NotSelected(code));
        }
        let holdings = self.state.holdings.without(&code);
        self.swap_holdings(holdings);
        Ok(())
    }

    /// Sets the held amount, selecting the currency if needed.
    pub fn set_amount(&mut self, code: &str, amount: f64) -> Result<(), StateError> {
        let code = self.known_code(code)?;
        if !amount.is_finite() {
            return Err(StateError::InvalidAmount { code, amount });
        }
        let holdings = self.state.holdings.with_amount(code, amount);
        self.swap_holdings(holdings);
        Ok(())
    }

    pub fn derive(&self) -> Result<DerivedTotals, CalcError> {
        self.state.derive(self.calculator.as_ref())
    }

    fn known_code(&self, code: &str) -> Result<String, StateError> {
        let code = code.trim().to_uppercase();
        if self.state.rates.contains(&code) {
            Ok(code)
        } else {
            Err(StateError::UnknownCurrency(code))
        }
    }

    fn swap_holdings(&mut self, holdings: Holdings) {
        self.state = self
            .state
            .next(Arc::clone(&self.state.rates), Arc::new(holdings));
        debug!(version = self.state.version, "Holdings updated");
    }
}
