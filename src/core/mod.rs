//! Core business logic: rates, holdings and the cross rate computation

pub mod calculator;
pub mod config;
pub mod groups;
pub mod log;
pub mod rates;
pub mod search;
pub mod state;

// Re-export main types for cleaner imports
pub use calculator::{CalcError, Calculator, LocalCalculator, SelectedCurrency, Selection};
pub use rates::{CurrencyEntry, RateSource, RateTable};
pub use state::{AppState, DerivedTotals, Holdings, Session, StateError};
