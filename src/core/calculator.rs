//! Cross rate and total computation over the selected currencies.
//!
//! Every rate is "units of currency per base unit", so converting an amount
//! held in `o` into `c` multiplies by `rate[c] / rate[o]`, and the exchange
//! entry keyed `"c/o"` is `rate[o] / rate[c]`.

use super::rates::is_valid_rate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CalcError {
    #[error("conversion rate for {code} is zero")]
    DivisionByZero { code: String },
    #[error("conversion rate for {code} is invalid: {rate}")]
    InvalidRate { code: String, rate: f64 },
    #[error("{key} is out of the representable range")]
    OutOfRange { key: String },
}

/// One member of the selected set, as handed to a calculator.
///
/// Field names also accept the camelCase shape used by host bridges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "camelCase"))]
pub struct SelectedCurrency {
    pub conversion_rate: f64,
    #[serde(default, alias = "existingAmount")]
    pub held_amount: Option<f64>,
    #[serde(default = "default_selected", alias = "isSelected")]
    pub selected: bool,
}

fn default_selected() -> bool {
    true
}

impl SelectedCurrency {
    pub fn new(conversion_rate: f64, held_amount: f64) -> Self {
        Self {
            conversion_rate,
            held_amount: Some(held_amount),
            selected: true,
        }
    }

    fn amount(&self) -> f64 {
        self.held_amount.unwrap_or(0.0)
    }
}

pub type Selection = BTreeMap<String, SelectedCurrency>;
pub type TotalMap = BTreeMap<String, f64>;
pub type ExchangeMap = BTreeMap<String, f64>;

/// Backend answering the two summary questions. The local implementation
/// computes in-process; other implementations may delegate elsewhere.
pub trait Calculator: Send + Sync {
    fn compute_totals(&self, selected: &Selection) -> Result<TotalMap, CalcError>;
    fn compute_exchange_rates(&self, selected: &Selection) -> Result<ExchangeMap, CalcError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalCalculator;

impl Calculator for LocalCalculator {
    fn compute_totals(&self, selected: &Selection) -> Result<TotalMap, CalcError> {
        calculate_totals(selected)
    }

    fn compute_exchange_rates(&self, selected: &Selection) -> Result<ExchangeMap, CalcError> {
        calculate_exchange_rates(selected)
    }
}

fn participants(selected: &Selection) -> Result<Vec<(&str, &SelectedCurrency)>, CalcError> {
    let mut out = Vec::with_capacity(selected.len());
    for (code, currency) in selected.iter().filter(|(_, c)| c.selected) {
        let rate = currency.conversion_rate;
        if rate == 0.0 {
            return Err(CalcError::DivisionByZero { code: code.clone() });
        }
        if !is_valid_rate(rate) {
            return Err(CalcError::InvalidRate {
                code: code.clone(),
                rate,
            });
        }
        out.push((code.as_str(), currency));
    }
    Ok(out)
}

/// Total of all selected holdings, expressed in each selected currency.
pub fn calculate_totals(selected: &Selection) -> Result<TotalMap, CalcError> {
    let currencies = participants(selected)?;
    let mut total = TotalMap::new();

    for (code, currency) in &currencies {
        let converted: f64 = currencies
            .iter()
            .filter(|(other_code, _)| other_code != code)
            .map(|(_, other)| {
                other.amount() * (currency.conversion_rate / other.conversion_rate)
            })
            .sum();
        let value = currency.amount() + converted;
        if !value.is_finite() {
            return Err(CalcError::OutOfRange {
                key: code.to_string(),
            });
        }
        total.insert(code.to_string(), value);
    }

    Ok(total)
}

/// Pairwise exchange rates between all selected currencies.
pub fn calculate_exchange_rates(selected: &Selection) -> Result<ExchangeMap, CalcError> {
    let currencies = participants(selected)?;
    let mut exchange = ExchangeMap::new();

    for (code, currency) in &currencies {
        for (other_code, other) in &currencies {
            if code == other_code {
                continue;
            }
            let key = format!("{code}/{other_code}");
            let rate = other.conversion_rate / currency.conversion_rate;
            // Both rates are positive, so zero here means underflow.
            if !is_valid_rate(rate) {
                return Err(CalcError::OutOfRange { key });
            }
            exchange.insert(key, rate);
        }
    }

    Ok(exchange)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn selection(items: &[(&str, f64, f64)]) -> Selection {
        items
            .iter()
            .map(|(code, rate, amount)| (code.to_string(), SelectedCurrency::new(*rate, *amount)))
            .collect()
    }

    #[test]
    fn test_usd_eur_totals_and_exchange() {
        let selected = selection(&[("USD", 1.0, 100.0), ("EUR", 0.9, 0.0)]);

        let total = calculate_totals(&selected).unwrap();
        assert!((total["USD"] - 100.0).abs() < EPSILON);
        assert!((total["EUR"] - 90.0).abs() < EPSILON);

        let exchange = calculate_exchange_rates(&selected).unwrap();
        assert_eq!(exchange.len(), 2);
        assert!((exchange["EUR/USD"] - 1.0 / 0.9).abs() < EPSILON);
        assert!((exchange["USD/EUR"] - 0.9).abs() < EPSILON);
    }

    #[test]
    fn test_usd_inr_totals() {
        let selected = selection(&[("USD", 1.0, 2.0), ("INR", 0.01, 10.0)]);

        let total = calculate_totals(&selected).unwrap();
        assert!((total["USD"] - 1002.0).abs() < 1e-6);
        assert!((total["INR"] - 10.02).abs() < 1e-9);

        let exchange = calculate_exchange_rates(&selected).unwrap();
        assert!((exchange["INR/USD"] - 100.0).abs() < 1e-9);
        assert!((exchange["USD/INR"] - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_exchange_rates_are_reciprocal() {
        let selected = selection(&[
            ("USD", 1.0, 5.0),
            ("EUR", 0.92, 1.0),
            ("JPY", 151.3, 0.0),
            ("BTC", 1.0 / 64000.0, 0.1),
        ]);
        let exchange = calculate_exchange_rates(&selected).unwrap();
        assert_eq!(exchange.len(), 12);

        for c in selected.keys() {
            for o in selected.keys().filter(|o| *o != c) {
                let forward = exchange[&format!("{c}/{o}")];
                let backward = exchange[&format!("{o}/{c}")];
                assert!((forward * backward - 1.0).abs() < EPSILON, "{c}/{o}");
            }
        }
    }

    #[test]
    fn test_totals_agree_across_currencies() {
        let selected = selection(&[("USD", 1.0, 50.0), ("EUR", 0.8, 40.0), ("GBP", 0.5, 10.0)]);
        let total = calculate_totals(&selected).unwrap();
        let exchange = calculate_exchange_rates(&selected).unwrap();

        // Converting the USD total into EUR must give the EUR total.
        let eur_from_usd = total["USD"] / exchange["EUR/USD"];
        assert!((eur_from_usd - total["EUR"]).abs() < 1e-9);
    }

    #[test]
    fn test_single_currency() {
        let selected = selection(&[("CHF", 0.88, 42.5)]);
        let total = calculate_totals(&selected).unwrap();
        assert_eq!(total.len(), 1);
        assert_eq!(total["CHF"], 42.5);
        assert!(calculate_exchange_rates(&selected).unwrap().is_empty());
    }

    #[test]
    fn test_empty_selection() {
        let selected = Selection::new();
        assert!(calculate_totals(&selected).unwrap().is_empty());
        assert!(calculate_exchange_rates(&selected).unwrap().is_empty());
    }

    #[test]
    fn test_missing_amount_counts_as_zero() {
        let mut selected = selection(&[("USD", 1.0, 10.0)]);
        selected.insert(
            "EUR".to_string(),
            SelectedCurrency {
                conversion_rate: 0.5,
                held_amount: None,
                selected: true,
            },
        );
        let total = calculate_totals(&selected).unwrap();
        assert_eq!(total["EUR"], 5.0);
        assert_eq!(total["USD"], 10.0);
    }

    #[test]
    fn test_unselected_entries_are_ignored() {
        let mut selected = selection(&[("USD", 1.0, 10.0)]);
        selected.insert(
            "EUR".to_string(),
            SelectedCurrency {
                conversion_rate: 0.5,
                held_amount: Some(100.0),
                selected: false,
            },
        );
        let total = calculate_totals(&selected).unwrap();
        assert_eq!(total.len(), 1);
        assert_eq!(total["USD"], 10.0);
        assert!(calculate_exchange_rates(&selected).unwrap().is_empty());
    }

    #[test]
    fn test_zero_rate_fails() {
        let selected = selection(&[("USD", 1.0, 10.0), ("BAD", 0.0, 1.0)]);
        assert_eq!(
            calculate_totals(&selected),
            Err(CalcError::DivisionByZero {
                code: "BAD".to_string()
            })
        );
        assert!(calculate_exchange_rates(&selected).is_err());
    }

    #[test]
    fn test_negative_rate_fails() {
        let selected = selection(&[("NEG", -1.0, 1.0)]);
        assert!(matches!(
            calculate_totals(&selected),
            Err(CalcError::InvalidRate { .. })
        ));
    }

    #[test]
    fn test_extreme_rates_fail_instead_of_overflowing() {
        let selected = selection(&[("BIG", 1e200, 1.0), ("TINY", 1e-200, 1.0)]);
        assert_eq!(
            calculate_totals(&selected),
            Err(CalcError::OutOfRange {
                key: "BIG".to_string()
            })
        );
        assert!(matches!(
            calculate_exchange_rates(&selected),
            Err(CalcError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_large_amount_overflow_fails() {
        let selected = selection(&[("USD", 1.0, f64::MAX), ("EUR", 0.5, f64::MAX)]);
        assert!(matches!(
            calculate_totals(&selected),
            Err(CalcError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_recomputation_is_idempotent() {
        let selected = selection(&[("USD", 1.0, 3.0), ("EUR", 0.9, 7.0), ("BTC", 0.00002, 0.5)]);
        let calc = LocalCalculator;
        assert_eq!(
            calc.compute_totals(&selected).unwrap(),
            calc.compute_totals(&selected).unwrap()
        );
        assert_eq!(
            calc.compute_exchange_rates(&selected).unwrap(),
            calc.compute_exchange_rates(&selected).unwrap()
        );
    }

    #[test]
    fn test_bridge_shape_deserializes() {
        let json = r#"{
            "USD": {"conversionRate": 1.0, "existingAmount": 2.0, "isSelected": true},
            "INR": {"conversionRate": 0.01, "isSelected": true}
        }"#;
        let selected: Selection = serde_json::from_str(json).unwrap();
        assert_eq!(selected["USD"].held_amount, Some(2.0));
        assert_eq!(selected["INR"].held_amount, None);

        let total = calculate_totals(&selected).unwrap();
        assert!((total["INR"] - 0.02).abs() < 1e-12);
    }
}
