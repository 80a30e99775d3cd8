use crate::core::rates::{CurrencyEntry, DEFAULT_BASE, RateSource, RateTable};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, error, instrument};

#[derive(Debug, Deserialize)]
struct FiatRatesResponse {
    base: Option<String>,
    rates: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct CryptoRate {
    symbol: String,
    name: Option<String>,
    current_price: f64,
}

/// Fetches the fiat and crypto rate documents and merges them into one
/// table. Crypto prices are quoted in the base currency, so they are
/// inverted to match the fiat "units per base" convention.
pub struct ArkRatesSource {
    fiat_rates_url: String,
    crypto_rates_url: String,
}

impl ArkRatesSource {
    pub fn new(fiat_rates_url: &str, crypto_rates_url: &str) -> Self {
        Self {
            fiat_rates_url: fiat_rates_url.to_string(),
            crypto_rates_url: crypto_rates_url.to_string(),
        }
    }

    async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
        debug!("Requesting rates from {}", url);
        let response = client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request failed for {url}"))?
            .error_for_status()
            .with_context(|| format!("Bad response status from {url}"))?;
        response
            .text()
            .await
            .context("Failed to get response text")
    }
}

fn parse_fiat_rates(text: &str) -> Result<FiatRatesResponse> {
    match serde_json::from_str(text) {
        Ok(data) => Ok(data),
        Err(e) => {
            error!(error = ?e, response = %text, "Failed to parse fiat rates");
            Err(e).context("Failed to parse fiat rates")
        }
    }
}

fn parse_crypto_rates(text: &str) -> Result<Vec<CryptoRate>> {
    match serde_json::from_str(text) {
        Ok(data) => Ok(data),
        Err(e) => {
            error!(error = ?e, response = %text, "Failed to parse crypto rates");
            Err(e).context("Failed to parse crypto rates")
        }
    }
}

fn merge(fiat: FiatRatesResponse, crypto: Vec<CryptoRate>) -> RateTable {
    let base = fiat.base.unwrap_or_else(|| DEFAULT_BASE.to_string());

    let fiat_entries = fiat.rates.into_iter().map(|(code, rate)| {
        (
            code,
            CurrencyEntry {
                conversion_rate: rate,
                display_name: None,
            },
        )
    });
    // Crypto last so it wins on a code collision. A zero price becomes an
    // infinite rate and is dropped by the table.
    let crypto_entries = crypto.into_iter().map(|coin| {
        (
            coin.symbol.to_uppercase(),
            CurrencyEntry {
                conversion_rate: 1.0 / coin.current_price,
                display_name: coin.name,
            },
        )
    });

    RateTable::from_entries(&base, fiat_entries.chain(crypto_entries))
}

#[async_trait]
impl RateSource for ArkRatesSource {
    #[instrument(name = "ArkRatesFetch", skip(self))]
    async fn fetch_rates(&self) -> Result<RateTable> {
        let client = reqwest::Client::builder().user_agent("xrate/0.1").build()?;
        let (fiat_text, crypto_text) = futures::try_join!(
            Self::fetch_text(&client, &self.fiat_rates_url),
            Self::fetch_text(&client, &self.crypto_rates_url),
        )?;

        let fiat = parse_fiat_rates(&fiat_text)?;
        let crypto = parse_crypto_rates(&crypto_text)?;
        debug!(
            fiat = fiat.rates.len(),
            crypto = crypto.len(),
            "Parsed rate documents"
        );

        let table = merge(fiat, crypto).with_fetched_at(Utc::now());
        if table.is_empty() {
            return Err(anyhow!("Rate source returned no usable rates"));
        }

        Ok(table)
    }
}
