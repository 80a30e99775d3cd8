use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Deserializer, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_FIAT_RATES_URL: &str =
    "https://raw.githubusercontent.com/ARK-Builders/ark-exchange-rates/main/fiat-rates.json";
pub const DEFAULT_CRYPTO_RATES_URL: &str =
    "https://raw.githubusercontent.com/ARK-Builders/ark-exchange-rates/main/crypto-rates.json";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HoldingConfig {
    #[serde(deserialize_with = "uppercase")]
    pub code: String,
    #[serde(default)]
    pub amount: f64,
    /// Group the holding is reported under; untagged holdings share one group.
    pub tag: Option<String>,
}

impl HoldingConfig {
    pub fn new(code: &str, amount: f64) -> Self {
        Self {
            code: code.to_uppercase(),
            amount,
            tag: None,
        }
    }

    pub fn tagged(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }
}

fn uppercase<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let code = String::deserialize(deserializer)?;
    Ok(code.trim().to_uppercase())
}

fn uppercase_all<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let pairs = Vec::<String>::deserialize(deserializer)?;
    Ok(pairs.iter().map(|p| p.trim().to_uppercase()).collect())
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ArkProviderConfig {
    #[serde(default = "default_fiat_rates_url")]
    pub fiat_rates_url: String,
    #[serde(default = "default_crypto_rates_url")]
    pub crypto_rates_url: String,
}

fn default_fiat_rates_url() -> String {
    DEFAULT_FIAT_RATES_URL.to_string()
}

fn default_crypto_rates_url() -> String {
    DEFAULT_CRYPTO_RATES_URL.to_string()
}

impl Default for ArkProviderConfig {
    fn default() -> Self {
        ArkProviderConfig {
            fiat_rates_url: default_fiat_rates_url(),
            crypto_rates_url: default_crypto_rates_url(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FileProviderConfig {
    pub path: String,
    pub base: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    pub ark: Option<ArkProviderConfig>,
    pub file: Option<FileProviderConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub holdings: Vec<HoldingConfig>,
    /// Extra `A/B` cross rates to show regardless of the selection.
    #[serde(default, deserialize_with = "uppercase_all")]
    pub pairs: Vec<String>,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "xrate", "xrate")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
holdings:
  - code: "usd"
    amount: 100.0
  - code: BTC
    amount: 0.25
  - code: eur
    tag: savings
pairs:
  - btc/eur
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.holdings.len(), 3);
        assert_eq!(
            config.holdings[0],
            HoldingConfig::new("USD", 100.0)
        );
        assert_eq!(config.holdings[1].code, "BTC");
        assert_eq!(config.holdings[1].amount, 0.25);
        assert_eq!(config.holdings[2].code, "EUR");
        assert_eq!(config.holdings[2].amount, 0.0);
        assert_eq!(config.holdings[2].tag.as_deref(), Some("savings"));
        assert_eq!(config.pairs, vec!["BTC/EUR".to_string()]);
        assert!(config.providers.ark.is_none());
        assert!(config.providers.file.is_none());
    }

    #[test]
    fn test_config_with_providers() {
        let yaml_str = r#"
holdings: []
providers:
  ark:
    fiat_rates_url: "http://example.com/fiat.json"
  file:
    path: "/tmp/rates.json"
    base: "EUR"
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        let ark = config.providers.ark.unwrap();
        assert_eq!(ark.fiat_rates_url, "http://example.com/fiat.json");
        assert_eq!(ark.crypto_rates_url, DEFAULT_CRYPTO_RATES_URL);

        let file = config.providers.file.unwrap();
        assert_eq!(file.path, "/tmp/rates.json");
        assert_eq!(file.base.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_empty_config() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.holdings.is_empty());
        assert!(config.pairs.is_empty());
    }
}
