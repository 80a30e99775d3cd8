pub mod ark;
pub mod file;

use crate::core::config::ProvidersConfig;
use crate::core::rates::RateSource;

/// Picks the configured rate source. A file source, when configured, takes
/// precedence over the network documents.
pub fn rate_source_from_config(providers: &ProvidersConfig) -> Box<dyn RateSource> {
    if let Some(file) = &providers.file {
        return Box::new(file::FileRateSource::new(&file.path, file.base.as_deref()));
    }

    let ark = providers.ark.clone().unwrap_or_default();
    Box::new(ark::ArkRatesSource::new(
        &ark.fiat_rates_url,
        &ark.crypto_rates_url,
    ))
}
