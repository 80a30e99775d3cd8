//! Currency lookup by code.

use super::rates::{CurrencyEntry, RateTable};

/// Codes containing `query`, case-insensitively. An empty query matches
/// everything. The query is used as given, so surrounding spaces must match
/// too. Results keep the input order.
pub fn filter_codes<'a, I>(codes: I, query: &str) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let needle = query.to_lowercase();
    codes
        .into_iter()
        .filter(|code| code.to_lowercase().contains(&needle))
        .collect()
}

/// Entries whose code passes [`filter_codes`] or whose display name
/// contains `query`.
pub fn search<'a>(table: &'a RateTable, query: &str) -> Vec<(&'a str, &'a CurrencyEntry)> {
    let by_code = filter_codes(table.codes(), query);
    let needle = query.to_lowercase();
    table
        .iter()
        .filter(|(code, entry)| {
            by_code.contains(code)
                || entry
                    .display_name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
        })
        .collect()
}
