use super::ui;
use crate::core::calculator::{ExchangeMap, TotalMap};
use crate::core::config::HoldingConfig;
use crate::core::groups::{self, PairRates, TagTotals};
use crate::core::{RateSource, RateTable, Session, StateError};
use anyhow::Result;
use comfy_table::Cell;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{debug, warn};

pub const NOTHING_TO_SHOW: &str = "Nothing to show. Add your assets to get started.";
pub const NO_RATES: &str = "No rate data available yet.";

/// Everything the summary command prints, in one serializable value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryReport {
    pub base: String,
    pub total: TotalMap,
    pub exchange: ExchangeMap,
    pub tags: TagTotals,
    pub pairs: PairRates,
    pub skipped: Vec<String>,
    pub unpriced_pairs: Vec<String>,
}

/// Fetches rates into a fresh session and applies the configured holdings.
/// Returns the codes that could not be applied. Without any rates nothing is
/// applied, so nothing is reported as skipped either.
pub async fn build_session(
    source: &dyn RateSource,
    holdings: &[HoldingConfig],
) -> (Session, Vec<String>) {
    let mut session = Session::new(RateTable::empty());

    let pb = ui::new_spinner("Fetching rates...");
    session.refresh(source).await;
    pb.finish_and_clear();

    if session.rates().is_empty() {
        debug!("No rates loaded, holdings left unapplied");
        return (session, Vec::new());
    }

    let skipped = apply_holdings(&mut session, holdings);
    (session, skipped)
}

/// Applies holdings to the session, one amount per code. Repeated codes are
/// summed first.
pub fn apply_holdings(session: &mut Session, holdings: &[HoldingConfig]) -> Vec<String> {
    let mut skipped = Vec::new();
    for (code, amount) in groups::aggregate_holdings(holdings) {
        match session.set_amount(&code, amount) {
            Ok(()) => debug!(code = %code, amount, "Holding applied"),
            Err(StateError::UnknownCurrency(code)) => {
                warn!(code = %code, "Skipping holding with unknown currency");
                skipped.push(code);
            }
            Err(e) => {
                warn!(error = %e, "Skipping invalid holding");
                skipped.push(code);
            }
        }
    }
    skipped
}

/// Derives every section of the report from an already populated session.
pub fn build_report(
    session: &Session,
    holdings: &[HoldingConfig],
    pairs: &[String],
    skipped: Vec<String>,
) -> Result<SummaryReport> {
    let derived = session.derive()?;
    let rates = session.rates();
    let tags = if derived.is_empty() {
        TagTotals::new()
    } else {
        groups::tag_totals(rates, holdings)?
    };
    let (pairs, unpriced_pairs) = if rates.is_empty() {
        (PairRates::new(), Vec::new())
    } else {
        groups::pair_rates(rates, pairs)
    };

    Ok(SummaryReport {
        base: rates.base().to_string(),
        total: derived.total,
        exchange: derived.exchange,
        tags,
        pairs,
        skipped,
        unpriced_pairs,
    })
}

fn rate_table(title: &str, key_header: &str, value_header: &str, rows: &BTreeMap<String, f64>) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell(key_header),
        ui::header_cell(value_header),
    ]);
    for (key, value) in rows {
        table.add_row(vec![Cell::new(key), ui::value_cell(*value)]);
    }
    format!(
        "\n{}\n\n{}\n",
        ui::style_text(title, ui::StyleType::Title),
        table
    )
}

/// Renders the Total, Exchange, tag and pair tables, or the placeholder when
/// nothing is selected.
pub fn render(report: &SummaryReport, rates: &RateTable) -> String {
    let mut output = String::new();

    if rates.is_empty() {
        output.push_str(&ui::style_text(NO_RATES, ui::StyleType::Error));
        output.push('\n');
    }

    if !report.skipped.is_empty() {
        output.push_str(&ui::style_text(
            &format!("Unknown currencies skipped: {}", report.skipped.join(", ")),
            ui::StyleType::Error,
        ));
        output.push('\n');
    }

    if !report.unpriced_pairs.is_empty() {
        output.push_str(&ui::style_text(
            &format!("Pairs without rates: {}", report.unpriced_pairs.join(", ")),
            ui::StyleType::Error,
        ));
        output.push('\n');
    }

    if report.total.is_empty() {
        output.push_str(NOTHING_TO_SHOW);
        if !report.pairs.is_empty() {
            output.push('\n');
            output.push_str(&rate_table("Pairs", "Pair", "Rate", &report.pairs));
        }
        return output;
    }

    output.push_str(rate_table("Total", "Currency", "Total", &report.total).trim_start());
    if !report.exchange.is_empty() {
        output.push_str(&rate_table("Exchange", "Pair", "Rate", &report.exchange));
    }
    if !report.tags.is_empty() {
        output.push_str(&rate_table(
            "By tag",
            "Tag",
            &format!("Value ({})", report.base),
            &report.tags,
        ));
    }
    if !report.pairs.is_empty() {
        output.push_str(&rate_table("Pairs", "Pair", "Rate", &report.pairs));
    }

    let fetched = rates
        .fetched_at()
        .map_or("unknown".to_string(), |at| at.format("%Y-%m-%d %H:%M UTC").to_string());
    output.push_str(&format!(
        "\n{}",
        ui::style_text(
            &format!("Base: {} | Rates as of {}", rates.base(), fetched),
            ui::StyleType::Subtle
        )
    ));

    output
}

pub async fn run(
    source: &dyn RateSource,
    holdings: &[HoldingConfig],
    pairs: &[String],
    json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let (session, skipped) = build_session(source, holdings).await;
    let report = build_report(&session, holdings, pairs, skipped)?;

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        writeln!(out, "{}", render(&report, session.rates()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    fn table() -> RateTable {
        RateTable::from_rates(
            "USD",
            vec![("USD".to_string(), 1.0), ("EUR".to_string(), 0.9)],
        )
        .with_fetched_at(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    struct FailingSource;

    #[async_trait]
    impl RateSource for FailingSource {
        async fn fetch_rates(&self) -> Result<RateTable> {
            Err(anyhow!("connection refused"))
        }
    }

    struct FixedSource;

    #[async_trait]
    impl RateSource for FixedSource {
        async fn fetch_rates(&self) -> Result<RateTable> {
            Ok(table())
        }
    }

    fn report_for(holdings: &[HoldingConfig], pairs: &[String]) -> (SummaryReport, Session) {
        let mut session = Session::new(table());
        let skipped = apply_holdings(&mut session, holdings);
        let report = build_report(&session, holdings, pairs, skipped).unwrap();
        (report, session)
    }

    #[test]
    fn test_render_placeholder() {
        let output = render(&SummaryReport::default(), &table());
        assert_eq!(output, NOTHING_TO_SHOW);
    }

    #[test]
    fn test_render_without_rates() {
        let output = render(&SummaryReport::default(), &RateTable::empty());
        assert!(output.contains(NO_RATES));
        assert!(output.contains(NOTHING_TO_SHOW));
    }

    #[test]
    fn test_render_tables() {
        let holdings = [
            HoldingConfig::new("USD", 100.0),
            HoldingConfig::new("EUR", 0.0),
            HoldingConfig::new("XYZ", 1.0),
        ];
        let (report, session) = report_for(&holdings, &[]);
        assert_eq!(report.skipped, vec!["XYZ".to_string()]);

        let output = render(&report, session.rates());

        assert!(output.contains("Total"));
        assert!(output.contains("Exchange"));
        assert!(output.contains("100.00000000"));
        assert!(output.contains("90.00000000"));
        assert!(output.contains("USD/EUR"));
        assert!(output.contains("1.11111111"));
        assert!(output.contains("XYZ"));
        assert!(output.contains("2024-05-01 12:00 UTC"));
        assert!(!output.contains(NOTHING_TO_SHOW));
    }

    #[test]
    fn test_render_single_currency_has_no_exchange() {
        let (report, session) = report_for(&[HoldingConfig::new("EUR", 3.5)], &[]);
        let output = render(&report, session.rates());
        assert!(output.contains("3.50000000"));
        assert!(!output.contains("Exchange"));
    }

    #[test]
    fn test_duplicate_holdings_are_summed() {
        let holdings = [
            HoldingConfig::new("EUR", 0.5),
            HoldingConfig::new("EUR", 0.25),
        ];
        let (report, session) = report_for(&holdings, &[]);
        assert_eq!(session.holdings().amount("EUR"), 0.75);
        assert_eq!(report.total["EUR"], 0.75);
    }

    #[test]
    fn test_tags_and_pairs_are_reported() {
        let holdings = [
            HoldingConfig::new("USD", 10.0).tagged("travel"),
            HoldingConfig::new("EUR", 9.0).tagged("travel"),
            HoldingConfig::new("USD", 5.0),
        ];
        let pairs = ["EUR/USD".to_string(), "EUR/GBP".to_string()];
        let (report, session) = report_for(&holdings, &pairs);

        assert!((report.tags["travel"] - 20.0).abs() < 1e-9);
        assert!((report.tags[groups::UNTAGGED] - 5.0).abs() < 1e-9);
        assert!((report.pairs["EUR/USD"] - 1.0 / 0.9).abs() < 1e-12);
        assert_eq!(report.unpriced_pairs, vec!["EUR/GBP".to_string()]);

        let output = render(&report, session.rates());
        assert!(output.contains("By tag"));
        assert!(output.contains("Value (USD)"));
        assert!(output.contains("travel"));
        assert!(output.contains("Untagged"));
        assert!(output.contains("Pairs without rates: EUR/GBP"));
    }

    #[tokio::test]
    async fn test_fetch_failure_reports_no_unknown_currencies() {
        let holdings = [HoldingConfig::new("USD", 1.0), HoldingConfig::new("BTC", 2.0)];
        let (session, skipped) = build_session(&FailingSource, &holdings).await;
        assert!(skipped.is_empty());
        assert!(session.holdings().is_empty());

        let mut out = Vec::new();
        run(&FailingSource, &holdings, &[], false, &mut out).await.unwrap();
        let output = String::from_utf8(out).unwrap();
        assert!(output.contains(NO_RATES));
        assert!(output.contains(NOTHING_TO_SHOW));
        assert!(!output.contains("Unknown currencies skipped"));
    }

    #[tokio::test]
    async fn test_run_writes_json_report() {
        let holdings = [HoldingConfig::new("USD", 10.0), HoldingConfig::new("EUR", 9.0)];
        let mut out = Vec::new();
        run(&FixedSource, &holdings, &["USD/EUR".to_string()], true, &mut out)
            .await
            .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["base"], "USD");
        assert!((value["total"]["USD"].as_f64().unwrap() - 20.0).abs() < 1e-9);
        assert!((value["pairs"]["USD/EUR"].as_f64().unwrap() - 0.9).abs() < 1e-12);
        assert!(value["skipped"].as_array().unwrap().is_empty());
    }
}
