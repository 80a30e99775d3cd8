use super::ui;
use crate::core::{RateSource, RateTable, search};
use anyhow::Result;
use comfy_table::Cell;
use std::io::Write;
use tracing::error;

pub fn render(table: &RateTable, query: &str) -> String {
    let hits = search::search(table, query);
    if hits.is_empty() {
        return ui::style_text(
            &format!("No currencies match '{query}'."),
            ui::StyleType::Subtle,
        );
    }

    let mut output = ui::new_styled_table();
    output.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Name"),
        ui::header_cell(&format!("Per 1 {}", table.base())),
    ]);
    for (code, entry) in hits {
        output.add_row(vec![
            Cell::new(code),
            ui::format_optional_cell(entry.display_name.as_deref(), str::to_string),
            ui::value_cell(entry.conversion_rate),
        ]);
    }
    output.to_string()
}

pub async fn run(source: &dyn RateSource, query: &str, out: &mut dyn Write) -> Result<()> {
    let pb = ui::new_spinner("Fetching rates...");
    let table = match source.fetch_rates().await {
        Ok(table) => table,
        Err(e) => {
            error!(error = %e, "Problem with fetching currency data");
            RateTable::empty()
        }
    };
    pb.finish_and_clear();

    if table.is_empty() {
        writeln!(
            out,
            "{}",
            ui::style_text(super::summary::NO_RATES, ui::StyleType::Error)
        )?;
        return Ok(());
    }

    writeln!(out, "{}", render(&table, query))?;
    Ok(())
}
