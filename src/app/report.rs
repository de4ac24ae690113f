use crate::core::delivery::DeliveryPlan;
use crate::core::engine::BulkResult;
use crate::core::possession::PossessionTable;
use crate::domain::model::AllocationPlan;
use crate::domain::ports::Storage;
use crate::utils::error::{BulkError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::io::Write;
use zip::write::{FileOptions, ZipWriter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Tsv,
    Json,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Csv, OutputFormat::Tsv, OutputFormat::Json];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "csv" => Some(OutputFormat::Csv),
            "tsv" => Some(OutputFormat::Tsv),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Json => "json",
        }
    }
}

fn format_price(price: f64) -> String {
    format!("{:.2}", price)
}

/// Left-aligned text grid; the first row is the header.
fn render_grid(rows: &[Vec<String>]) -> String {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0; columns];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for (n, row) in rows.iter().enumerate() {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
        if n == 0 {
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            out.push_str(&rule.join("  "));
            out.push('\n');
        }
    }
    out
}

/// One row per lot, items in name order, with the plan cost as footer.
pub fn render_plan(plan: &AllocationPlan) -> String {
    let mut rows = vec![vec![
        "Item".to_string(),
        "Qty".to_string(),
        "Price".to_string(),
        "Seller".to_string(),
    ]];
    for (item, lots) in plan.iter() {
        for lot in lots {
            rows.push(vec![
                item.clone(),
                lot.quantity.to_string(),
                format!("{}{}", format_price(lot.price), lot.currency),
                lot.seller.clone(),
            ]);
        }
    }

    let mut out = render_grid(&rows);
    out.push_str(&format!("Total: {}\n", format_price(plan.total_cost())));
    out
}

pub fn render_delivery(delivery: &DeliveryPlan) -> String {
    let mut out = render_plan(&delivery.plan);
    out.push_str(&format!(
        "Sellers ({}): {}\n",
        delivery.sellers.len(),
        delivery.sellers.join(", ")
    ));
    out.push_str(&format!("Items: {}\n", format_price(delivery.item_cost)));
    out.push_str(&format!("Delivery: {}\n", format_price(delivery.delivery_cost)));
    out.push_str(&format!("Grand total: {}\n", format_price(delivery.total_cost)));
    out.push_str(&format!(
        "Search: {} ({}, {} nodes)\n",
        delivery.strategy,
        if delivery.optimal { "optimal" } else { "best found" },
        delivery.nodes_explored
    ));
    out
}

fn possession_rows(table: &PossessionTable, absent: &str) -> Vec<Vec<String>> {
    let mut header = vec!["Item".to_string()];
    header.extend(table.sellers.iter().cloned());
    header.push("Sellers".to_string());

    let mut rows = vec![header];
    for (y, item) in table.items.iter().enumerate() {
        let mut row = vec![item.clone()];
        row.extend(
            table.prices[y]
                .iter()
                .map(|p| p.map(format_price).unwrap_or_else(|| absent.to_string())),
        );
        row.push(table.item_seller_counts[y].to_string());
        rows.push(row);
    }

    let mut totals = vec!["Total".to_string()];
    totals.extend(table.seller_price_totals.iter().map(|t| format_price(*t)));
    rows.push(totals);

    let mut counts = vec!["Items".to_string()];
    counts.extend(table.seller_item_counts.iter().map(usize::to_string));
    rows.push(counts);
    rows
}

/// Absent cells print as `-`.
pub fn render_possession_text(table: &PossessionTable) -> String {
    render_grid(&possession_rows(table, "-"))
}

/// Absent cells are empty fields.
pub fn possession_to_delimited(table: &PossessionTable, delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_writer(Vec::new());
    for row in possession_rows(table, "") {
        writer.write_record(&row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| BulkError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| BulkError::Internal {
        message: format!("report is not valid UTF-8: {}", e),
    })
}

#[derive(Serialize)]
struct ResultEnvelope<'a> {
    generated_at: String,
    #[serde(flatten)]
    result: &'a BulkResult,
}

/// Zip archive with `matrix.csv`, `matrix.tsv` and `result.json`, limited to
/// the requested formats.
pub fn build_bundle(
    result: &BulkResult,
    formats: &[OutputFormat],
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>> {
    let table = result.possession_table();
    let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

    for format in OutputFormat::ALL {
        if !formats.contains(&format) {
            continue;
        }
        match format {
            OutputFormat::Csv => {
                zip.start_file::<_, ()>("matrix.csv", FileOptions::default())?;
                zip.write_all(possession_to_delimited(&table, b',')?.as_bytes())?;
            }
            OutputFormat::Tsv => {
                zip.start_file::<_, ()>("matrix.tsv", FileOptions::default())?;
                zip.write_all(possession_to_delimited(&table, b'\t')?.as_bytes())?;
            }
            OutputFormat::Json => {
                let envelope = ResultEnvelope {
                    generated_at: generated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                    result,
                };
                zip.start_file::<_, ()>("result.json", FileOptions::default())?;
                zip.write_all(serde_json::to_string_pretty(&envelope)?.as_bytes())?;
            }
        }
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Writes the report bundle through a storage backend.
pub struct ReportWriter<S: Storage> {
    storage: S,
    bundle_name: String,
    formats: Vec<OutputFormat>,
}

impl<S: Storage> ReportWriter<S> {
    pub fn new(storage: S, bundle_name: impl Into<String>, formats: Vec<OutputFormat>) -> Self {
        Self {
            storage,
            bundle_name: bundle_name.into(),
            formats,
        }
    }

    /// Returns the bundle path relative to the storage root.
    pub async fn write(&self, result: &BulkResult) -> Result<String> {
        let data = build_bundle(result, &self.formats, Utc::now())?;
        tracing::debug!(
            bundle = %self.bundle_name,
            bytes = data.len(),
            "writing report bundle"
        );
        self.storage.write_file(&self.bundle_name, &data).await?;
        Ok(self.bundle_name.clone())
    }
}
