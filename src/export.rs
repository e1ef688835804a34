//! Tabular flattening and JSON / CSV export of scrape results.

use serde_json::Value;

use crate::error::Result;
use crate::extraction::{Extraction, Record};
use crate::pagination::PaginationData;
use crate::worker::BatchReport;

pub const PAGE_URLS_COLUMN: &str = "Page URLs";

/// Records flattened to rows. Requested fields come first, then any extra keys
/// the model returned, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn from_records<'a, I>(records: I, fields: &[String]) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let records: Vec<&Record> = records.into_iter().collect();

        let mut columns: Vec<String> = fields.to_vec();
        for record in &records {
            for key in record.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|col| record.get(col).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Display form of a cell: strings unquoted, null empty, everything else as JSON.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn push_row<'a>(out: &mut String, cells: impl IntoIterator<Item = &'a str>) {
    let mut first = true;
    for cell in cells {
        if !first {
            out.push(',');
        }
        first = false;
        if needs_quotes(cell) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push('\n');
}

pub fn table_to_csv(table: &Table) -> String {
    let mut out = String::new();
    push_row(&mut out, table.columns.iter().map(String::as_str));
    for row in &table.rows {
        let cells: Vec<String> = row.iter().map(cell_text).collect();
        push_row(&mut out, cells.iter().map(String::as_str));
    }
    out
}

/// Every listing of every successfully extracted URL in one table.
pub fn combined_table(report: &BatchReport) -> Table {
    let records = report
        .pages
        .iter()
        .flatten()
        .filter_map(|page| page.extraction.as_ref().and_then(Extraction::listings))
        .flat_map(|listings| listings.listings.iter());
    Table::from_records(records, &report.fields)
}

pub fn batch_csv(report: &BatchReport) -> String {
    table_to_csv(&combined_table(report))
}

/// Per-URL extraction results as a JSON array; failed URLs are `null`.
pub fn batch_json(report: &BatchReport) -> Result<String> {
    let data: Vec<Option<&Extraction>> = report
        .pages
        .iter()
        .map(|page| page.as_ref().and_then(|p| p.extraction.as_ref()))
        .collect();
    Ok(serde_json::to_string_pretty(&data)?)
}

pub fn pagination_json(data: &PaginationData) -> Result<String> {
    Ok(serde_json::to_string_pretty(&data.page_urls)?)
}

pub fn pagination_csv(data: &PaginationData) -> String {
    let mut out = String::new();
    push_row(&mut out, [PAGE_URLS_COLUMN]);
    for url in &data.page_urls {
        push_row(&mut out, [url.as_str()]);
    }
    out
}
