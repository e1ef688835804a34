use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_xlsxwriter::Workbook;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::Result;
use crate::export::{cell_text, Table};
use crate::extraction::Listings;

static LEADING_WWW: Lazy<Regex> = Lazy::new(|| Regex::new(r"^www\.").expect("static regex"));
/// Longest string Excel accepts in a single cell.
const XLSX_MAX_CELL_CHARS: usize = 32_767;

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("static regex"));

/// `<domain>_<YYYY_MM_DD__HH_MM_SS>` for the run that starts with `url`.
pub fn run_folder_name(url: &str, at: NaiveDateTime) -> String {
    let domain = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.host_str().unwrap_or_default().to_string(),
        Err(_) => url.split('/').next().unwrap_or_default().to_string(),
    };
    let domain = LEADING_WWW.replace(&domain, "");
    let domain = NON_WORD.replace_all(&domain, "_");
    format!("{}_{}", domain, at.format("%Y_%m_%d__%H_%M_%S"))
}

/// Flat-file output for one run: raw page text, parsed JSON and a spreadsheet per URL.
#[derive(Debug, Clone)]
pub struct StorageManager {
    run_dir: PathBuf,
}

impl StorageManager {
    /// Create (if absent) the per-run folder under `root`.
    pub fn for_run(root: &Path, first_url: &str, at: NaiveDateTime) -> Result<Self> {
        let run_dir = root.join(run_folder_name(first_url, at));
        fs::create_dir_all(&run_dir)?;
        Ok(Self { run_dir })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// `rawData_<n>.md`
    pub fn store_raw(&self, n: usize, text: &str) -> Result<PathBuf> {
        let path = self.run_dir.join(format!("rawData_{}.md", n));
        fs::write(&path, text)?;
        info!("Raw data saved to {}", path.display());
        Ok(path)
    }

    /// `sorted_data_<n>.json` and `sorted_data_<n>.xlsx`. The spreadsheet is
    /// best effort: when it cannot be written the JSON still stands and the
    /// xlsx path is `None`.
    pub fn store_listings(
        &self,
        n: usize,
        listings: &Listings,
        fields: &[String],
    ) -> Result<(PathBuf, Option<PathBuf>)> {
        let json_path = self.run_dir.join(format!("sorted_data_{}.json", n));
        fs::write(&json_path, serde_json::to_string_pretty(listings)?)?;
        info!("Formatted data saved to JSON at {}", json_path.display());

        let xlsx_path = self.run_dir.join(format!("sorted_data_{}.xlsx", n));
        match write_xlsx(&xlsx_path, &Table::from_records(&listings.listings, fields)) {
            Ok(()) => {
                info!("Formatted data saved to Excel at {}", xlsx_path.display());
                Ok((json_path, Some(xlsx_path)))
            }
            Err(e) => {
                warn!("⚠️ Could not write {}: {}", xlsx_path.display(), e);
                Ok((json_path, None))
            }
        }
    }
}

fn write_xlsx(path: &Path, table: &Table) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, name) in table.columns.iter().enumerate() {
        sheet.write_string(0, col as u16, name)?;
    }
    for (row_idx, row) in table.rows.iter().enumerate() {
        let row_num = row_idx as u32 + 1;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Value::Null => {}
                Value::Bool(b) => {
                    sheet.write_boolean(row_num, col, *b)?;
                }
                Value::Number(n) => match n.as_f64() {
                    Some(f) => {
                        sheet.write_number(row_num, col, f)?;
                    }
                    None => {
                        sheet.write_string(row_num, col, n.to_string())?;
                    }
                },
                other => {
                    sheet.write_string(row_num, col, fit_cell(cell_text(other)))?;
                }
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

fn fit_cell(mut text: String) -> String {
    if let Some((cut, _)) = text.char_indices().nth(XLSX_MAX_CELL_CHARS) {
        text.truncate(cut);
    }
    text
}
