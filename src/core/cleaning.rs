//! Workbook cleaning
//!
//! Decode the upload, drop rows that carry no data at all, encode it again.
//! The cleaned [`Table`] is kept next to the encoded bytes so uploads can use
//! it without decoding the workbook a second time.

use tracing::{error, info};

use crate::models::errors::AppResult;
use crate::models::table::Table;
use crate::utils::excel::{read_table, write_table};

/// Result of cleaning one workbook
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub table: Table,
    pub content: Vec<u8>,
    /// Rows removed by cleaning
    pub dropped_rows: usize,
}

/// Clean a decoded worksheet. The input is left untouched.
pub fn process_dataframe(table: &Table) -> Table {
    let mut processed = table.clone();
    processed.drop_empty_rows();
    processed
}

/// Decode, clean and re-encode an uploaded workbook
pub fn process_excel_file(content: &[u8], filename: &str) -> AppResult<ProcessedFile> {
    match process_inner(content, filename) {
        Ok(processed) => {
            info!("✅ Excel file processed successfully");
            Ok(processed)
        }
        Err(e) => {
            error!("❌ Error processing Excel file: {}", e);
            Err(e)
        }
    }
}

fn process_inner(content: &[u8], filename: &str) -> AppResult<ProcessedFile> {
    info!("📄 Reading Excel file: {}", filename);
    let table = read_table(content, filename)?;

    let (rows, cols) = table.shape();
    info!("Table shape: ({} rows, {} columns)", rows, cols);
    info!("Columns: {:?}", table.columns);

    let processed = process_dataframe(&table);
    let dropped_rows = rows - processed.rows.len();
    if dropped_rows > 0 {
        info!("🧹 Dropped {} empty rows", dropped_rows);
    }

    let content = write_table(&processed)?;
    Ok(ProcessedFile {
        table: processed,
        content,
        dropped_rows,
    })
}
