//! Workbook codec
//!
//! Reads the first worksheet of an uploaded workbook into a [`Table`] and
//! writes a [`Table`] back out as a single-sheet xlsx file.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook};
use std::collections::HashMap;
use std::io::Cursor;
use tracing::debug;

use super::constants::{NA_STRINGS, OUTPUT_SHEET_NAME, XLSX_DATETIME_FORMAT};
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::table::{CellValue, Table};

/// Decode the first worksheet. The first used row is the header.
pub fn read_table(bytes: &[u8], filename: &str) -> AppResult<Table> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(|e| {
        let message = format!("Could not open {}", filename);
        AppError::with_source(ErrorCode::ExcelReadFailed, message, e)
    })?;

    let sheet_names = workbook.sheet_names();
    debug!(sheets = ?sheet_names, "Workbook opened");

    let range = workbook.worksheet_range_at(0).ok_or_else(|| {
        AppError::new(ErrorCode::ExcelNoWorksheet, format!("{} has no worksheets", filename))
    })??;

    let mut rows = range.rows();
    let header: Vec<CellValue> = match rows.next() {
        Some(cells) => cells.iter().map(cell_from_data).collect(),
        None => return Ok(Table::default()),
    };
    let columns = column_names(&header);
    let width = columns.len();

    let data = rows
        .map(|cells| {
            let mut row: Vec<CellValue> = cells.iter().map(value_from_data).collect();
            row.resize(width, CellValue::Empty);
            row
        })
        .collect();

    Ok(Table::new(columns, data))
}

/// Encode as a single `Sheet1` worksheet without an index column
pub fn write_table(table: &Table) -> AppResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new()
        .set_bold()
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center);
    let datetime_format = Format::new().set_num_format(XLSX_DATETIME_FORMAT);

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(OUTPUT_SHEET_NAME)?;

    for (col, name) in table.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, column_index(col)?, name, &header_format)?;
    }

    for (i, row) in table.rows.iter().enumerate() {
        let row_num = u32::try_from(i + 1)
            .map_err(|_| AppError::excel_write("Too many rows for a worksheet"))?;
        for (col, cell) in row.iter().enumerate() {
            let col = column_index(col)?;
            match cell {
                CellValue::Empty => {}
                CellValue::Bool(b) => {
                    worksheet.write_boolean(row_num, col, *b)?;
                }
                CellValue::Int(v) => {
                    worksheet.write_number(row_num, col, *v as f64)?;
                }
                CellValue::Float(v) => {
                    worksheet.write_number(row_num, col, *v)?;
                }
                CellValue::String(s) => {
                    worksheet.write_string(row_num, col, s)?;
                }
                CellValue::DateTime(dt) => {
                    let serial = excel_serial(dt);
                    worksheet.write_number_with_format(row_num, col, serial, &datetime_format)?;
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn column_index(col: usize) -> AppResult<u16> {
    u16::try_from(col).map_err(|_| AppError::excel_write("Too many columns for a worksheet"))
}

/// Days since the 1900 date system epoch, with the time as a fraction
pub fn excel_serial(dt: &NaiveDateTime) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    (*dt - epoch).num_milliseconds() as f64 / 86_400_000.0
}

/// Data cell; NA markers and error values are missing values
fn value_from_data(data: &Data) -> CellValue {
    match data {
        Data::String(s) if NA_STRINGS.contains(&s.as_str()) => CellValue::Empty,
        Data::Error(_) => CellValue::Empty,
        other => cell_from_data(other),
    }
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => float_cell(*f),
        Data::String(s) => CellValue::String(s.clone()),
        Data::DateTime(dt) if dt.is_duration() => CellValue::Float(dt.as_f64()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Float(dt.as_f64())),
        Data::DateTimeIso(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
            .map(CellValue::DateTime)
            .unwrap_or_else(|_| CellValue::String(s.clone())),
        Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::String(e.to_string()),
    }
}

// xlsx stores every number as a double; integral values come back as integers
fn float_cell(f: f64) -> CellValue {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 {
        CellValue::Int(f as i64)
    } else {
        CellValue::Float(f)
    }
}

/// Header names: blanks become `Unnamed: <i>`, repeats get `.1`, `.2`, ...
fn column_names(header: &[CellValue]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    header
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let base = match cell {
                CellValue::Empty => format!("Unnamed: {}", i),
                other => other.to_string(),
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            name
        })
        .collect()
}
