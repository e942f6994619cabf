//! Utils Module - Helper Functions & Shared Utilities
//!
//! Workbook codec, filename handling and the constants shared by every layer.

pub mod constants;
pub mod excel;
pub mod filename;

pub use constants::*;
pub use excel::{excel_serial, read_table, write_table};
pub use filename::{is_excel_filename, secure_filename};
