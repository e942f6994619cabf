//! Venezuela R011 Direct Cleaning Library
//!
//! Cleans Excel workbooks (drops rows with no data at all) and optionally
//! ships the result to Google Cloud:
//! - BigQuery tables via load jobs
//! - Cloud Storage objects
//! - Google Sheets worksheets

pub mod api;
pub mod config;
pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use api::{create_router, AppState};
pub use config::{GcpEndpoints, ServerConfig};
pub use crate::core::cleaning::{process_dataframe, process_excel_file, ProcessedFile};
pub use crate::core::uploads::{
    test_bigquery_connection, test_storage_connection, upload_to_bigquery, upload_to_sheets,
    upload_to_storage, UploadContext,
};
pub use models::errors::{AppError, AppResult, ErrorCode};
pub use models::table::{CellValue, Table};
pub use providers::{CredentialResolver, GcpCredentials, TokenSource, WriteDisposition};
pub use utils::filename::{is_excel_filename, secure_filename};
