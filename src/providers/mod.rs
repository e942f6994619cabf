//! Providers Module - Google Cloud clients
//!
//! Credentials resolution plus thin REST clients for BigQuery,
//! Cloud Storage and Google Sheets.

pub mod auth;
pub mod bigquery;
pub mod google;
pub mod sheets;
pub mod storage;

pub use auth::*;
pub use bigquery::*;
pub use google::{build_http_client, check_response};
pub use sheets::*;
pub use storage::*;
