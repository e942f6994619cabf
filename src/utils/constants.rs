//! Constants Module - Single Source of Truth
//!
//! Service identity, wire formats and Google endpoints shared by the
//! API, the CLI and the Google Cloud providers.

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Service name reported by the health check
pub const SERVICE_NAME: &str = "vzla-r011-direct-cleaning";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for outbound Google API requests
pub const USER_AGENT: &str = concat!("vzla-cleaning/", env!("CARGO_PKG_VERSION"));

// ============================================
// SERVER DEFAULTS
// ============================================

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8750;
pub const DEFAULT_WORKERS: usize = 2;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 100;
pub const DEFAULT_CREDENTIALS_PATH: &str = "/app/credentials.json";

/// BigQuery load jobs must finish inside the request timeout
pub const DEFAULT_BQ_JOB_TIMEOUT_SECS: u64 = 110;

// ============================================
// WORKBOOK FORMAT
// ============================================

/// MIME type of the cleaned workbook
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Accepted upload extensions
pub const EXCEL_EXTENSIONS: [&str; 2] = [".xlsx", ".xls"];

/// Output worksheet name
pub const OUTPUT_SHEET_NAME: &str = "Sheet1";

/// Text form of datetimes (JSON exports and the xlsx number format)
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const XLSX_DATETIME_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

/// Cell texts read as missing values in data rows
pub const NA_STRINGS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Prefix of the downloaded file name
pub const PROCESSED_PREFIX: &str = "processed_";

// ============================================
// GOOGLE CLOUD
// ============================================

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GCE_METADATA_URL: &str = "http://metadata.google.internal";
pub const BIGQUERY_BASE_URL: &str = "https://bigquery.googleapis.com";
pub const STORAGE_BASE_URL: &str = "https://storage.googleapis.com";
pub const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

/// OAuth scopes requested for service account and user credentials
pub const GOOGLE_SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive",
];

/// JWT bearer grant used by service accounts
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Tokens are refreshed this long before they expire
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Metadata server detection timeout
pub const METADATA_CHECK_TIMEOUT_SECS: u64 = 3;

/// Worksheet created when the target sheet does not exist
pub const NEW_WORKSHEET_ROWS: u32 = 1000;
pub const NEW_WORKSHEET_COLS: u32 = 26;

/// Default worksheet for Sheets uploads
pub const DEFAULT_WORKSHEET: &str = "Sheet1";
