//! Centralized Error Handling Module
//!
//! Every failure carries a unique error code so logs can be grepped by
//! category. Error codes follow the pattern CATEGORY_SPECIFIC_ERROR:
//! - API_xxx: request validation errors
//! - EXCEL_xxx: workbook decode/encode errors
//! - GCP_xxx: Google Cloud errors (auth, BigQuery, Storage, Sheets)
//! - CFG_xxx: configuration errors

use std::fmt;

/// Application-wide error type
#[derive(Debug)]
pub struct AppError {
    /// Unique error code for logging/monitoring
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional underlying error
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new AppError
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create AppError with source error
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Get error code as string (for logging)
    pub fn code_str(&self) -> &'static str {
        self.code.as_str()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unique error codes for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // ============================================
    // API Errors
    // ============================================
    /// Multipart body has no `file` part
    ApiNoFile,
    /// `file` part has an empty filename
    ApiNoFileSelected,
    /// Uploaded file is not .xlsx/.xls
    ApiInvalidFileType,
    /// Generic processing failure surfaced to the client
    ApiProcessingFailed,

    // ============================================
    // Workbook Errors
    // ============================================
    /// Workbook could not be opened or parsed
    ExcelReadFailed,
    /// Workbook has no worksheet
    ExcelNoWorksheet,
    /// Workbook could not be written
    ExcelWriteFailed,

    // ============================================
    // Google Cloud Errors
    // ============================================
    /// No usable credentials
    GcpAuthFailed,
    /// Credentials file is malformed or unsupported
    GcpInvalidCredentials,
    /// Project id could not be determined
    GcpMissingProject,
    /// BigQuery API error
    GcpBigQuery,
    /// BigQuery load job finished with an error
    GcpBigQueryJobFailed,
    /// Cloud Storage API error
    GcpStorage,
    /// Sheets API error
    GcpSheets,
    /// Google API rate limited (HTTP 429)
    GcpRateLimited,

    // ============================================
    // Configuration Errors
    // ============================================
    /// Invalid configuration value
    ConfigInvalidValue,

    // ============================================
    // Transport Errors
    // ============================================
    /// Connection failed
    ConnectionFailed,
    /// External service timeout
    ExternalTimeout,
    /// Response could not be decoded
    InvalidResponse,

    // ============================================
    // Generic Errors
    // ============================================
    /// Blocking task panicked or was cancelled
    TaskFailed,
    /// Unknown error
    Unknown,
}

impl ErrorCode {
    /// Get string representation of error code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiNoFile => "API_NO_FILE",
            Self::ApiNoFileSelected => "API_NO_FILE_SELECTED",
            Self::ApiInvalidFileType => "API_INVALID_FILE_TYPE",
            Self::ApiProcessingFailed => "API_PROCESSING_FAILED",

            Self::ExcelReadFailed => "EXCEL_READ_FAILED",
            Self::ExcelNoWorksheet => "EXCEL_NO_WORKSHEET",
            Self::ExcelWriteFailed => "EXCEL_WRITE_FAILED",

            Self::GcpAuthFailed => "GCP_AUTH_FAILED",
            Self::GcpInvalidCredentials => "GCP_INVALID_CREDENTIALS",
            Self::GcpMissingProject => "GCP_MISSING_PROJECT",
            Self::GcpBigQuery => "GCP_BIGQUERY_ERROR",
            Self::GcpBigQueryJobFailed => "GCP_BIGQUERY_JOB_FAILED",
            Self::GcpStorage => "GCP_STORAGE_ERROR",
            Self::GcpSheets => "GCP_SHEETS_ERROR",
            Self::GcpRateLimited => "GCP_RATE_LIMITED",

            Self::ConfigInvalidValue => "CFG_INVALID_VALUE",

            Self::ConnectionFailed => "CONNECTION_FAILED",
            Self::ExternalTimeout => "EXTERNAL_TIMEOUT",
            Self::InvalidResponse => "INVALID_RESPONSE",

            Self::TaskFailed => "TASK_FAILED",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Short title used as the `error` field of API error bodies
    pub fn title(&self) -> &'static str {
        match self {
            Self::ApiNoFile => "No file provided",
            Self::ApiNoFileSelected => "No file selected",
            Self::ApiInvalidFileType => "Invalid file type",
            _ => "Processing failed",
        }
    }

    /// Get HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ApiNoFile | Self::ApiNoFileSelected | Self::ApiInvalidFileType => 400,
            _ => 500,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GcpRateLimited | Self::ConnectionFailed | Self::ExternalTimeout
        )
    }
}

// ============================================
// Convenience constructors
// ============================================

impl AppError {
    /// No `file` part in the request
    pub fn no_file() -> Self {
        Self::new(
            ErrorCode::ApiNoFile,
            "Please provide an Excel file in the \"file\" field",
        )
    }

    /// `file` part with an empty filename
    pub fn no_file_selected() -> Self {
        Self::new(ErrorCode::ApiNoFileSelected, "Please select a file to upload")
    }

    /// Uploaded file is not a workbook
    pub fn invalid_file_type() -> Self {
        Self::new(
            ErrorCode::ApiInvalidFileType,
            "Please upload an Excel file (.xlsx or .xls)",
        )
    }

    /// Workbook write failure
    pub fn excel_write(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ExcelWriteFailed, msg)
    }

    /// Credentials could not be resolved
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::GcpAuthFailed, msg)
    }

    /// Project id missing
    pub fn missing_project() -> Self {
        Self::new(
            ErrorCode::GcpMissingProject,
            "Project ID could not be determined from credentials or environment",
        )
    }

    /// Invalid configuration value
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalidValue, msg)
    }
}

// ============================================
// Result type alias
// ============================================

/// Application Result type
pub type AppResult<T> = Result<T, AppError>;

// ============================================
// Conversion from common error types
// ============================================

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorCode::Unknown, "IO error", err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(ErrorCode::ExternalTimeout, "Request timeout")
        } else if err.is_connect() {
            Self::new(ErrorCode::ConnectionFailed, "Connection failed")
        } else if err.is_decode() {
            Self::with_source(ErrorCode::InvalidResponse, "Invalid response body", err)
        } else {
            Self::new(ErrorCode::Unknown, err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorCode::InvalidResponse, "JSON parse error", err)
    }
}

impl From<calamine::Error> for AppError {
    fn from(err: calamine::Error) -> Self {
        Self::with_source(ErrorCode::ExcelReadFailed, "Could not read workbook", err)
    }
}

impl From<rust_xlsxwriter::XlsxError> for AppError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::with_source(ErrorCode::ExcelWriteFailed, "Could not write workbook", err)
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::with_source(
            ErrorCode::GcpInvalidCredentials,
            "Could not sign service account assertion",
            err,
        )
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::with_source(ErrorCode::TaskFailed, "Background task failed", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AppError::no_file();
        assert_eq!(err.code, ErrorCode::ApiNoFile);
        assert_eq!(err.code_str(), "API_NO_FILE");
        assert_eq!(err.code.title(), "No file provided");
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorCode::GcpRateLimited.is_retryable());
        assert!(ErrorCode::ExternalTimeout.is_retryable());
        assert!(!ErrorCode::ExcelReadFailed.is_retryable());
    }

    #[test]
    fn test_http_status() {
        assert_eq!(ErrorCode::ApiInvalidFileType.http_status(), 400);
        assert_eq!(ErrorCode::ExcelReadFailed.http_status(), 500);
        assert_eq!(ErrorCode::GcpAuthFailed.http_status(), 500);
    }

    #[test]
    fn test_display_includes_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = AppError::with_source(ErrorCode::Unknown, "IO error", io);
        assert_eq!(err.to_string(), "IO error: gone");
        let err = AppError::new(ErrorCode::ExcelReadFailed, "bad zip");
        assert_eq!(err.to_string(), "bad zip");
    }
}
