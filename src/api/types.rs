//! API Request/Response Types

use serde::Serialize;

use crate::utils::constants::SERVICE_NAME;

// ============================================
// Health & Connection Tests
// ============================================

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: String,
    pub service: String,
    pub message: String,
}

impl HealthData {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            service: SERVICE_NAME.to_string(),
            message: "Service is running".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TestConnectionResponse {
    pub success: bool,
    pub message: String,
}

// ============================================
// Errors
// ============================================

/// `{"error": <title>, "message": <detail>}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

// ============================================
// File Processing
// ============================================

#[derive(Debug, Default, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub uploads: UploadResults,
}

/// Only the destinations that were requested appear in the JSON
#[derive(Debug, Default, Serialize)]
pub struct UploadResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bigquery: Option<UploadOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<UploadOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheets: Option<UploadOutcome>,
}

/// Either the destination the upload targeted or the reason it was skipped
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UploadOutcome {
    BigQuery {
        success: bool,
        dataset: String,
        table: String,
    },
    Storage {
        success: bool,
        bucket: String,
        blob: String,
    },
    Sheets {
        success: bool,
        spreadsheet_id: String,
        worksheet: String,
    },
    Skipped {
        success: bool,
        message: String,
    },
}

impl UploadOutcome {
    pub fn skipped(message: impl Into<String>) -> Self {
        UploadOutcome::Skipped {
            success: false,
            message: message.into(),
        }
    }
}
