//! API Request Handlers

use axum::{
    body::Body,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Json, Multipart, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::types::*;
use crate::config::ServerConfig;
use crate::core::cleaning::{process_excel_file, ProcessedFile};
use crate::core::uploads::{self, UploadContext};
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::providers::{CredentialResolver, WriteDisposition};
use crate::utils::constants::{DEFAULT_WORKSHEET, PROCESSED_PREFIX, XLSX_MIME};
use crate::utils::filename::{is_excel_filename, secure_filename};

/// Shared application state
pub struct AppState {
    pub config: ServerConfig,
    pub http: reqwest::Client,
    pub resolver: CredentialResolver,
}

impl AppState {
    pub fn new(config: ServerConfig, http: reqwest::Client, resolver: CredentialResolver) -> Self {
        Self {
            config,
            http,
            resolver,
        }
    }

    /// Resolve credentials and bundle them with the outbound client
    async fn upload_context(&self) -> AppResult<UploadContext> {
        let credentials = self.resolver.resolve().await?;
        Ok(UploadContext::new(
            self.http.clone(),
            credentials,
            self.config.endpoints.clone(),
            self.config.bigquery_job_timeout,
        ))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(code = self.code_str(), "❌ {}", self);
        } else {
            warn!(code = self.code_str(), "Rejected request: {}", self.message);
        }

        let body = ErrorBody {
            error: self.code.title().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================
// Health Check
// ============================================

pub async fn health_check() -> Json<HealthData> {
    Json(HealthData::healthy())
}

// ============================================
// Connection Tests
// ============================================

type ConnectionReply = (StatusCode, Json<TestConnectionResponse>);

pub async fn test_bigquery(State(state): State<Arc<AppState>>) -> ConnectionReply {
    match state.upload_context().await {
        Ok(ctx) => connection_reply(uploads::test_bigquery_connection(&ctx).await),
        Err(e) => connection_reply((false, format!("Error testing BigQuery connection: {}", e))),
    }
}

pub async fn test_storage(State(state): State<Arc<AppState>>) -> ConnectionReply {
    match state.upload_context().await {
        Ok(ctx) => connection_reply(uploads::test_storage_connection(&ctx).await),
        Err(e) => {
            connection_reply((false, format!("Error testing Cloud Storage connection: {}", e)))
        }
    }
}

fn connection_reply((success, message): (bool, String)) -> ConnectionReply {
    let status = if success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(TestConnectionResponse { success, message }))
}

// ============================================
// File Processing
// ============================================

/// An uploaded `file` part
struct Upload {
    filename: String,
    content: Vec<u8>,
}

pub async fn process_file(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let start = Instant::now();

    let upload = read_upload(multipart).await?;
    if upload.filename.is_empty() {
        return Err(AppError::no_file_selected());
    }
    if !is_excel_filename(&upload.filename) {
        return Err(AppError::invalid_file_type());
    }

    let filename = secure_filename(&upload.filename);
    let processed = {
        let filename = filename.clone();
        let content = upload.content;
        tokio::task::spawn_blocking(move || process_excel_file(&content, &filename)).await??
    };

    let flags = UploadFlags::from_query(&params);
    if !flags.any() {
        info!(
            filename = %filename,
            latency_ms = start.elapsed().as_millis() as u64,
            "📤 Returning processed file"
        );
        return attachment(&filename, processed.content);
    }

    let ctx = state.upload_context().await?;
    let uploads = run_uploads(&ctx, &flags, &params, &filename, processed).await;

    info!(
        filename = %filename,
        latency_ms = start.elapsed().as_millis() as u64,
        "📤 File processed with uploads"
    );

    let body = ProcessResponse {
        success: true,
        message: "File processed successfully".to_string(),
        filename,
        uploads,
    };
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// Pull the `file` part out of the form. Non-multipart bodies count as no file.
async fn read_upload(multipart: Result<Multipart, MultipartRejection>) -> AppResult<Upload> {
    let mut multipart = multipart.map_err(|_| AppError::no_file())?;

    while let Some(field) = multipart.next_field().await.map_err(unreadable_upload)? {
        if field.name() != Some("file") {
            continue;
        }
        // Parts without a filename are plain form values, not files
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content = field.bytes().await.map_err(unreadable_upload)?;
        return Ok(Upload {
            filename,
            content: content.to_vec(),
        });
    }

    Err(AppError::no_file())
}

fn unreadable_upload(err: MultipartError) -> AppError {
    AppError::with_source(ErrorCode::ApiProcessingFailed, "Could not read upload", err)
}

fn attachment(filename: &str, content: Vec<u8>) -> AppResult<Response> {
    let disposition = format!("attachment; filename=\"{}{}\"", PROCESSED_PREFIX, filename);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, XLSX_MIME)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from(content))
        .map_err(|e| {
            AppError::with_source(ErrorCode::ApiProcessingFailed, "Could not build response", e)
        })
}

/// Destinations requested through the query string
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UploadFlags {
    pub bigquery: bool,
    pub storage: bool,
    pub sheets: bool,
}

impl UploadFlags {
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let flag = |key: &str| {
            params
                .get(key)
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false)
        };
        Self {
            bigquery: flag("upload_bigquery"),
            storage: flag("upload_storage"),
            sheets: flag("upload_sheets"),
        }
    }

    pub fn any(&self) -> bool {
        self.bigquery || self.storage || self.sheets
    }
}

async fn run_uploads(
    ctx: &UploadContext,
    flags: &UploadFlags,
    params: &HashMap<String, String>,
    filename: &str,
    processed: ProcessedFile,
) -> UploadResults {
    // Empty values count as missing for required parameters
    let required = |key: &str| params.get(key).filter(|v| !v.is_empty()).cloned();
    let mut results = UploadResults::default();

    if flags.bigquery {
        results.bigquery = Some(match (required("dataset_id"), required("table_id")) {
            (Some(dataset), Some(table)) => {
                let success = uploads::upload_to_bigquery(
                    ctx,
                    &processed.table,
                    &dataset,
                    &table,
                    WriteDisposition::default(),
                )
                .await;
                UploadOutcome::BigQuery {
                    success,
                    dataset,
                    table,
                }
            }
            _ => UploadOutcome::skipped("dataset_id and table_id are required"),
        });
    }

    if flags.storage {
        results.storage = Some(match required("bucket_name") {
            Some(bucket) => {
                let blob = params
                    .get("blob_name")
                    .cloned()
                    .unwrap_or_else(|| filename.to_string());
                let content = processed.content.clone();
                let success = uploads::upload_to_storage(ctx, content, &bucket, &blob).await;
                UploadOutcome::Storage { success, bucket, blob }
            }
            None => UploadOutcome::skipped("bucket_name is required"),
        });
    }

    if flags.sheets {
        results.sheets = Some(match required("spreadsheet_id") {
            Some(spreadsheet_id) => {
                let worksheet = params
                    .get("worksheet_name")
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_WORKSHEET.to_string());
                let table = &processed.table;
                let success =
                    uploads::upload_to_sheets(ctx, table, &spreadsheet_id, &worksheet, true).await;
                UploadOutcome::Sheets {
                    success,
                    spreadsheet_id,
                    worksheet,
                }
            }
            None => UploadOutcome::skipped("spreadsheet_id is required"),
        });
    }

    results
}
