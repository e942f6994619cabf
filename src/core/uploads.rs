//! Upload Service
//!
//! Thin layer over the Google clients. Connection tests report a
//! `(success, message)` pair and uploads report a plain `bool`; the cause of a
//! failure only goes to the log.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::GcpEndpoints;
use crate::models::errors::AppResult;
use crate::models::table::Table;
use crate::providers::{
    BigQueryClient, GcpCredentials, SheetsClient, StorageClient, WriteDisposition,
};
use crate::utils::constants::XLSX_MIME;

/// Everything an upload needs besides its payload
#[derive(Clone)]
pub struct UploadContext {
    pub http: reqwest::Client,
    pub credentials: Arc<GcpCredentials>,
    pub endpoints: GcpEndpoints,
    pub bigquery_job_timeout: Duration,
}

impl UploadContext {
    pub fn new(
        http: reqwest::Client,
        credentials: Arc<GcpCredentials>,
        endpoints: GcpEndpoints,
        bigquery_job_timeout: Duration,
    ) -> Self {
        Self {
            http,
            credentials,
            endpoints,
            bigquery_job_timeout,
        }
    }

    fn bigquery(&self) -> BigQueryClient {
        BigQueryClient::new(
            self.http.clone(),
            self.credentials.clone(),
            &self.endpoints,
            self.bigquery_job_timeout,
        )
    }

    fn storage(&self) -> StorageClient {
        StorageClient::new(self.http.clone(), self.credentials.clone(), &self.endpoints)
    }

    fn sheets(&self) -> SheetsClient {
        SheetsClient::new(self.http.clone(), self.credentials.clone(), &self.endpoints)
    }
}

// ============================================
// CONNECTION TESTS
// ============================================

pub async fn test_bigquery_connection(ctx: &UploadContext) -> (bool, String) {
    let result: AppResult<(String, usize)> = async {
        let project = ctx.credentials.require_project()?.to_string();
        let datasets = ctx.bigquery().list_datasets(&project).await?;
        Ok((project, datasets.len()))
    }
    .await;

    match result {
        Ok((project, count)) => (
            true,
            format!(
                "Successfully connected to BigQuery. Project: {}, Datasets found: {}",
                project, count
            ),
        ),
        Err(e) => (false, format!("Error connecting to BigQuery: {}", e)),
    }
}

pub async fn test_storage_connection(ctx: &UploadContext) -> (bool, String) {
    let result: AppResult<(String, usize)> = async {
        let project = ctx.credentials.require_project()?.to_string();
        let buckets = ctx.storage().list_buckets(&project).await?;
        Ok((project, buckets.len()))
    }
    .await;

    match result {
        Ok((project, count)) => (
            true,
            format!(
                "Successfully connected to Cloud Storage. Project: {}, Buckets found: {}",
                project, count
            ),
        ),
        Err(e) => (false, format!("Error connecting to Cloud Storage: {}", e)),
    }
}

// ============================================
// UPLOADS
// ============================================

pub async fn upload_to_bigquery(
    ctx: &UploadContext,
    table: &Table,
    dataset_id: &str,
    table_id: &str,
    disposition: WriteDisposition,
) -> bool {
    let result: AppResult<()> = async {
        let project = ctx.credentials.require_project()?;
        ctx.bigquery()
            .load_table(project, dataset_id, table_id, table, disposition)
            .await
    }
    .await;

    match result {
        Ok(()) => {
            info!("📊 Data uploaded to BigQuery: {}.{}", dataset_id, table_id);
            true
        }
        Err(e) => {
            error!(
                code = e.code_str(),
                retryable = e.code.is_retryable(),
                "❌ Error uploading to BigQuery: {}",
                e
            );
            false
        }
    }
}

pub async fn upload_to_storage(
    ctx: &UploadContext,
    content: Vec<u8>,
    bucket_name: &str,
    blob_name: &str,
) -> bool {
    match ctx
        .storage()
        .upload_object(bucket_name, blob_name, content, XLSX_MIME)
        .await
    {
        Ok(_) => {
            info!("🪣 File uploaded to Cloud Storage: gs://{}/{}", bucket_name, blob_name);
            true
        }
        Err(e) => {
            error!(
                code = e.code_str(),
                retryable = e.code.is_retryable(),
                "❌ Error uploading to Cloud Storage: {}",
                e
            );
            false
        }
    }
}

pub async fn upload_to_sheets(
    ctx: &UploadContext,
    table: &Table,
    spreadsheet_id: &str,
    worksheet_name: &str,
    clear: bool,
) -> bool {
    match ctx
        .sheets()
        .upload_values(spreadsheet_id, worksheet_name, table.to_sheet_values(), clear)
        .await
    {
        Ok(()) => {
            info!(
                "📋 Data uploaded to Google Sheets: {}/{}",
                spreadsheet_id, worksheet_name
            );
            true
        }
        Err(e) => {
            error!(
                code = e.code_str(),
                retryable = e.code.is_retryable(),
                "❌ Error uploading to Google Sheets: {}",
                e
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_ctx(project: Option<&str>) -> UploadContext {
        UploadContext::new(
            reqwest::Client::new(),
            Arc::new(GcpCredentials::from_static_token("token", project.map(String::from))),
            // Nothing listens on port 9; requests fail fast
            GcpEndpoints::single_host("http://127.0.0.1:9"),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_connection_without_project_fails() {
        let (ok, message) = test_bigquery_connection(&offline_ctx(None)).await;
        assert!(!ok);
        assert!(message.starts_with("Error connecting to BigQuery: "));

        let (ok, message) = test_storage_connection(&offline_ctx(None)).await;
        assert!(!ok);
        assert!(message.starts_with("Error connecting to Cloud Storage: "));
    }

    #[tokio::test]
    async fn test_unreachable_upload_reports_false() {
        let ctx = offline_ctx(Some("demo"));
        let ok = upload_to_storage(&ctx, vec![1, 2, 3], "bucket", "a.xlsx").await;
        assert!(!ok);
    }
}
