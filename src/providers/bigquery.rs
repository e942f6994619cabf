//! BigQuery REST client
//!
//! Only what the cleaning service needs: listing datasets (connection test)
//! and loading a table through a multipart upload job.

use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::auth::GcpCredentials;
use super::google::check_response;
use crate::config::GcpEndpoints;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::table::Table;

const SERVICE: &str = "BigQuery";
const JOB_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How a load job treats existing table data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteDisposition {
    #[default]
    WriteTruncate,
    WriteAppend,
    WriteEmpty,
}

impl WriteDisposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteDisposition::WriteTruncate => "WRITE_TRUNCATE",
            WriteDisposition::WriteAppend => "WRITE_APPEND",
            WriteDisposition::WriteEmpty => "WRITE_EMPTY",
        }
    }
}

impl std::str::FromStr for WriteDisposition {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "WRITE_TRUNCATE" => Ok(Self::WriteTruncate),
            "WRITE_APPEND" => Ok(Self::WriteAppend),
            "WRITE_EMPTY" => Ok(Self::WriteEmpty),
            other => Err(AppError::invalid_config(format!("Unknown write disposition: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReference {
    pub dataset_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatasetRef {
    #[serde(rename = "datasetReference")]
    pub reference: DatasetReference,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatasetList {
    #[serde(default)]
    datasets: Vec<DatasetRef>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    state: String,
    #[serde(default)]
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    job_reference: JobReference,
    status: JobStatus,
}

pub struct BigQueryClient {
    http: reqwest::Client,
    credentials: Arc<GcpCredentials>,
    base_url: String,
    job_timeout: Duration,
}

impl BigQueryClient {
    pub fn new(
        http: reqwest::Client,
        credentials: Arc<GcpCredentials>,
        endpoints: &GcpEndpoints,
        job_timeout: Duration,
    ) -> Self {
        Self {
            http,
            credentials,
            base_url: endpoints.bigquery_url.trim_end_matches('/').to_string(),
            job_timeout,
        }
    }

    /// All datasets of a project, following pagination
    pub async fn list_datasets(&self, project_id: &str) -> AppResult<Vec<DatasetRef>> {
        let url = format!("{}/bigquery/v2/projects/{}/datasets", self.base_url, project_id);
        let mut datasets = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.credentials.access_token().await?;
            let mut request = self.http.get(&url).bearer_auth(token);
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page)]);
            }

            let response =
                check_response(request.send().await?, ErrorCode::GcpBigQuery, SERVICE).await?;
            let page: DatasetList = response.json().await?;
            datasets.extend(page.datasets);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(datasets)
    }

    /// Load `table` into `dataset.table_id`, creating or replacing it per
    /// `disposition`, and wait for the job to finish.
    pub async fn load_table(
        &self,
        project_id: &str,
        dataset_id: &str,
        table_id: &str,
        table: &Table,
        disposition: WriteDisposition,
    ) -> AppResult<()> {
        let job_id = format!("vzla_cleaning_{}", uuid::Uuid::new_v4().simple());
        let metadata = json!({
            "jobReference": { "projectId": project_id, "jobId": job_id },
            "configuration": {
                "load": {
                    "destinationTable": {
                        "projectId": project_id,
                        "datasetId": dataset_id,
                        "tableId": table_id,
                    },
                    "sourceFormat": "NEWLINE_DELIMITED_JSON",
                    "writeDisposition": disposition.as_str(),
                    "createDisposition": "CREATE_IF_NEEDED",
                    "autodetect": true,
                }
            }
        });

        let boundary = format!("vzla_boundary_{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related_body(
            &boundary,
            &metadata.to_string(),
            table.to_ndjson().as_bytes(),
        );

        info!(
            job_id = %job_id,
            rows = table.rows.len(),
            "Starting BigQuery load into {}.{}",
            dataset_id,
            table_id
        );

        let token = self.credentials.access_token().await?;
        let response = self
            .http
            .post(format!("{}/upload/bigquery/v2/projects/{}/jobs", self.base_url, project_id))
            .query(&[("uploadType", "multipart")])
            .bearer_auth(token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;
        let job: Job = check_response(response, ErrorCode::GcpBigQuery, SERVICE)
            .await?
            .json()
            .await?;

        self.wait_for_job(project_id, job).await
    }

    async fn wait_for_job(&self, project_id: &str, mut job: Job) -> AppResult<()> {
        let started = Instant::now();

        while job.status.state != "DONE" {
            if started.elapsed() > self.job_timeout {
                return Err(AppError::new(
                    ErrorCode::GcpBigQueryJobFailed,
                    format!(
                        "Load job {} did not finish within {}s",
                        job.job_reference.job_id,
                        self.job_timeout.as_secs()
                    ),
                ));
            }
            tokio::time::sleep(JOB_POLL_INTERVAL).await;

            debug!(
                job_id = %job.job_reference.job_id,
                state = %job.status.state,
                "Polling load job"
            );
            let token = self.credentials.access_token().await?;
            let mut request = self
                .http
                .get(format!(
                    "{}/bigquery/v2/projects/{}/jobs/{}",
                    self.base_url, project_id, job.job_reference.job_id
                ))
                .bearer_auth(token);
            if let Some(location) = &job.job_reference.location {
                request = request.query(&[("location", location)]);
            }
            job = check_response(request.send().await?, ErrorCode::GcpBigQuery, SERVICE)
                .await?
                .json()
                .await?;
        }

        match job.status.error_result {
            Some(err) => Err(AppError::new(
                ErrorCode::GcpBigQueryJobFailed,
                format!(
                    "Load job {} failed: {}{}",
                    job.job_reference.job_id,
                    err.message,
                    err.reason.map(|r| format!(" ({})", r)).unwrap_or_default()
                ),
            )),
            None => Ok(()),
        }
    }
}

/// `multipart/related` body: JSON metadata part followed by the media part
pub fn multipart_related_body(boundary: &str, metadata: &str, media: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata.len() + media.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.as_bytes());
    body.extend_from_slice(format!("\r\n--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
