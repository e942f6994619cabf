//! Cloud Storage JSON API client

use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::auth::GcpCredentials;
use super::google::check_response;
use crate::config::GcpEndpoints;
use crate::models::errors::{AppResult, ErrorCode};

const SERVICE: &str = "Cloud Storage";

#[derive(Debug, Clone, Deserialize)]
pub struct BucketRef {
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketList {
    #[serde(default)]
    items: Vec<BucketRef>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Metadata returned for an uploaded object
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub name: String,
    #[serde(default)]
    pub size: Option<String>,
}

pub struct StorageClient {
    http: reqwest::Client,
    credentials: Arc<GcpCredentials>,
    base_url: String,
}

impl StorageClient {
    pub fn new(
        http: reqwest::Client,
        credentials: Arc<GcpCredentials>,
        endpoints: &GcpEndpoints,
    ) -> Self {
        Self {
            http,
            credentials,
            base_url: endpoints.storage_url.trim_end_matches('/').to_string(),
        }
    }

    /// All buckets of a project, following pagination
    pub async fn list_buckets(&self, project_id: &str) -> AppResult<Vec<BucketRef>> {
        let url = format!("{}/storage/v1/b", self.base_url);
        let mut buckets = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.credentials.access_token().await?;
            let mut request = self
                .http
                .get(&url)
                .bearer_auth(token)
                .query(&[("project", project_id)]);
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page)]);
            }

            let response =
                check_response(request.send().await?, ErrorCode::GcpStorage, SERVICE).await?;
            let page: BucketList = response.json().await?;
            buckets.extend(page.items);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(buckets)
    }

    /// Simple media upload; replaces any existing object with the same name
    pub async fn upload_object(
        &self,
        bucket: &str,
        name: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> AppResult<ObjectRef> {
        debug!(bucket, name, bytes = content.len(), "Uploading object");
        let token = self.credentials.access_token().await?;
        let response = self
            .http
            .post(format!("{}/upload/storage/v1/b/{}/o", self.base_url, bucket))
            .query(&[("uploadType", "media"), ("name", name)])
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(content)
            .send()
            .await?;

        let object = check_response(response, ErrorCode::GcpStorage, SERVICE)
            .await?
            .json()
            .await?;
        Ok(object)
    }
}
