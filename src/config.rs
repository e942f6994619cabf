//! Runtime configuration for the cleaning service
//!
//! Values come from environment variables with container-friendly defaults.
//! Parsing goes through a lookup function so it can be exercised without
//! touching the process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::utils::constants::{
    BIGQUERY_BASE_URL, DEFAULT_BQ_JOB_TIMEOUT_SECS, DEFAULT_CREDENTIALS_PATH, DEFAULT_HOST,
    DEFAULT_MAX_UPLOAD_MB, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_WORKERS,
    GCE_METADATA_URL, GOOGLE_TOKEN_URL, SHEETS_BASE_URL, STORAGE_BASE_URL,
};

/// Google API base URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcpEndpoints {
    pub token_url: String,
    pub metadata_url: String,
    pub bigquery_url: String,
    pub storage_url: String,
    pub sheets_url: String,
}

impl Default for GcpEndpoints {
    fn default() -> Self {
        Self {
            token_url: GOOGLE_TOKEN_URL.to_string(),
            metadata_url: GCE_METADATA_URL.to_string(),
            bigquery_url: BIGQUERY_BASE_URL.to_string(),
            storage_url: STORAGE_BASE_URL.to_string(),
            sheets_url: SHEETS_BASE_URL.to_string(),
        }
    }
}

impl GcpEndpoints {
    /// Point every API at one base URL (local fakes)
    pub fn single_host(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            token_url: format!("{}/token", base),
            metadata_url: base.clone(),
            bigquery_url: base.clone(),
            storage_url: base.clone(),
            sheets_url: base,
        }
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        let mut endpoints = Self::default();
        if let Some(host) = lookup("GCE_METADATA_HOST").filter(|h| !h.is_empty()) {
            endpoints.metadata_url = format!("http://{}", host);
        }
        endpoints
    }
}

/// Configuration for the cleaning API server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Runtime worker threads serving requests
    pub workers: usize,

    /// Requests running longer than this are aborted
    pub request_timeout: Duration,

    /// Maximum multipart body size in bytes
    pub max_upload_bytes: usize,

    /// Credentials file tried before Application Default Credentials
    pub credentials_path: PathBuf,

    /// Upper bound on waiting for a BigQuery load job
    pub bigquery_job_timeout: Duration,

    /// Google API base URLs
    pub endpoints: GcpEndpoints,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            workers: DEFAULT_WORKERS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_PATH),
            bigquery_job_timeout: Duration::from_secs(DEFAULT_BQ_JOB_TIMEOUT_SECS),
            endpoints: GcpEndpoints::default(),
        }
    }
}

impl ServerConfig {
    /// Load from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let host = lookup("CLEANING_HOST")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or(defaults.host);

        // Container platforms set PORT; CLEANING_PORT is for local runs
        let port = lookup("PORT")
            .map(|v| ("PORT", v))
            .or_else(|| lookup("CLEANING_PORT").map(|v| ("CLEANING_PORT", v)))
            .map(|(key, v)| parse_or(key, &v, defaults.port))
            .unwrap_or(defaults.port);

        let workers = positive_or(&lookup, "CLEANING_WORKERS", defaults.workers);
        let timeout_secs =
            positive_or(&lookup, "CLEANING_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS);
        let max_upload_mb = positive_or(&lookup, "CLEANING_MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB);
        let job_timeout_secs =
            positive_or(&lookup, "CLEANING_BQ_JOB_TIMEOUT_SECS", DEFAULT_BQ_JOB_TIMEOUT_SECS);

        let credentials_path = lookup("GOOGLE_APPLICATION_CREDENTIALS")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.credentials_path);

        Self {
            host,
            port,
            workers,
            request_timeout: Duration::from_secs(timeout_secs),
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            credentials_path,
            bigquery_job_timeout: Duration::from_secs(job_timeout_secs),
            endpoints: GcpEndpoints::from_lookup(&lookup),
        }
    }

    /// `host:port` string for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, value: &str, default: T) -> T {
    match value.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(key, value = %value, "Invalid configuration value, using default");
            default
        }
    }
}

fn positive_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + PartialOrd + Default,
{
    match lookup(key) {
        Some(value) => {
            let parsed = parse_or(key, &value, default);
            if parsed <= T::default() {
                warn!(key, value = %value, "Configuration value must be positive, using default");
                default
            } else {
                parsed
            }
        }
        None => default,
    }
}
