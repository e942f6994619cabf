//! Google Cloud credentials
//!
//! Resolution order:
//! 1. The configured credentials file (`GOOGLE_APPLICATION_CREDENTIALS`,
//!    default `/app/credentials.json`) when it exists
//! 2. Application Default Credentials: `GOOGLE_OAUTH_ACCESS_TOKEN`, the gcloud
//!    well-known file, then the GCE metadata server
//!
//! Access tokens are cached per credential and refreshed shortly before expiry.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

use crate::config::{GcpEndpoints, ServerConfig};
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::{
    GOOGLE_SCOPES, JWT_BEARER_GRANT, METADATA_CHECK_TIMEOUT_SECS, TOKEN_REFRESH_MARGIN_SECS,
};

/// Service account key file (`"type": "service_account"`)
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// gcloud user credentials (`"type": "authorized_user"`)
#[derive(Clone, Deserialize)]
pub struct AuthorizedUserKey {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub quota_project_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CredentialsFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserKey),
}

/// Where access tokens come from
#[derive(Clone)]
pub enum TokenSource {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserKey),
    /// GCE / Cloud Run metadata server
    Metadata,
    /// Pre-issued bearer token, never refreshed
    Static(String),
}

impl TokenSource {
    pub fn kind(&self) -> &'static str {
        match self {
            TokenSource::ServiceAccount(_) => "service_account",
            TokenSource::AuthorizedUser(_) => "authorized_user",
            TokenSource::Metadata => "metadata",
            TokenSource::Static(_) => "static",
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                expires_at - ChronoDuration::seconds(TOKEN_REFRESH_MARGIN_SECS) > now
            }
            None => true,
        }
    }
}

/// Resolved credentials plus the project they belong to
pub struct GcpCredentials {
    source: TokenSource,
    project_id: Option<String>,
    http: reqwest::Client,
    endpoints: GcpEndpoints,
    cached: Mutex<Option<CachedToken>>,
}

impl GcpCredentials {
    pub fn new(
        source: TokenSource,
        project_id: Option<String>,
        http: reqwest::Client,
        endpoints: GcpEndpoints,
    ) -> Self {
        Self {
            source,
            project_id,
            http,
            endpoints,
            cached: Mutex::new(None),
        }
    }

    /// Credentials backed by a fixed bearer token
    pub fn from_static_token(token: impl Into<String>, project_id: Option<String>) -> Self {
        Self::new(
            TokenSource::Static(token.into()),
            project_id,
            reqwest::Client::new(),
            GcpEndpoints::default(),
        )
    }

    /// Load a service account or authorized user key file
    pub async fn from_file(
        path: &Path,
        http: reqwest::Client,
        endpoints: GcpEndpoints,
    ) -> AppResult<Self> {
        let raw = tokio::fs::read_to_string(path).await?;
        let parsed: CredentialsFile = serde_json::from_str(&raw).map_err(|e| {
            AppError::with_source(
                ErrorCode::GcpInvalidCredentials,
                format!("Unsupported credentials file {}", path.display()),
                e,
            )
        })?;

        let (source, project_id) = match parsed {
            CredentialsFile::ServiceAccount(key) => {
                // Reject unusable keys here so resolution can fall back
                EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
                let project = key.project_id.clone();
                (TokenSource::ServiceAccount(key), project)
            }
            CredentialsFile::AuthorizedUser(key) => {
                let project = key.quota_project_id.clone();
                (TokenSource::AuthorizedUser(key), project)
            }
        };

        Ok(Self::new(source, project_id, http, endpoints))
    }

    pub fn kind(&self) -> &'static str {
        self.source.kind()
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Project id or a `GCP_MISSING_PROJECT` error
    pub fn require_project(&self) -> AppResult<&str> {
        self.project_id().ok_or_else(AppError::missing_project)
    }

    fn with_project_fallback(mut self, project: Option<String>) -> Self {
        if self.project_id.is_none() {
            self.project_id = project;
        }
        self
    }

    /// Bearer token, refreshed when missing or close to expiry
    pub async fn access_token(&self) -> AppResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.token.clone());
        }

        let fresh = self.fetch_token().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    async fn fetch_token(&self) -> AppResult<CachedToken> {
        let response = match &self.source {
            TokenSource::Static(token) => {
                return Ok(CachedToken {
                    token: token.clone(),
                    expires_at: None,
                })
            }
            TokenSource::ServiceAccount(key) => {
                let assertion = self.sign_assertion(key)?;
                debug!(client_email = %key.client_email, "Exchanging service account assertion");
                self.http
                    .post(&self.endpoints.token_url)
                    .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
                    .send()
                    .await?
            }
            TokenSource::AuthorizedUser(key) => {
                debug!("Refreshing authorized user token");
                self.http
                    .post(&self.endpoints.token_url)
                    .form(&[
                        ("grant_type", "refresh_token"),
                        ("client_id", key.client_id.as_str()),
                        ("client_secret", key.client_secret.as_str()),
                        ("refresh_token", key.refresh_token.as_str()),
                    ])
                    .send()
                    .await?
            }
            TokenSource::Metadata => {
                debug!("Fetching token from metadata server");
                self.http
                    .get(format!(
                        "{}/computeMetadata/v1/instance/service-accounts/default/token",
                        self.endpoints.metadata_url
                    ))
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await?
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::auth_failed(format!(
                "Token request failed (HTTP {}): {}",
                status,
                body.trim()
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(CachedToken {
            token: token.access_token,
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
        })
    }

    fn sign_assertion(&self, key: &ServiceAccountKey) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &key.client_email,
            scope: GOOGLE_SCOPES.join(" "),
            aud: &self.endpoints.token_url,
            iat: now,
            exp: now + 3600,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = key.private_key_id.clone();

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(&header, &claims, &encoding_key)?)
    }
}

/// Resolves and caches the credentials used by every Google client
pub struct CredentialResolver {
    credentials_path: PathBuf,
    endpoints: GcpEndpoints,
    http: reqwest::Client,
    adc_token: Option<String>,
    adc_file: Option<PathBuf>,
    project_hint: Option<String>,
    resolved: OnceCell<Arc<GcpCredentials>>,
}

impl CredentialResolver {
    pub fn new(credentials_path: PathBuf, endpoints: GcpEndpoints, http: reqwest::Client) -> Self {
        Self {
            credentials_path,
            endpoints,
            http,
            adc_token: None,
            adc_file: None,
            project_hint: None,
            resolved: OnceCell::new(),
        }
    }

    /// Resolver configured from the server config and ADC environment variables
    pub fn from_config(config: &ServerConfig, http: reqwest::Client) -> Self {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        let adc_file = env("CLOUDSDK_CONFIG")
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|dir| dir.join("gcloud")))
            .map(|dir| dir.join("application_default_credentials.json"));

        let mut resolver = Self::new(
            config.credentials_path.clone(),
            config.endpoints.clone(),
            http,
        );
        resolver.adc_token = env("GOOGLE_OAUTH_ACCESS_TOKEN");
        resolver.adc_file = adc_file;
        resolver.project_hint = env("GOOGLE_CLOUD_PROJECT").or_else(|| env("GCLOUD_PROJECT"));
        resolver
    }

    /// Resolver that always yields the given credentials
    pub fn fixed(credentials: GcpCredentials) -> Self {
        let resolver = Self::new(PathBuf::new(), GcpEndpoints::default(), reqwest::Client::new());
        // A fresh cell cannot already be initialised
        let _ = resolver.resolved.set(Arc::new(credentials));
        resolver
    }

    pub fn with_adc_token(mut self, token: Option<String>) -> Self {
        self.adc_token = token;
        self
    }

    pub fn with_adc_file(mut self, path: Option<PathBuf>) -> Self {
        self.adc_file = path;
        self
    }

    pub fn with_project_hint(mut self, project: Option<String>) -> Self {
        self.project_hint = project;
        self
    }

    /// Credentials for this process; failures are retried on the next call
    pub async fn resolve(&self) -> AppResult<Arc<GcpCredentials>> {
        self.resolved
            .get_or_try_init(|| async { self.load().await.map(Arc::new) })
            .await
            .cloned()
    }

    async fn load(&self) -> AppResult<GcpCredentials> {
        if tokio::fs::try_exists(&self.credentials_path).await.unwrap_or(false) {
            info!("🔑 Loading credentials from {}", self.credentials_path.display());
            let loaded = GcpCredentials::from_file(
                &self.credentials_path,
                self.http.clone(),
                self.endpoints.clone(),
            )
            .await;
            match loaded {
                Ok(credentials) => {
                    return Ok(credentials.with_project_fallback(self.project_hint.clone()))
                }
                Err(e) => {
                    warn!(
                        "Could not load credentials from {}: {}",
                        self.credentials_path.display(),
                        e
                    );
                    warn!("Falling back to Application Default Credentials (ADC)");
                }
            }
        }

        info!("Using Application Default Credentials (ADC)");
        self.application_default().await
    }

    async fn application_default(&self) -> AppResult<GcpCredentials> {
        if let Some(token) = &self.adc_token {
            debug!("ADC: using GOOGLE_OAUTH_ACCESS_TOKEN");
            return Ok(GcpCredentials::new(
                TokenSource::Static(token.clone()),
                self.project_hint.clone(),
                self.http.clone(),
                self.endpoints.clone(),
            ));
        }

        if let Some(path) = &self.adc_file {
            if tokio::fs::try_exists(path).await.unwrap_or(false) {
                debug!("ADC: using {}", path.display());
                let credentials =
                    GcpCredentials::from_file(path, self.http.clone(), self.endpoints.clone())
                        .await?;
                return Ok(credentials.with_project_fallback(self.project_hint.clone()));
            }
        }

        match self.detect_metadata().await {
            Some(metadata_project) => {
                debug!("ADC: using metadata server");
                let project = self.project_hint.clone().or(metadata_project);
                Ok(GcpCredentials::new(
                    TokenSource::Metadata,
                    project,
                    self.http.clone(),
                    self.endpoints.clone(),
                ))
            }
            None => Err(AppError::auth_failed(
                "Could not automatically determine credentials. Provide a credentials file, \
                 set GOOGLE_APPLICATION_CREDENTIALS, or run on Google Cloud.",
            )),
        }
    }

    /// `Some(project)` when a metadata server answers
    async fn detect_metadata(&self) -> Option<Option<String>> {
        let response = self
            .http
            .get(format!("{}/computeMetadata/v1/project/project-id", self.endpoints.metadata_url))
            .header("Metadata-Flavor", "Google")
            .timeout(Duration::from_secs(METADATA_CHECK_TIMEOUT_SECS))
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }
        let project = response.text().await.ok().map(|p| p.trim().to_string());
        Some(project.filter(|p| !p.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_token_freshness() {
        let now = Utc::now();
        let fresh = CachedToken {
            token: "a".into(),
            expires_at: Some(now + ChronoDuration::seconds(3600)),
        };
        let stale = CachedToken {
            token: "b".into(),
            expires_at: Some(now + ChronoDuration::seconds(30)),
        };
        let forever = CachedToken {
            token: "c".into(),
            expires_at: None,
        };
        assert!(fresh.is_fresh(now));
        assert!(!stale.is_fresh(now));
        assert!(forever.is_fresh(now));
    }

    #[test]
    fn test_credentials_file_type_tag() {
        let user = r#"{"type":"authorized_user","client_id":"id","client_secret":"s",
            "refresh_token":"r"}"#;
        assert!(matches!(
            serde_json::from_str::<CredentialsFile>(user),
            Ok(CredentialsFile::AuthorizedUser(_))
        ));

        let external = r#"{"type":"external_account","audience":"x"}"#;
        assert!(serde_json::from_str::<CredentialsFile>(external).is_err());
    }

    #[tokio::test]
    async fn test_static_token_is_returned() {
        let creds = GcpCredentials::from_static_token("ya29.test", Some("demo-project".into()));
        assert_eq!(creds.access_token().await.unwrap(), "ya29.test");
        assert_eq!(creds.require_project().unwrap(), "demo-project");
        assert_eq!(creds.kind(), "static");
    }

    #[tokio::test]
    async fn test_missing_project_is_an_error() {
        let creds = GcpCredentials::from_static_token("ya29.test", None);
        let err = creds.require_project().unwrap_err();
        assert_eq!(err.code, ErrorCode::GcpMissingProject);
    }

    #[tokio::test]
    async fn test_fixed_resolver() {
        let resolver = CredentialResolver::fixed(GcpCredentials::from_static_token("t", None));
        let creds = resolver.resolve().await.unwrap();
        assert_eq!(creds.kind(), "static");
    }
}
