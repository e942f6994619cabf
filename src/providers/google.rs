//! Shared plumbing for Google REST APIs

use serde::Deserialize;
use std::time::Duration;

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::USER_AGENT;

/// Default per-request timeout for Google API calls
pub const GOOGLE_API_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// HTTP client used for every outbound Google call
pub fn build_http_client() -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(GOOGLE_API_TIMEOUT_SECS))
        .build()
        .map_err(|e| {
            AppError::with_source(ErrorCode::ConfigInvalidValue, "Could not build HTTP client", e)
        })
}

/// Pass 2xx responses through; turn anything else into an `AppError`
/// carrying Google's error message.
pub async fn check_response(
    response: reqwest::Response,
    code: ErrorCode,
    service: &str,
) -> AppResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<GoogleErrorBody>(&body)
        .map(|b| match b.error.status {
            Some(s) => format!("{} ({})", b.error.message, s),
            None => b.error.message,
        })
        .unwrap_or_else(|_| body.trim().to_string());

    let code = if status.as_u16() == 429 {
        ErrorCode::GcpRateLimited
    } else {
        code
    };

    Err(AppError::new(
        code,
        format!("{} returned HTTP {}: {}", service, status.as_u16(), detail),
    ))
}
