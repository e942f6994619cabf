//! Google Sheets v4 client

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

use super::auth::GcpCredentials;
use super::google::check_response;
use crate::config::GcpEndpoints;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::utils::constants::{NEW_WORKSHEET_COLS, NEW_WORKSHEET_ROWS};

const SERVICE: &str = "Google Sheets";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    #[serde(default)]
    pub sheet_id: i64,
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

pub struct SheetsClient {
    http: reqwest::Client,
    credentials: Arc<GcpCredentials>,
    base_url: String,
}

impl SheetsClient {
    pub fn new(
        http: reqwest::Client,
        credentials: Arc<GcpCredentials>,
        endpoints: &GcpEndpoints,
    ) -> Self {
        Self {
            http,
            credentials,
            base_url: endpoints.sheets_url.trim_end_matches('/').to_string(),
        }
    }

    /// Write `values` to `worksheet` starting at A1, creating the worksheet
    /// if needed and clearing it first when `clear` is set.
    pub async fn upload_values(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
        values: Vec<Vec<Value>>,
        clear: bool,
    ) -> AppResult<()> {
        let sheets = self.list_worksheets(spreadsheet_id).await?;
        if !sheets.iter().any(|s| s.title == worksheet) {
            info!("Worksheet '{}' not found, creating it", worksheet);
            self.add_worksheet(spreadsheet_id, worksheet).await?;
        }

        let range = quote_sheet_title(worksheet);
        if clear {
            self.clear_range(spreadsheet_id, &range).await?;
        }
        self.update_values(spreadsheet_id, &format!("{}!A1", range), values).await
    }

    pub async fn list_worksheets(&self, spreadsheet_id: &str) -> AppResult<Vec<SheetProperties>> {
        let token = self.credentials.access_token().await?;
        let response = self
            .http
            .get(self.url(&[spreadsheet_id])?)
            .query(&[("fields", "sheets.properties(sheetId,title)")])
            .bearer_auth(token)
            .send()
            .await?;
        let spreadsheet: Spreadsheet = check_response(response, ErrorCode::GcpSheets, SERVICE)
            .await?
            .json()
            .await?;
        Ok(spreadsheet.sheets.into_iter().map(|s| s.properties).collect())
    }

    pub async fn add_worksheet(&self, spreadsheet_id: &str, title: &str) -> AppResult<()> {
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": title,
                        "gridProperties": {
                            "rowCount": NEW_WORKSHEET_ROWS,
                            "columnCount": NEW_WORKSHEET_COLS,
                        }
                    }
                }
            }]
        });
        let token = self.credentials.access_token().await?;
        let response = self
            .http
            .post(self.url(&[format!("{}:batchUpdate", spreadsheet_id).as_str()])?)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        check_response(response, ErrorCode::GcpSheets, SERVICE).await?;
        Ok(())
    }

    pub async fn clear_range(&self, spreadsheet_id: &str, range: &str) -> AppResult<()> {
        debug!(spreadsheet_id, range, "Clearing range");
        let token = self.credentials.access_token().await?;
        let response = self
            .http
            .post(self.url(&[spreadsheet_id, "values", format!("{}:clear", range).as_str()])?)
            .bearer_auth(token)
            .json(&json!({}))
            .send()
            .await?;
        check_response(response, ErrorCode::GcpSheets, SERVICE).await?;
        Ok(())
    }

    pub async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> AppResult<()> {
        debug!(spreadsheet_id, range, rows = values.len(), "Updating values");
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": values,
        });
        let token = self.credentials.access_token().await?;
        let response = self
            .http
            .put(self.url(&[spreadsheet_id, "values", range])?)
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        check_response(response, ErrorCode::GcpSheets, SERVICE).await?;
        Ok(())
    }

    /// `<base>/v4/spreadsheets/<segments...>` with each segment percent-encoded
    fn url(&self, segments: &[&str]) -> AppResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            AppError::with_source(ErrorCode::ConfigInvalidValue, "Invalid Sheets base URL", e)
        })?;
        url.path_segments_mut()
            .map_err(|_| AppError::invalid_config("Sheets base URL cannot have a path"))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(segments);
        Ok(url)
    }
}

/// A1-notation sheet reference: `'Title'` with embedded quotes doubled
pub fn quote_sheet_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}
