//! Header-keyed rows in a remote spreadsheet.
//!
//! [`SpreadsheetRecorder`] maps `{header: value}` rows onto the live column
//! layout of a sheet. Column order always comes from the sheet's first row,
//! never from the caller.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

use crate::config::{SheetsConfig, DEFAULT_SHEETS_URL};
use crate::error::PipelineError;
use crate::http;

/// Cell values keyed by column header.
pub type SheetRow = HashMap<String, String>;

/// Range read/write primitives of a spreadsheet service.
#[async_trait]
pub trait SheetsBackend: Send + Sync {
    /// Returns the rows of `range`; trailing empty cells may be omitted.
    async fn read_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, PipelineError>;

    /// Overwrites `range` with `values`.
    async fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<String>>,
    ) -> Result<UpdateResponse, PipelineError>;

    /// Appends `values` after the last row of the table at `range`.
    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<String>>,
    ) -> Result<AppendResponse, PipelineError>;
}

#[derive(Serialize)]
struct ValueRangeBody {
    values: Vec<Vec<String>>,
}

#[derive(Deserialize, Debug, Default)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Result of a range write.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    #[serde(default)]
    pub updated_range: Option<String>,
    #[serde(default)]
    pub updated_rows: u32,
    #[serde(default)]
    pub updated_cells: u32,
}

/// Result of an append.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppendResponse {
    #[serde(default)]
    pub table_range: Option<String>,
    #[serde(default)]
    pub updates: UpdateResponse,
}

/// Sheets v4 REST client authenticated with a bearer access token.
#[derive(Clone)]
pub struct GoogleSheetsClient {
    client: reqwest::Client,
    base_url: Url,
}

impl GoogleSheetsClient {
    /// Creates a client against `sheets.googleapis.com`.
    pub fn new(access_token: String) -> Result<Self, PipelineError> {
        Self::new_with_url(access_token, DEFAULT_SHEETS_URL, None)
    }

    /// Creates a client with a custom base URL (e.g., a mock server).
    ///
    /// # Arguments
    ///
    /// * `access_token` - OAuth bearer token with a spreadsheets scope.
    /// * `base_url` - Host the `v4/spreadsheets/...` path is built on.
    /// * `timeout` - Per-request timeout; `None` keeps the reqwest default.
    pub fn new_with_url(
        access_token: String,
        base_url: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, http::bearer(&access_token)?);

        Ok(Self {
            client: http::build_client(headers, timeout)?,
            base_url: http::base_url(base_url)?,
        })
    }

    /// `{base}/v4/spreadsheets/{id}/values/{range}{suffix}`, with each piece
    /// percent-encoded as a single path segment.
    fn values_url(&self, spreadsheet_id: &str, range: &str, suffix: &str) -> Result<Url, PipelineError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PipelineError::Config(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values"])
            .push(&format!("{}{}", range, suffix));
        Ok(url)
    }
}

#[async_trait]
impl SheetsBackend for GoogleSheetsClient {
    async fn read_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, PipelineError> {
        let url = self.values_url(spreadsheet_id, range, "")?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(http::api_error(response).await);
        }
        let range: ValueRange = response.json().await?;
        Ok(range.values)
    }

    async fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<String>>,
    ) -> Result<UpdateResponse, PipelineError> {
        let url = self.values_url(spreadsheet_id, range, "")?;
        let response = self
            .client
            .put(url)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&ValueRangeBody { values })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(http::api_error(response).await);
        }
        Ok(response.json().await?)
    }

    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<String>>,
    ) -> Result<AppendResponse, PipelineError> {
        let url = self.values_url(spreadsheet_id, range, ":append")?;
        let response = self
            .client
            .post(url)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&ValueRangeBody { values })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(http::api_error(response).await);
        }
        Ok(response.json().await?)
    }
}

/// Appends and updates header-keyed rows in one spreadsheet.
pub struct SpreadsheetRecorder<B> {
    backend: B,
    spreadsheet_id: String,
}

impl SpreadsheetRecorder<GoogleSheetsClient> {
    /// Builds a recorder from configuration.
    ///
    /// # Errors
    ///
    /// `PipelineError::MissingApiKey` without an access token, or
    /// `PipelineError::Config` without a spreadsheet id.
    pub fn from_config(
        config: &SheetsConfig,
        timeout: Option<Duration>,
    ) -> Result<Self, PipelineError> {
        let token = config
            .access_token
            .clone()
            .ok_or(PipelineError::MissingApiKey("GOOGLE_SHEETS_ACCESS_TOKEN"))?;
        let spreadsheet_id = config
            .spreadsheet_id
            .clone()
            .ok_or_else(|| PipelineError::Config("SPREADSHEET_ID is not set".into()))?;
        let backend = GoogleSheetsClient::new_with_url(token, &config.base_url, timeout)?;
        Ok(Self::new(backend, spreadsheet_id))
    }
}

impl<B: SheetsBackend> SpreadsheetRecorder<B> {
    /// Wraps `backend` for the spreadsheet `spreadsheet_id`.
    pub fn new(backend: B, spreadsheet_id: impl Into<String>) -> Self {
        Self {
            backend,
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    /// The header row of `sheet_name`, which fixes column order.
    pub async fn headers(&self, sheet_name: &str) -> Result<Vec<String>, PipelineError> {
        let header_range = format!("{}!1:1", sheet_ref(sheet_name));
        let rows = self
            .backend
            .read_range(&self.spreadsheet_id, &header_range)
            .await
            .inspect_err(|e| tracing::error!(sheet = sheet_name, error = %e, "reading headers failed"))?;

        match rows.into_iter().next() {
            Some(headers) if !headers.is_empty() => Ok(headers),
            _ => Err(PipelineError::NoHeaders(sheet_name.to_string())),
        }
    }

    /// Appends one row, ordered by the live header row. Headers absent from
    /// `row` get an empty cell.
    pub async fn add_entry(
        &self,
        row: &SheetRow,
        sheet_name: &str,
    ) -> Result<AppendResponse, PipelineError> {
        let headers = self.headers(sheet_name).await?;
        let values = order_row(&headers, row);
        self.backend
            .append_rows(&self.spreadsheet_id, &sheet_ref(sheet_name), vec![values])
            .await
            .inspect_err(|e| tracing::error!(sheet = sheet_name, error = %e, "appending row failed"))
    }

    /// Overlays `row` onto the last existing row, leaving every other cell
    /// as it was.
    ///
    /// Returns `Ok(None)` when no key of `row` matches a header, in which
    /// case nothing is written. Unknown keys are skipped with a warning.
    ///
    /// # Errors
    ///
    /// `PipelineError::NoHeaders` for an empty sheet, and
    /// `PipelineError::NoDataRows` when only the header row exists.
    pub async fn update_row(
        &self,
        row: &SheetRow,
        sheet_name: &str,
    ) -> Result<Option<UpdateResponse>, PipelineError> {
        let all_rows = self
            .backend
            .read_range(&self.spreadsheet_id, &sheet_ref(sheet_name))
            .await
            .inspect_err(|e| tracing::error!(sheet = sheet_name, error = %e, "reading sheet failed"))?;

        let headers = match all_rows.first() {
            Some(headers) if !headers.is_empty() => headers,
            _ => return Err(PipelineError::NoHeaders(sheet_name.to_string())),
        };
        if all_rows.len() < 2 {
            return Err(PipelineError::NoDataRows(sheet_name.to_string()));
        }
        let last_row_number = all_rows.len();
        let last_row = &all_rows[last_row_number - 1];

        let Some(new_row) = overlay_row(headers, last_row, row) else {
            return Ok(None);
        };

        let update_range = format!("{}!A{}", sheet_ref(sheet_name), last_row_number);
        self.backend
            .write_range(&self.spreadsheet_id, &update_range, vec![new_row])
            .await
            .map(Some)
            .inspect_err(|e| tracing::error!(range = %update_range, error = %e, "updating row failed"))
    }
}

/// `sheet_name` as it must appear in A1 notation. Names made only of ASCII
/// letters, digits and `_` stay bare; anything else is single-quoted with
/// embedded quotes doubled.
fn sheet_ref(sheet_name: &str) -> String {
    if !sheet_name.is_empty()
        && sheet_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        sheet_name.to_string()
    } else {
        format!("'{}'", sheet_name.replace('\'', "''"))
    }
}

/// Values of `row` in header order, with `""` for missing headers.
fn order_row(headers: &[String], row: &SheetRow) -> Vec<String> {
    headers
        .iter()
        .map(|header| row.get(header).cloned().unwrap_or_default())
        .collect()
}

/// `existing` padded to the header width with `row` written over the
/// matching columns, or `None` if nothing matched.
fn overlay_row(headers: &[String], existing: &[String], row: &SheetRow) -> Option<Vec<String>> {
    let mut new_row = existing.to_vec();
    if new_row.len() < headers.len() {
        new_row.resize(headers.len(), String::new());
    }

    let mut updated = false;
    for (header, value) in row {
        match headers.iter().position(|h| h == header) {
            Some(idx) => {
                new_row[idx] = value.clone();
                updated = true;
            }
            None => tracing::warn!(header = %header, "header not found in spreadsheet; skipping"),
        }
    }
    updated.then_some(new_row)
}
