//! Google Sheets store, one spreadsheet per relayed answer.
//!
//! Creates the spreadsheet through the Sheets v4 API, writes the content into
//! cell A1, and opens it up through a Drive v3 `anyone/reader` permission.
//! Authentication is a bearer access token obtained outside this process.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::lookup_value;
use crate::error::{BackendError, ConfigError};
use crate::storage::{DocumentStore, StoredDocument};

const SERVICE: &str = "google-sheets";
const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
const DEFAULT_DRIVE_API_BASE: &str = "https://www.googleapis.com";

/// Cell the content is written to.
const CONTENT_RANGE: &str = "A1";

#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub access_token: Option<SecretString>,
    pub sheets_api_base: String,
    pub drive_api_base: String,
}

impl SheetsConfig {
    pub fn from_lookup<L>(lookup: &L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            access_token: lookup_value(lookup, "GOOGLE_ACCESS_TOKEN").map(SecretString::from),
            sheets_api_base: lookup_value(lookup, "GOOGLE_SHEETS_API_BASE")
                .unwrap_or_else(|| DEFAULT_SHEETS_API_BASE.into()),
            drive_api_base: lookup_value(lookup, "GOOGLE_DRIVE_API_BASE")
                .unwrap_or_else(|| DEFAULT_DRIVE_API_BASE.into()),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSpreadsheetResponse {
    spreadsheet_id: String,
    spreadsheet_url: Option<String>,
}

pub struct GoogleSheetsStore {
    config: SheetsConfig,
    client: reqwest::Client,
}

impl GoogleSheetsStore {
    pub fn new(config: SheetsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn token(&self) -> Result<&SecretString, BackendError> {
        self.config
            .access_token
            .as_ref()
            .ok_or_else(|| BackendError::not_configured(SERVICE, "GOOGLE_ACCESS_TOKEN"))
    }

    fn sheets_url(&self, path: &str) -> String {
        format!("{}/v4/{path}", self.config.sheets_api_base.trim_end_matches('/'))
    }

    fn drive_url(&self, path: &str) -> String {
        format!("{}/drive/v3/{path}", self.config.drive_api_base.trim_end_matches('/'))
    }
}

/// Turn non-2xx responses into `HttpStatus`.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(BackendError::HttpStatus {
        service: SERVICE.into(),
        status: status.as_u16(),
        body: body.chars().take(500).collect(),
    })
}

#[async_trait]
impl DocumentStore for GoogleSheetsStore {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn create_document(
        &self,
        title: &str,
        content: &str,
    ) -> Result<StoredDocument, BackendError> {
        let token = self.token()?;

        let resp = self
            .client
            .post(self.sheets_url("spreadsheets"))
            .bearer_auth(token.expose_secret())
            .json(&serde_json::json!({ "properties": { "title": title } }))
            .send()
            .await
            .map_err(|e| BackendError::request_failed(SERVICE, e))?;

        let created: CreateSpreadsheetResponse = check_status(resp)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::invalid_response(SERVICE, e))?;

        let id = created.spreadsheet_id;
        debug!(spreadsheet_id = %id, "Spreadsheet created");

        let resp = self
            .client
            .put(self.sheets_url(&format!("spreadsheets/{id}/values/{CONTENT_RANGE}")))
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(token.expose_secret())
            .json(&serde_json::json!({
                "range": CONTENT_RANGE,
                "majorDimension": "ROWS",
                "values": [[content]],
            }))
            .send()
            .await
            .map_err(|e| BackendError::request_failed(SERVICE, e))?;
        check_status(resp).await?;

        let url = created
            .spreadsheet_url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| format!("https://docs.google.com/spreadsheets/d/{id}"));

        info!(spreadsheet_id = %id, url = %url, "Content written to spreadsheet");
        Ok(StoredDocument { id, url })
    }

    async fn set_public_readable(&self, id: &str) -> Result<(), BackendError> {
        let token = self.token()?;

        let resp = self
            .client
            .post(self.drive_url(&format!("files/{id}/permissions")))
            .bearer_auth(token.expose_secret())
            .json(&serde_json::json!({ "role": "reader", "type": "anyone" }))
            .send()
            .await
            .map_err(|e| BackendError::request_failed(SERVICE, e))?;
        check_status(resp).await?;

        debug!(spreadsheet_id = %id, "Spreadsheet shared publicly");
        Ok(())
    }
}
