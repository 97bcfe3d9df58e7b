//! Minimal Google Sheets `values.update` client.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;

#[derive(Serialize)]
struct ValueRange<'a> {
    values: &'a [Vec<String>],
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateValuesResponse {
    #[serde(default)]
    pub updated_cells: Option<u64>,
    #[serde(default)]
    pub updated_range: Option<String>,
}

/// `{sheet}!A1:E{rows}`.
pub fn range_for(sheet: &str, rows: usize) -> String {
    format!("{sheet}!A1:E{rows}")
}

pub struct SheetsClient {
    http: reqwest::Client,
    base: Url,
    token: String,
}

impl SheetsClient {
    pub fn new(http: reqwest::Client, base: &str, token: impl Into<String>) -> Result<Self, SyncError> {
        let base = Url::parse(base)
            .map_err(|e| SyncError::Config(format!("invalid SHEETS_API_BASE {base:?}: {e}")))?;
        Ok(Self {
            http,
            base,
            token: token.into(),
        })
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> Result<Url, SyncError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SyncError::Config("SHEETS_API_BASE cannot be a base URL".into()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", spreadsheet_id, "values", range]);
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        Ok(url)
    }

    /// Overwrite `range` with `values`.
    pub async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<String>],
    ) -> Result<UpdateValuesResponse, SyncError> {
        let url = self.values_url(spreadsheet_id, range)?;
        tracing::debug!(%url, rows = values.len(), "updating sheet");

        let resp = self
            .http
            .put(url)
            .bearer_auth(&self.token)
            .json(&ValueRange { values })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Sheets {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_for() {
        assert_eq!(range_for("Sheet1", 101), "Sheet1!A1:E101");
    }

    #[test]
    fn test_values_url() {
        let client =
            SheetsClient::new(reqwest::Client::new(), "https://sheets.googleapis.com", "t").unwrap();
        let url = client.values_url("abc", "Sheet1!A1:E3").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/Sheet1!A1:E3?valueInputOption=RAW"
        );

        let url = client.values_url("abc", "Chat Log!A1:E2").unwrap();
        assert!(url.path().ends_with("/values/Chat%20Log!A1:E2"));
    }

    #[test]
    fn test_invalid_base() {
        assert!(matches!(
            SheetsClient::new(reqwest::Client::new(), "not a url", "t"),
            Err(SyncError::Config(_))
        ));
    }
}
