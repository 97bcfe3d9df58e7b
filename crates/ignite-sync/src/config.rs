//! Export service configuration loaded from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Socket address for the HTTP API.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Chat database to read. Opened read-only per request.
    /// Env: `DATABASE_PATH`
    /// Default: the client's platform default location.
    pub database_path: Option<PathBuf>,

    /// Target spreadsheet.
    /// Env: `SPREADSHEET_ID`
    pub spreadsheet_id: Option<String>,

    /// Env: `SHEET_NAME`
    /// Default: `Sheet1`
    pub sheet_name: String,

    /// Service-account JSON key; a bearer token is minted from it per sync.
    /// Env: `GOOGLE_SERVICE_ACCOUNT_KEY`
    pub service_account_key: Option<String>,

    /// Pre-issued OAuth bearer token with the spreadsheets scope. Takes
    /// precedence over the service-account key.
    /// Env: `GOOGLE_ACCESS_TOKEN`
    pub access_token: Option<String>,

    /// Env: `SHEETS_API_BASE`
    /// Default: `https://sheets.googleapis.com`
    pub sheets_api_base: String,

    /// Number of most recent messages exported.
    /// Env: `SYNC_MESSAGE_LIMIT`
    /// Default: `100`
    pub message_limit: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            database_path: None,
            spreadsheet_id: None,
            sheet_name: "Sheet1".to_string(),
            service_account_key: None,
            access_token: None,
            sheets_api_base: "https://sheets.googleapis.com".to_string(),
            message_limit: 100,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = Some(PathBuf::from(path));
        }

        config.spreadsheet_id = lookup("SPREADSHEET_ID").filter(|s| !s.trim().is_empty());
        config.service_account_key =
            lookup("GOOGLE_SERVICE_ACCOUNT_KEY").filter(|s| !s.trim().is_empty());
        config.access_token = lookup("GOOGLE_ACCESS_TOKEN").filter(|s| !s.trim().is_empty());

        if let Some(name) = lookup("SHEET_NAME").filter(|s| !s.trim().is_empty()) {
            config.sheet_name = name;
        }

        if let Some(base) = lookup("SHEETS_API_BASE") {
            config.sheets_api_base = base.trim_end_matches('/').to_string();
        }

        if let Some(val) = lookup("SYNC_MESSAGE_LIMIT") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.message_limit = n,
                _ => tracing::warn!(value = %val, "Invalid SYNC_MESSAGE_LIMIT, using default"),
            }
        }

        config
    }

    pub fn has_credentials(&self) -> bool {
        self.access_token.is_some() || self.service_account_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert_eq!(config.sheet_name, "Sheet1");
        assert_eq!(config.message_limit, 100);
        assert!(config.access_token.is_none());
        assert!(!config.has_credentials());
    }

    #[test]
    fn test_from_lookup() {
        let config = SyncConfig::from_lookup(|key| match key {
            "HTTP_ADDR" => Some("127.0.0.1:9000".into()),
            "SPREADSHEET_ID" => Some("sheet-123".into()),
            "GOOGLE_ACCESS_TOKEN" => Some("  ".into()),
            "GOOGLE_SERVICE_ACCOUNT_KEY" => Some("{\"client_email\":\"x\"}".into()),
            "SHEETS_API_BASE" => Some("http://localhost:1234/".into()),
            "SYNC_MESSAGE_LIMIT" => Some("zero".into()),
            _ => None,
        });
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.spreadsheet_id.as_deref(), Some("sheet-123"));
        assert!(config.access_token.is_none());
        assert!(config.has_credentials());
        assert_eq!(config.sheets_api_base, "http://localhost:1234");
        assert_eq!(config.message_limit, 100);
    }
}
