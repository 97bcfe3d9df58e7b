use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::Method,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use ignite_store::Database;

use crate::auth::{self, ServiceAccountKey};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::export;
use crate::sheets::{range_for, SheetsClient};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SyncConfig>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/sync-to-sheets", post(sync_to_sheets))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SyncResponse {
    success: bool,
    updated_cells: Option<u64>,
    message_count: usize,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn sync_to_sheets(State(state): State<AppState>) -> Result<Json<SyncResponse>, SyncError> {
    let config = &state.config;
    if !config.has_credentials() {
        return Err(SyncError::Config(
            "neither GOOGLE_SERVICE_ACCOUNT_KEY nor GOOGLE_ACCESS_TOKEN is set".into(),
        ));
    }
    let spreadsheet_id = config
        .spreadsheet_id
        .as_deref()
        .ok_or_else(|| SyncError::Config("SPREADSHEET_ID is not set".into()))?;
    let token = access_token(&state).await?;
    let sheets = SheetsClient::new(state.http.clone(), &config.sheets_api_base, token)?;

    let path = database_path(config)?;
    let limit = config.message_limit;
    let (rows, message_count) =
        tokio::task::spawn_blocking(move || export::snapshot(&path, limit))
            .await
            .map_err(|e| SyncError::Internal(e.to_string()))??;

    let range = range_for(&config.sheet_name, rows.len());
    let result = sheets.update_values(spreadsheet_id, &range, &rows).await?;

    info!(
        messages = message_count,
        cells = ?result.updated_cells,
        range = %range,
        "synced to sheets"
    );
    Ok(Json(SyncResponse {
        success: true,
        updated_cells: result.updated_cells,
        message_count,
    }))
}

async fn access_token(state: &AppState) -> Result<String, SyncError> {
    let config = &state.config;
    if let Some(token) = &config.access_token {
        return Ok(token.clone());
    }
    let raw = config
        .service_account_key
        .as_deref()
        .ok_or_else(|| SyncError::Config("GOOGLE_SERVICE_ACCOUNT_KEY is not set".into()))?;
    let key = ServiceAccountKey::from_json(raw)?;
    auth::fetch_access_token(&state.http, &key).await
}

fn database_path(config: &SyncConfig) -> Result<PathBuf, SyncError> {
    match &config.database_path {
        Some(path) => Ok(path.clone()),
        None => Ok(Database::default_path()?),
    }
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::body::{to_bytes, Body};
    use axum::extract::Path;
    use axum::http::{HeaderMap, Request, StatusCode};
    use axum::routing::put;
    use serde_json::Value;
    use tower::ServiceExt;

    use ignite_shared::{RoomVisibility, UserName};
    use ignite_store::{NewMessage, NewRoom, Store};

    use super::*;

    #[derive(Default)]
    struct Captured {
        range: Option<String>,
        auth: Option<String>,
        body: Option<Value>,
    }

    async fn read_json(resp: axum::response::Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Local stand-in for the Sheets API and the token endpoint.
    async fn spawn_fake_sheets(captured: Arc<Mutex<Captured>>) -> String {
        let app = auth::tests::token_route("ya29.minted", Arc::new(Mutex::new(None))).route(
            "/v4/spreadsheets/:id/values/:range",
            put(
                move |Path((_id, range)): Path<(String, String)>,
                      headers: HeaderMap,
                      Json(body): Json<Value>| async move {
                    let rows = body["values"].as_array().map(|v| v.len()).unwrap_or(0);
                    let mut c = captured.lock().unwrap();
                    c.range = Some(range);
                    c.auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    c.body = Some(body);
                    Json(serde_json::json!({ "updatedCells": rows * 5 }))
                },
            ),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn seed(path: &std::path::Path) {
        let alice = UserName::unchecked("alice");
        let store = Store::open_at(path).unwrap();
        let room = store
            .create_room(
                &alice,
                NewRoom {
                    name: "general".into(),
                    visibility: RoomVisibility::Public,
                    owner_name: alice.clone(),
                    session_id: None,
                },
            )
            .unwrap();
        for body in ["hello", "world"] {
            store
                .insert_message(
                    &alice,
                    NewMessage {
                        room_id: room.id,
                        user_name: alice.clone(),
                        body: body.into(),
                        media: None,
                    },
                )
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = build_router(AppState::new(SyncConfig::default()));
        let resp = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = read_json(resp).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_token_is_a_500() {
        let app = build_router(AppState::new(SyncConfig::default()));
        let resp = app
            .oneshot(Request::post("/sync-to-sheets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(resp).await;
        let error = body["error"].as_str().unwrap();
        assert!(error.contains("GOOGLE_SERVICE_ACCOUNT_KEY"));
        assert!(error.contains("GOOGLE_ACCESS_TOKEN"));
    }

    #[tokio::test]
    async fn test_sync_to_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("chat.db");
        seed(&db_path);

        let captured = Arc::new(Mutex::new(Captured::default()));
        let base = spawn_fake_sheets(Arc::clone(&captured)).await;

        let config = SyncConfig {
            database_path: Some(db_path),
            spreadsheet_id: Some("sheet-1".into()),
            access_token: Some("secret".into()),
            sheets_api_base: base,
            ..SyncConfig::default()
        };
        let app = build_router(AppState::new(config));
        let resp = app
            .oneshot(Request::post("/sync-to-sheets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = read_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["messageCount"], 2);
        assert_eq!(body["updatedCells"], 15);

        let captured = captured.lock().unwrap();
        assert_eq!(captured.range.as_deref(), Some("Sheet1!A1:E3"));
        assert_eq!(captured.auth.as_deref(), Some("Bearer secret"));
        let values = &captured.body.as_ref().unwrap()["values"];
        assert_eq!(values[0][0], "Room Name");
        assert_eq!(values[1][0], "general");
        assert_eq!(values[1][2], "world");
        assert_eq!(values[2][2], "hello");
    }

    #[tokio::test]
    async fn test_sync_with_service_account_key() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("chat.db");
        seed(&db_path);

        let captured = Arc::new(Mutex::new(Captured::default()));
        let base = spawn_fake_sheets(Arc::clone(&captured)).await;
        let key = serde_json::json!({
            "type": "service_account",
            "client_email": "exporter@ignite.iam.gserviceaccount.com",
            "private_key": auth::tests::TEST_PRIVATE_KEY,
            "token_uri": format!("{base}/token"),
        });

        let config = SyncConfig {
            database_path: Some(db_path),
            spreadsheet_id: Some("sheet-1".into()),
            service_account_key: Some(key.to_string()),
            sheets_api_base: base,
            ..SyncConfig::default()
        };
        let app = build_router(AppState::new(config));
        let resp = app
            .oneshot(Request::post("/sync-to-sheets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(read_json(resp).await["messageCount"], 2);

        let captured = captured.lock().unwrap();
        assert_eq!(captured.auth.as_deref(), Some("Bearer ya29.minted"));
    }

    #[tokio::test]
    async fn test_malformed_service_account_key_is_a_500() {
        let config = SyncConfig {
            spreadsheet_id: Some("sheet-1".into()),
            service_account_key: Some("not json".into()),
            ..SyncConfig::default()
        };
        let app = build_router(AppState::new(config));
        let resp = app
            .oneshot(Request::post("/sync-to-sheets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("Service account key"));
    }
}
