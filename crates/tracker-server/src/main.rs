use application::TrackerApp;
use axum::{
    extract::{ConnectInfo, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use domain::{DomainError, FileDeclaration, TrackerService};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

mod config;
use config::Config;

#[derive(Clone)]
struct AppState {
    tracker: Arc<TrackerService>,
}

#[derive(Debug, Deserialize)]
struct AnnounceRequest {
    ip: Option<String>,
    port: Option<u16>,
    #[serde(default)]
    files: Vec<FileDeclaration>,
}

#[derive(Debug, Deserialize)]
struct RegisterFileRequest {
    #[serde(default)]
    file_name: String,
    #[serde(default)]
    file_hash: String,
    #[serde(default)]
    piece_length: i32,
    #[serde(default)]
    total_pieces: i32,
    #[serde(default)]
    piece_hashes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PeersQuery {
    file_hash: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "tracker_server=debug,tower_http=debug".to_string()),
        )
        .init();

    let config = Config::from_env();
    info!("Using database: {}", config.database_path);

    let app_state = AppState {
        tracker: TrackerApp::new(&config.database_path, config.activity_window())
            .map_err(|e| anyhow::anyhow!("failed to initialize tracker: {e}"))?
            .tracker_service,
    };

    let app = Router::new()
        .route("/announce", post(announce))
        .route("/upload", post(upload))
        .route("/files", get(list_files).post(register_file))
        .route("/peers", get(get_peers))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let bind_address = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Tracker listening on http://{}", bind_address);
    info!("   POST /announce - declare a peer's address and pieces");
    info!("   POST /upload   - declare pieces for registered files");
    info!("   POST /files    - register a file and its piece hashes");
    info!("   GET  /files    - list registered files");
    info!("   GET  /peers    - piece availability for one file hash");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

async fn announce(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Json(payload): Json<AnnounceRequest>,
) -> Response {
    let Some(port) = payload.port else {
        return error_response(&DomainError::ValidationError("Port is required".to_string()));
    };
    // The peer may announce an explicit address (e.g. behind a proxy);
    // otherwise the connecting socket's address is what other peers
    // can reach it on.
    let ip = payload
        .ip
        .unwrap_or_else(|| remote.ip().to_string());

    match state.tracker.announce(&ip, port, &payload.files).await {
        Ok(()) => Json(serde_json::json!({"status": "success"})).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn upload(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    Json(payload): Json<AnnounceRequest>,
) -> Response {
    let (Some(port), false) = (payload.port, payload.files.is_empty()) else {
        return error_response(&DomainError::ValidationError(
            "Port and files are required".to_string(),
        ));
    };
    let ip = payload
        .ip
        .unwrap_or_else(|| remote.ip().to_string());

    match state.tracker.announce(&ip, port, &payload.files).await {
        Ok(()) => {
            Json(serde_json::json!({"status": "files registered successfully"})).into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn register_file(
    State(state): State<AppState>,
    Json(payload): Json<RegisterFileRequest>,
) -> Response {
    match state
        .tracker
        .register_file(
            &payload.file_name,
            &payload.file_hash,
            payload.piece_length,
            payload.total_pieces,
            &payload.piece_hashes,
        )
        .await
    {
        Ok(registered) => {
            let status = if registered.created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            (status, Json(registered.file)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

async fn list_files(State(state): State<AppState>) -> Response {
    match state.tracker.list_files().await {
        Ok(files) => Json(files).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn get_peers(State(state): State<AppState>, Query(query): Query<PeersQuery>) -> Response {
    let Some(file_hash) = query.file_hash else {
        return error_response(&DomainError::ValidationError(
            "file_hash is required".to_string(),
        ));
    };

    match state.tracker.peers_for_piece(&file_hash).await {
        Ok(swarm) => Json(swarm).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({"status": "healthy"}))
}

fn error_response(error: &DomainError) -> Response {
    let status = match error {
        DomainError::ValidationError(_) => StatusCode::BAD_REQUEST,
        DomainError::FileNotFoundByHash(_) | DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({"error": error.to_string()}))).into_response()
}
