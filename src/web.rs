// src/web.rs
use crate::engine::ScanEngine;
use crate::sink::EventSink;
use crate::types::{ScanEvent, ScanSettings, SubprobeError};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::services::ServeDir;

const EVENT_BUFFER: usize = 1024;

#[derive(Clone)]
pub struct AppState {
    engine: Arc<ScanEngine>,
    events: broadcast::Sender<ScanEvent>,
    wordlist: PathBuf,
}

impl AppState {
    pub fn new(engine: Arc<ScanEngine>, wordlist: PathBuf) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            engine,
            events,
            wordlist,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    domain: String,
    #[serde(default)]
    threads: String,
}

pub fn router(state: AppState, static_dir: PathBuf) -> Router {
    Router::new()
        .route("/echo", get(echo_handler))
        .route("/scan", post(scan_handler))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

pub async fn serve(engine: Arc<ScanEngine>, wordlist: PathBuf, port: u16) -> Result<(), SubprobeError> {
    let config = engine.config().server.clone();
    let addr = format!("{}:{}", config.host, port);
    let app = router(AppState::new(engine, wordlist), config.static_dir);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SubprobeError::ServerError(format!("Failed to bind {}: {}", addr, e)))?;

    info!("Web UI running on http://{}", addr);
    axum::serve(listener, app)
        .await
        .map_err(|e| SubprobeError::ServerError(e.to_string()))
}

/// Start a scan in the background; its events go to every `/echo` client.
async fn scan_handler(State(state): State<AppState>, Form(request): Form<ScanRequest>) -> Response {
    let workers = match request.threads.trim().parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "threads must be a positive integer" })),
            )
                .into_response()
        }
    };

    let sync_id = uuid::Uuid::new_v4().to_string();
    let settings = ScanSettings::new(&request.domain, state.wordlist.clone(), workers).with_sync_id(&sync_id);
    if let Err(e) = settings.validate() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() }))).into_response();
    }

    info!("Scan {} requested for {} with {} workers", sync_id, settings.domain, workers);
    let sink = EventSink::broadcast(state.events.clone(), Some(sync_id.clone()));
    let engine = state.engine.clone();
    tokio::spawn(async move {
        if let Err(e) = engine.run(&settings, sink.clone()).await {
            error!("Scan {} failed: {}", settings.sync_id.as_deref().unwrap_or("-"), e);
            sink.error(e.to_string());
        }
    });

    (StatusCode::ACCEPTED, Json(json!({ "sync_id": sync_id }))).into_response()
}

async fn echo_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_events(socket, state.events.subscribe()))
}

async fn stream_events(socket: WebSocket, mut events: broadcast::Receiver<ScanEvent>) {
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Failed to serialize event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("WebSocket client lagged, {} events skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!("WebSocket error: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Probe;
    use crate::resolver::DnsLookup;
    use crate::session::Session;
    use crate::types::{Config, EventKind, ProbeStatus};
    use async_trait::async_trait;
    use std::io::Write;
    use std::net::IpAddr;
    use std::time::Duration;

    struct NoDns;

    #[async_trait]
    impl DnsLookup for NoDns {
        async fn lookup_cname(&self, name: &str) -> Result<String, SubprobeError> {
            Err(SubprobeError::ResolutionError(name.to_string()))
        }

        async fn lookup_addresses(&self, name: &str) -> Result<Vec<IpAddr>, SubprobeError> {
            Err(SubprobeError::ResolutionError(name.to_string()))
        }
    }

    struct NoProbe;

    #[async_trait]
    impl Probe for NoProbe {
        async fn probe(&self, _host: &str) -> Result<ProbeStatus, SubprobeError> {
            Ok(ProbeStatus::Unreachable)
        }
    }

    fn state(wordlist: PathBuf) -> AppState {
        let mut config = Config::default();
        config.aggregator.enabled = false;
        let session = Session::new(&config).unwrap();
        let engine = ScanEngine::with_components(config, session, Arc::new(NoDns), Arc::new(NoProbe));
        AppState::new(Arc::new(engine), wordlist)
    }

    #[tokio::test]
    async fn test_scan_rejects_bad_threads() {
        let response = scan_handler(
            State(state(PathBuf::from("wordlist.txt"))),
            Form(ScanRequest {
                domain: "example.com".to_string(),
                threads: "zero".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_scan_rejects_bad_domain() {
        let response = scan_handler(
            State(state(PathBuf::from("wordlist.txt"))),
            Form(ScanRequest {
                domain: String::new(),
                threads: "4".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_scan_events_are_tagged_and_broadcast() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "www").unwrap();

        let state = state(file.path().to_path_buf());
        let mut events = state.events.subscribe();

        let response = scan_handler(
            State(state.clone()),
            Form(ScanRequest {
                domain: "example.com".to_string(),
                threads: "2".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, EventKind::Done);
        assert!(event.sync_id.is_some());
    }
}
