//! Test fixtures: an in-process HTTP server and canned [`Fetcher`]s

use async_trait::async_trait;
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;

use crate::fetch::{FetchError, FetchFailure, Fetcher};

/// Serves canned bodies keyed by URL; anything else is a 404
pub struct CannedFetcher(pub HashMap<String, Vec<u8>>);

impl CannedFetcher {
    pub fn empty() -> Self {
        Self(HashMap::new())
    }
}

#[async_trait]
impl Fetcher for CannedFetcher {
    async fn fetch(&self, url: &str, dest: &std::path::Path) -> Result<u64, FetchError> {
        let body = self.0.get(url).ok_or_else(|| {
            FetchError::new(
                url,
                FetchFailure::Status {
                    code: 404,
                    reason: "Not Found".to_string(),
                },
            )
        })?;
        tokio::fs::write(dest, body)
            .await
            .map_err(|e| FetchError::new(url, FetchFailure::Write(e)))?;
        Ok(body.len() as u64)
    }
}

/// Writes `partial` to the destination, then hangs for `stall`
pub struct StallingFetcher {
    pub partial: Vec<u8>,
    pub stall: Duration,
}

#[async_trait]
impl Fetcher for StallingFetcher {
    async fn fetch(&self, url: &str, dest: &std::path::Path) -> Result<u64, FetchError> {
        tokio::fs::write(dest, &self.partial)
            .await
            .map_err(|e| FetchError::new(url, FetchFailure::Write(e)))?;
        tokio::time::sleep(self.stall).await;
        Ok(self.partial.len() as u64)
    }
}

#[derive(Clone)]
struct ServerState {
    files: Arc<HashMap<String, Vec<u8>>>,
    hits: Arc<AtomicUsize>,
}

pub struct MockServer {
    base_url: String,
    hits: Arc<AtomicUsize>,
}

impl MockServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Serves `/files/{name}` from `files` and `/status/{code}` as a bare status
pub async fn spawn_server(files: Vec<(&str, Vec<u8>)>) -> MockServer {
    let hits = Arc::new(AtomicUsize::new(0));
    let state = ServerState {
        files: Arc::new(
            files
                .into_iter()
                .map(|(name, body)| (name.to_string(), body))
                .collect(),
        ),
        hits: hits.clone(),
    };

    let app = Router::new()
        .route("/files/{name}", get(serve_file))
        .route("/status/{code}", get(serve_status))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer {
        base_url: format!("http://{address}"),
        hits,
    }
}

async fn serve_file(
    State(state): State<ServerState>,
    Path(name): Path<String>,
) -> Result<Vec<u8>, StatusCode> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    state.files.get(&name).cloned().ok_or(StatusCode::NOT_FOUND)
}

async fn serve_status(State(state): State<ServerState>, Path(code): Path<u16>) -> StatusCode {
    state.hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}
