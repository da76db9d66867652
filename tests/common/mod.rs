//! Shared fixtures for integration tests

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use datafetch::config::{Config, HttpSettings};

/// Local file server: `/files/{name}`, `/slow/{millis}/{name}` (delayed
/// response) and `/stall/{millis}/{name}` (first half of the body, then a
/// pause before the rest)
pub struct FileServer {
    base_url: String,
}

impl FileServer {
    pub async fn start(files: &[(&str, &[u8])]) -> Self {
        let files: Arc<HashMap<String, Vec<u8>>> = Arc::new(
            files
                .iter()
                .map(|(name, body)| (name.to_string(), body.to_vec()))
                .collect(),
        );

        let app = Router::new()
            .route("/files/{name}", get(serve_file))
            .route("/slow/{millis}/{name}", get(serve_slow))
            .route("/stall/{millis}/{name}", get(serve_stall))
            .with_state(files);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{address}"),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

async fn serve_file(
    State(files): State<Arc<HashMap<String, Vec<u8>>>>,
    Path(name): Path<String>,
) -> Result<Vec<u8>, StatusCode> {
    files.get(&name).cloned().ok_or(StatusCode::NOT_FOUND)
}

async fn serve_slow(
    State(files): State<Arc<HashMap<String, Vec<u8>>>>,
    Path((millis, name)): Path<(u64, String)>,
) -> Result<Vec<u8>, StatusCode> {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    files.get(&name).cloned().ok_or(StatusCode::NOT_FOUND)
}

async fn serve_stall(
    State(files): State<Arc<HashMap<String, Vec<u8>>>>,
    Path((millis, name)): Path<(u64, String)>,
) -> Result<Body, StatusCode> {
    let mut body = files.get(&name).cloned().ok_or(StatusCode::NOT_FOUND)?;
    let rest = body.split_off(body.len() / 2);

    let head = stream::once(async move { Ok::<_, std::io::Error>(Bytes::from(body)) });
    let tail = stream::once(async move {
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(Bytes::from(rest))
    });
    Ok(Body::from_stream(head.chain(tail)))
}

/// Defaults with a single HTTP attempt so failures are fast
pub fn test_config() -> Config {
    Config {
        http: HttpSettings {
            max_retries: 1,
            connect_timeout_secs: 5,
            request_timeout_secs: 10,
            ..HttpSettings::default()
        },
        ..Config::default()
    }
}

/// Write a minimal md5 bag under `bag`
pub fn write_bag(bag: &std::path::Path, files: &[(&str, &[u8])]) {
    std::fs::create_dir_all(bag.join("data")).unwrap();
    std::fs::write(bag.join("bagit.txt"), "BagIt-Version: 0.97\n").unwrap();

    let mut manifest = String::new();
    for (name, content) in files {
        std::fs::write(bag.join("data").join(name), content).unwrap();
        manifest.push_str(&format!("{:x}  data/{}\n", md5::compute(content), name));
    }
    std::fs::write(bag.join("manifest-md5.txt"), manifest).unwrap();
}

pub fn read_manifest(dir: &std::path::Path) -> Value {
    serde_json::from_slice(&std::fs::read(dir.join("galaxy.json")).unwrap()).unwrap()
}
