//! Test helpers: build an `AppState` over a temporary upload directory and
//! drive the router without a listening socket.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use nobg_service::error::RemovalError;
use nobg_service::removal::BackgroundRemover;
use nobg_service::{routes, AppState, ArtifactStorage, Config};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "nobg-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub storage: Arc<ArtifactStorage>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub fn stored_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.storage.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub fn test_config(temp_dir: &TempDir) -> Config {
    let upload_dir = temp_dir.path().join("uploads");
    Config::from_lookup(|key| match key {
        "UPLOAD_DIR" => Some(upload_dir.to_string_lossy().into_owned()),
        "SECRET_KEY" => Some("integration-test-secret".to_string()),
        "SWEEP_INTERVAL_SECS" => Some("0".to_string()),
        _ => None,
    })
    .unwrap()
}

pub async fn setup_test_app(remover: Arc<dyn BackgroundRemover>) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = test_config(&temp_dir);
    let storage = Arc::new(
        ArtifactStorage::new(&config.upload_dir, config.retention)
            .await
            .expect("Failed to create storage"),
    );
    let router = routes::router(AppState::new(config, storage.clone(), remover));
    TestApp {
        router,
        storage,
        _temp_dir: temp_dir,
    }
}

/// Wraps a remover and counts how often it runs.
pub struct Counting<R> {
    inner: R,
    pub calls: AtomicUsize,
}

impl<R> Counting<R> {
    pub fn new(inner: R) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: BackgroundRemover> BackgroundRemover for Counting<R> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn remove(&self, image: &DynamicImage) -> Result<DynamicImage, RemovalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(image).await
    }
}

/// Remote stand-in that answers every request with `status`.
pub async fn stub_remote(status: u16) -> String {
    let app = Router::new().route(
        "/remove",
        axum::routing::post(move || async move { axum::http::StatusCode::from_u16(status).unwrap() }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/remove", addr)
}

pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// A white image with a dark square in the middle, encoded as `format`.
pub fn sample_image(format: ImageFormat) -> Vec<u8> {
    let mut img = RgbImage::from_pixel(16, 16, Rgb([250, 250, 250]));
    for y in 5..11 {
        for x in 5..11 {
            img.put_pixel(x, y, Rgb([30, 60, 90]));
        }
    }
    nobg_service::codec::encode(&DynamicImage::ImageRgb8(img), format).unwrap()
}

pub enum Part<'a> {
    File {
        name: &'a str,
        file_name: &'a str,
        bytes: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File { name, file_name, bytes } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes());
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(parts: &[Part<'_>], json: bool) -> Request<Body> {
    let body = multipart_body(parts);
    let mut builder = Request::post("/remove-bg")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .header(header::CONTENT_LENGTH, body.len());
    if json {
        builder = builder.header(header::ACCEPT, "application/json");
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
