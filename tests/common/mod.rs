//! Shared stubs for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use car_dataset::{
    FetchOutcome, ImageFetcher, ImageIOService, SearchClient, SearchError, Sleeper,
};
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::VecDeque;
use std::io::Cursor;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Encode a small gradient image in the given format
pub fn image_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut image = RgbImage::new(width, height);
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let intensity = ((x + y) % 200) as u8;
        *pixel = Rgb([intensity, 128, 255 - intensity]);
    }
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), format)
        .unwrap();
    buffer
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    image_bytes(width, height, ImageFormat::Png)
}

/// Sleeper that records requested durations instead of waiting
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Search client that answers successive calls from a script
///
/// Once the script runs out every call returns an empty result.
#[derive(Debug, Default, Clone)]
pub struct ScriptedSearch {
    responses: Arc<Mutex<VecDeque<Result<Vec<String>, SearchError>>>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSearch {
    pub fn new(responses: Vec<Result<Vec<String>, SearchError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into())),
            queries: Arc::default(),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchClient for ScriptedSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>, SearchError> {
        self.queries.lock().unwrap().push(query.to_string());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(mut locators)) => {
                locators.truncate(limit);
                Ok(locators)
            },
            Some(Err(error)) => Err(error),
            None => Ok(Vec::new()),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Fetcher that writes a generated image unless the locator contains "broken"
#[derive(Debug, Default, Clone)]
pub struct StubFetcher {
    requested: Arc<Mutex<Vec<String>>>,
}

impl StubFetcher {
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for StubFetcher {
    async fn fetch_and_save(&self, locator: &str, destination: &Path) -> FetchOutcome {
        self.requested.lock().unwrap().push(locator.to_string());
        if locator.contains("broken") {
            return FetchOutcome::DecodeFailed("stub refused".to_string());
        }
        let image = RgbImage::from_pixel(8, 8, Rgb([10, 20, 30]));
        match ImageIOService::write_jpeg_atomic(&image, destination, 90) {
            Ok(()) => FetchOutcome::Saved,
            Err(e) => FetchOutcome::WriteFailed(e.to_string()),
        }
    }
}

/// Canned HTTP response
#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
    /// Send the headers, then hold the connection open without a body
    pub stall: bool,
}

impl StubResponse {
    pub fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.into(),
            stall: false,
        }
    }

    /// Headers announcing an image body that never arrives
    pub fn stalled() -> Self {
        Self {
            status: 200,
            content_type: "image/png",
            body: vec![0; 1024],
            stall: true,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: Vec::new(),
            stall: false,
        }
    }
}

type Handler = Arc<dyn Fn(&str) -> StubResponse + Send + Sync>;

/// Minimal HTTP/1.1 server answering GET requests from a handler
///
/// The handler receives the request target (path and query string).
pub struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&str) -> StubResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests: Arc<Mutex<Vec<String>>> = Arc::default();
        let handler: Handler = Arc::new(handler);

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                let handler = Arc::clone(&handler);
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let mut buffer = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buffer.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&buffer);
                    let target = head
                        .lines()
                        .next()
                        .and_then(|line| line.split_whitespace().nth(1))
                        .unwrap_or("/")
                        .to_string();
                    log.lock().unwrap().push(target.clone());

                    let response = handler(&target);
                    let header = format!(
                        "HTTP/1.1 {} Stub\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        response.status,
                        response.content_type,
                        response.body.len()
                    );
                    let _ = stream.write_all(header.as_bytes()).await;
                    if response.stall {
                        let _ = stream.flush().await;
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        return;
                    }
                    let _ = stream.write_all(&response.body).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Request targets seen so far, in arrival order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}
