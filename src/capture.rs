use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use image::ImageFormat;
use parking_lot::Mutex;
use reqwest::blocking::Client;
use sha1::{Digest, Sha1};

use crate::share;

#[derive(Debug, Clone)]
pub struct Config {
    pub cache_dir: Option<PathBuf>,
    pub workers: usize,
    /// How long the UI waits for a result before reporting the capture as
    /// failed. The page gave its screenshot library the same budget.
    pub timeout: Duration,
    pub http_client: Option<Client>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: None,
            workers: 2,
            timeout: Duration::from_secs(3),
            http_client: None,
        }
    }
}

/// Text snapshot of one card, captured from the rendered view at the moment
/// the share control was activated.
#[derive(Debug, Clone)]
pub struct CardSnapshot {
    pub rank: u32,
    pub title: String,
    pub permalink: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Request {
    /// Produce the shareable artifacts for a card: its permalink QR as a
    /// PNG plus a text snapshot of the card itself.
    Share(CardSnapshot),
    /// Fetch a card's feature image into the cache for the preview modal.
    FeatureImage { rank: u32, url: String },
}

impl Request {
    fn rank(&self) -> u32 {
        match self {
            Request::Share(snapshot) => snapshot.rank,
            Request::FeatureImage { rank, .. } => *rank,
        }
    }
}

#[derive(Debug)]
pub enum Artifact {
    Share {
        png_path: PathBuf,
        text_path: PathBuf,
        data_url: String,
    },
    FeatureImage {
        path: PathBuf,
        media_type: String,
        size_bytes: u64,
    },
}

#[derive(Debug)]
pub struct ResultEntry {
    pub rank: u32,
    pub artifact: Option<Artifact>,
    pub error: Option<anyhow::Error>,
}

struct Job {
    request: Request,
    tx: Sender<ResultEntry>,
}

struct Inner {
    cfg: Config,
    cache_dir: PathBuf,
    client: Client,
    jobs: Sender<Job>,
    stop: Sender<()>,
    inflight: Mutex<HashSet<u32>>,
}

pub struct Manager {
    inner: Arc<Inner>,
    handles: Vec<thread::JoinHandle<()>>,
}

/// Cloneable entry point the UI holds onto; the worker threads stay with
/// the `Manager`.
#[derive(Clone)]
pub struct Handle {
    inner: Arc<Inner>,
}

impl Manager {
    pub fn new(cfg: Config) -> Result<Self> {
        let mut cfg = cfg;
        if cfg.workers == 0 {
            cfg.workers = 2;
        }
        let cache_dir = cfg
            .cache_dir
            .clone()
            .or_else(default_cache_dir)
            .context("capture: cache dir not configured")?;
        fs::create_dir_all(&cache_dir)?;

        let client = if let Some(client) = cfg.http_client.clone() {
            client
        } else {
            Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .context("capture: build http client")?
        };

        let (job_tx, job_rx) = unbounded();
        let (stop_tx, stop_rx) = unbounded();

        let inner = Arc::new(Inner {
            cfg,
            cache_dir,
            client,
            jobs: job_tx,
            stop: stop_tx,
            inflight: Mutex::new(HashSet::new()),
        });

        let mut handles = Vec::new();
        for _ in 0..inner.cfg.workers {
            let rx_jobs = job_rx.clone();
            let rx_stop = stop_rx.clone();
            let worker_inner = inner.clone();
            handles.push(thread::spawn(move || worker_inner.worker(rx_jobs, rx_stop)));
        }

        Ok(Self { inner, handles })
    }

    pub fn handle(&self) -> Handle {
        Handle {
            inner: self.inner.clone(),
        }
    }

    fn shutdown(&mut self) {
        for _ in &self.handles {
            let _ = self.inner.stop.send(());
        }
        while let Some(handle) = self.handles.pop() {
            let _ = handle.join();
        }
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Handle {
    /// Queue a request. Returns `None` when a request for the same card is
    /// already in flight; repeated activations coalesce instead of piling
    /// up concurrent captures.
    pub fn enqueue(&self, request: Request) -> Option<Receiver<ResultEntry>> {
        let rank = request.rank();
        if !self.inner.inflight.lock().insert(rank) {
            return None;
        }
        let (tx, rx) = unbounded();
        if self.inner.jobs.send(Job { request, tx }).is_err() {
            self.inner.inflight.lock().remove(&rank);
            return None;
        }
        Some(rx)
    }

    pub fn timeout(&self) -> Duration {
        self.inner.cfg.timeout
    }
}

impl Inner {
    fn worker(&self, jobs: Receiver<Job>, stop: Receiver<()>) {
        loop {
            crossbeam_channel::select! {
                recv(stop) -> _ => break,
                recv(jobs) -> msg => {
                    match msg {
                        Ok(job) => self.process(job),
                        Err(_) => break,
                    }
                }
            }
        }
    }

    fn process(&self, job: Job) {
        let rank = job.request.rank();
        let result = match self.produce(job.request) {
            Ok(artifact) => ResultEntry {
                rank,
                artifact: Some(artifact),
                error: None,
            },
            Err(err) => {
                tracing::warn!(rank, error = %err, "capture failed");
                ResultEntry {
                    rank,
                    artifact: None,
                    error: Some(err),
                }
            }
        };
        self.inflight.lock().remove(&rank);
        let _ = job.tx.send(result);
    }

    fn produce(&self, request: Request) -> Result<Artifact> {
        match request {
            Request::Share(snapshot) => self.share_card(snapshot),
            Request::FeatureImage { url, .. } => self.fetch_image(&url),
        }
    }

    fn share_card(&self, snapshot: CardSnapshot) -> Result<Artifact> {
        if snapshot.permalink.is_empty() {
            return Err(anyhow!("capture: card has no permalink"));
        }

        let png = share::qr_png(&snapshot.permalink)?;
        let stem = sha1_hex(snapshot.permalink.as_bytes());
        let png_path = self.cache_dir.join(format!("share-{stem}.png"));
        fs::write(&png_path, &png).context("capture: write qr png")?;

        let text_path = self.cache_dir.join(format!("share-{stem}.txt"));
        let mut text = snapshot.lines.join("\n");
        text.push('\n');
        text.push_str(&snapshot.permalink);
        text.push('\n');
        fs::write(&text_path, text).context("capture: write snapshot")?;

        Ok(Artifact::Share {
            png_path,
            text_path,
            data_url: share::data_url(&png),
        })
    }

    fn fetch_image(&self, url: &str) -> Result<Artifact> {
        if url.is_empty() {
            return Err(anyhow!("capture: image url required"));
        }

        let response = self.client.get(url).send().context("capture: download")?;
        if !response.status().is_success() {
            return Err(anyhow!("capture: request failed: {}", response.status()));
        }
        let bytes = response.bytes().context("capture: body")?.to_vec();

        let (media_type, extension) = detect_image_type(&bytes);
        let path = self
            .cache_dir
            .join(format!("img-{}.{extension}", sha1_hex(url.as_bytes())));
        fs::write(&path, &bytes).context("capture: write image")?;

        Ok(Artifact::FeatureImage {
            path,
            media_type,
            size_bytes: bytes.len() as u64,
        })
    }
}

fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("newsdeck"))
}

fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn detect_image_type(bytes: &[u8]) -> (String, String) {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => ("image/jpeg".into(), "jpg".into()),
        Ok(ImageFormat::Png) => ("image/png".into(), "png".into()),
        Ok(ImageFormat::Gif) => ("image/gif".into(), "gif".into()),
        Ok(ImageFormat::WebP) => ("image/webp".into(), "webp".into()),
        _ => ("application/octet-stream".into(), "bin".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn manager(dir: &std::path::Path) -> Manager {
        Manager::new(Config {
            cache_dir: Some(dir.to_path_buf()),
            workers: 1,
            ..Config::default()
        })
        .unwrap()
    }

    fn snapshot(rank: u32, permalink: &str) -> CardSnapshot {
        CardSnapshot {
            rank,
            title: "A story".into(),
            permalink: permalink.into(),
            lines: vec!["A story".into(), "128 points | 42 comments".into()],
        }
    }

    #[test]
    fn share_capture_writes_png_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let rx = manager
            .handle()
            .enqueue(Request::Share(snapshot(1, "https://example.com/p/1")))
            .expect("first request should be accepted");
        let result = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        let artifact = result.artifact.expect("share artifact");
        match artifact {
            Artifact::Share {
                png_path,
                text_path,
                data_url,
            } => {
                assert!(png_path.exists());
                let text = fs::read_to_string(text_path).unwrap();
                assert!(text.contains("128 points"));
                assert!(text.contains("https://example.com/p/1"));
                assert!(data_url.starts_with("data:image/png;base64,"));
            }
            other => panic!("unexpected artifact: {other:?}"),
        }
    }

    #[test]
    fn sponsored_card_without_permalink_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let rx = manager
            .handle()
            .enqueue(Request::Share(snapshot(7, "")))
            .unwrap();
        let result = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(result.artifact.is_none());
        assert!(result.error.is_some());
    }

    #[test]
    fn repeated_activation_for_one_card_coalesces() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let handle = manager.handle();

        // A capture for card 3 is in flight.
        manager.inner.inflight.lock().insert(3);
        assert!(handle
            .enqueue(Request::Share(snapshot(3, "https://example.com/p/3")))
            .is_none());

        // A different card is unaffected.
        let other = handle
            .enqueue(Request::Share(snapshot(4, "https://example.com/p/4")))
            .expect("other card accepted");
        assert!(other.recv_timeout(Duration::from_secs(10)).is_ok());

        manager.inner.inflight.lock().remove(&3);
        let rx = handle
            .enqueue(Request::Share(snapshot(3, "https://example.com/p/3")))
            .expect("guard released");
        assert!(rx.recv_timeout(Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn worker_releases_the_guard_after_completion() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(dir.path());
        let handle = manager.handle();

        let rx = handle
            .enqueue(Request::Share(snapshot(5, "https://example.com/p/5")))
            .unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(10)).is_ok());

        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(rx) = handle.enqueue(Request::Share(snapshot(5, "https://example.com/p/5")))
            {
                assert!(rx.recv_timeout(Duration::from_secs(10)).is_ok());
                break;
            }
            assert!(Instant::now() < deadline, "guard never released");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn timeout_comes_from_the_config() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Manager::new(Config {
            cache_dir: Some(dir.path().to_path_buf()),
            timeout: Duration::from_secs(5),
            ..Config::default()
        })
        .unwrap();
        assert_eq!(manager.handle().timeout(), Duration::from_secs(5));
    }
}
