//! Background image and needle loading.
//!
//! Sources are either local paths or `http(s)` URLs. Loads run on worker
//! threads and report back through a channel; every request carries a
//! [`LoadToken`] so results of superseded requests can be told apart.

use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::error::{NeedleError, Result};
use crate::needle::Needle;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Path(PathBuf),
    Url(String),
}

impl Source {
    pub fn parse(text: &str) -> Self {
        if text.starts_with("http://") || text.starts_with("https://") {
            Source::Url(text.to_string())
        } else {
            Source::Path(PathBuf::from(text))
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(path) => write!(f, "{}", path.display()),
            Source::Url(url) => f.write_str(url),
        }
    }
}

/// Fetch raw bytes with an HTTP-like status. A missing file is a 404.
pub fn fetch_bytes(source: &Source) -> Result<(u16, Vec<u8>)> {
    match source {
        Source::Path(path) => match std::fs::read(path) {
            Ok(bytes) => Ok((200, bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok((404, Vec::new())),
            Err(err) => Err(err.into()),
        },
        Source::Url(url) => {
            let client = reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()?;
            let response = client.get(url).send()?;
            let status = response.status().as_u16();
            let bytes = response.bytes()?;
            Ok((status, bytes.to_vec()))
        }
    }
}

pub fn fetch_needle(source: &Source) -> Result<Needle> {
    let (status, body) = fetch_bytes(source)?;
    debug!(%source, status, "needle fetched");
    Needle::from_response(status, &String::from_utf8_lossy(&body))
}

pub fn fetch_image(source: &Source) -> Result<RgbaImage> {
    let (status, body) = fetch_bytes(source)?;
    if !(200..300).contains(&status) {
        return Err(NeedleError::Status(status));
    }
    Ok(image::load_from_memory(&body)?.to_rgba8())
}

// ── Generations ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadKind {
    Background,
    Needle,
}

/// Identifies one load request. Only the newest token per kind is current.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadToken {
    pub kind: LoadKind,
    pub generation: u64,
}

#[derive(Debug, Default)]
pub struct LoadTracker {
    background: u64,
    needle: u64,
}

impl LoadTracker {
    /// Start a new request of `kind`, invalidating every earlier one.
    pub fn begin(&mut self, kind: LoadKind) -> LoadToken {
        let counter = match kind {
            LoadKind::Background => &mut self.background,
            LoadKind::Needle => &mut self.needle,
        };
        *counter += 1;
        LoadToken {
            kind,
            generation: *counter,
        }
    }

    pub fn is_current(&self, token: LoadToken) -> bool {
        let current = match token.kind {
            LoadKind::Background => self.background,
            LoadKind::Needle => self.needle,
        };
        token.generation == current
    }
}

// ── Worker threads ──────────────────────────────────────────────────────────

pub enum Loaded {
    Background(Result<RgbaImage>),
    Needle(Result<Needle>),
}

pub struct Completed {
    pub token: LoadToken,
    pub loaded: Loaded,
}

type Waker = Arc<dyn Fn() + Send + Sync>;

pub struct Loader {
    tx: Sender<Completed>,
    rx: Receiver<Completed>,
    waker: Option<Waker>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx, waker: None }
    }

    /// Called from the worker after each completed load, e.g. to request a repaint.
    pub fn with_waker(mut self, waker: impl Fn() + Send + Sync + 'static) -> Self {
        self.waker = Some(Arc::new(waker));
        self
    }

    pub fn spawn_background(&self, token: LoadToken, source: Source) {
        self.spawn(token, move || Loaded::Background(fetch_image(&source)));
    }

    pub fn spawn_needle(&self, token: LoadToken, source: Source) {
        self.spawn(token, move || Loaded::Needle(fetch_needle(&source)));
    }

    fn spawn(&self, token: LoadToken, job: impl FnOnce() -> Loaded + Send + 'static) {
        let tx = self.tx.clone();
        let waker = self.waker.clone();
        info!(?token, "load started");
        thread::spawn(move || {
            let loaded = job();
            if tx.send(Completed { token, loaded }).is_err() {
                warn!(?token, "load finished after the receiver went away");
                return;
            }
            if let Some(wake) = waker {
                wake();
            }
        });
    }

    pub fn try_recv(&self) -> Option<Completed> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Completed> {
        self.rx.recv_timeout(timeout).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::io::Write;

    #[test]
    fn sources_are_told_apart_by_scheme() {
        assert_eq!(
            Source::parse("https://openqa.example/needle.json"),
            Source::Url("https://openqa.example/needle.json".into())
        );
        assert_eq!(Source::parse("needles/a.json"), Source::Path("needles/a.json".into()));
    }

    #[test]
    fn missing_needle_file_is_an_empty_needle() {
        let dir = tempfile::tempdir().unwrap();
        let source = Source::Path(dir.path().join("absent.json"));
        let needle = fetch_needle(&source).unwrap();
        assert_eq!(needle.to_pretty_json().unwrap(), Needle::default().to_pretty_json().unwrap());
    }

    #[test]
    fn needle_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"area": [{{"xpos": 1, "ypos": 2, "width": 10, "height": 10, "type": "exclude"}}], "tags": ["x"]}}"#).unwrap();
        let needle = fetch_needle(&Source::Path(file.path().to_path_buf())).unwrap();
        assert_eq!(needle.area.len(), 1);
        assert_eq!(needle.tags, vec!["x".to_string()]);
    }

    #[test]
    fn missing_image_is_a_status_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = fetch_image(&Source::Path(dir.path().join("absent.png"))).unwrap_err();
        assert!(matches!(err, NeedleError::Status(404)));
    }

    #[test]
    fn image_file_is_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.png");
        RgbaImage::from_pixel(4, 3, Rgba([9, 8, 7, 255])).save(&path).unwrap();
        let img = fetch_image(&Source::Path(path)).unwrap();
        assert_eq!(img.dimensions(), (4, 3));
        assert_eq!(*img.get_pixel(0, 0), Rgba([9, 8, 7, 255]));
    }

    #[test]
    fn newer_token_supersedes_older_one() {
        let mut tracker = LoadTracker::default();
        let first = tracker.begin(LoadKind::Background);
        let needle = tracker.begin(LoadKind::Needle);
        assert!(tracker.is_current(first));
        let second = tracker.begin(LoadKind::Background);
        assert!(!tracker.is_current(first));
        assert!(tracker.is_current(second));
        assert!(tracker.is_current(needle));
    }

    #[test]
    fn worker_reports_through_channel() {
        let dir = tempfile::tempdir().unwrap();
        let loader = Loader::new();
        let mut tracker = LoadTracker::default();
        let token = tracker.begin(LoadKind::Needle);
        loader.spawn_needle(token, Source::Path(dir.path().join("none.json")));
        let done = loader.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(done.token, token);
        assert!(matches!(done.loaded, Loaded::Needle(Ok(_))));
    }
}
