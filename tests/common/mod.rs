//! In-test collaborators for the importer.
//!
//! Remote sources, manifest fetches and duration probes are replaced with
//! fakes; embedded assets and local files go through the real adapters
//! against a temporary directory.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lessonkit::adapters::{
    extension_of, AcquiredFile, AcquisitionAdapters, AcquisitionError, Acquirer, DurationProber,
    EmbeddedAcquirer, FetchedDocument, LocalFileAcquirer, ManifestFetcher, SourceDescriptor,
};
use lessonkit::core::{ImportProgress, Importer, ProgressReporter};
use lessonkit::domain::SourceType;
use lessonkit::library::FileLibrary;
use reqwest::Url;
use tempfile::{NamedTempFile, TempDir};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;

/// What the fake server does for a URL
#[derive(Debug, Clone)]
pub enum Remote {
    Audio(Vec<u8>),
    /// Audio whose staged file carries `extension` instead of the URL's
    AudioAs(Vec<u8>, &'static str),
    Status(u16),
}

/// Serves canned responses; unknown URLs are 404s
pub struct FakeRemote {
    staging: PathBuf,
    responses: Mutex<HashMap<String, Remote>>,
    manifests: Mutex<HashMap<String, Vec<u8>>>,
    pub calls: AtomicUsize,
    /// Trip the caller's token right after a successful download
    cancel_after_acquire: bool,
}

impl FakeRemote {
    pub fn new(staging: PathBuf) -> Self {
        std::fs::create_dir_all(&staging).unwrap();
        Self {
            staging,
            responses: Mutex::new(HashMap::new()),
            manifests: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            cancel_after_acquire: false,
        }
    }

    pub fn cancelling(mut self) -> Self {
        self.cancel_after_acquire = true;
        self
    }

    pub fn serve(&self, url: &str, response: Remote) {
        self.responses.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn serve_manifest(&self, url: &str, body: &str) {
        self.manifests
            .lock()
            .unwrap()
            .insert(url.to_string(), body.as_bytes().to_vec());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Acquirer for FakeRemote {
    fn name(&self) -> &str {
        "fake-remote"
    }

    async fn acquire(
        &self,
        source: &SourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<AcquiredFile, AcquisitionError> {
        let SourceDescriptor::Remote(url) = source else {
            return Err(AcquisitionError::InvalidReference(source.describe()));
        };
        self.calls.fetch_add(1, Ordering::SeqCst);

        let response = self.responses.lock().unwrap().get(url.as_str()).cloned();
        let (bytes, extension) = match response {
            Some(Remote::Audio(bytes)) => (bytes, extension_of(Path::new(url.path()))),
            Some(Remote::AudioAs(bytes, ext)) => (bytes, Some(ext.to_string())),
            Some(Remote::Status(code)) => return Err(AcquisitionError::HttpStatus(code)),
            None => return Err(AcquisitionError::HttpStatus(404)),
        };

        let mut staged = NamedTempFile::new_in(&self.staging)?;
        std::io::Write::write_all(&mut staged, &bytes)?;

        if self.cancel_after_acquire {
            cancel.cancel();
        }
        Ok(AcquiredFile::staged(
            staged.into_temp_path(),
            extension,
            SourceType::Remote,
        ))
    }
}

#[async_trait]
impl ManifestFetcher for FakeRemote {
    async fn fetch(
        &self,
        url: &Url,
        _cancel: &CancellationToken,
    ) -> Result<FetchedDocument, AcquisitionError> {
        match self.manifests.lock().unwrap().get(url.as_str()) {
            Some(bytes) => Ok(FetchedDocument {
                bytes: bytes.clone(),
                content_type: Some("application/json".to_string()),
            }),
            None => Err(AcquisitionError::HttpStatus(404)),
        }
    }
}

/// Reports a fixed duration for every file
pub struct FixedProber(pub f64);

#[async_trait]
impl DurationProber for FixedProber {
    async fn probe_ms(&self, _path: &Path) -> f64 {
        self.0
    }
}

/// Runs a side effect while probing, then reports one second
pub struct HookProber(Box<dyn Fn() + Send + Sync>);

impl HookProber {
    pub fn new(hook: impl Fn() + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self(Box::new(hook)))
    }

    /// Trips `cancel` mid-probe
    pub fn cancelling(cancel: &CancellationToken) -> Arc<Self> {
        let cancel = cancel.clone();
        Self::new(move || cancel.cancel())
    }
}

#[async_trait]
impl DurationProber for HookProber {
    async fn probe_ms(&self, _path: &Path) -> f64 {
        (self.0)();
        1000.0
    }
}

/// An importer over a fresh library in a temporary directory
pub struct Harness {
    pub temp: TempDir,
    pub library: Arc<FileLibrary>,
    pub remote: Arc<FakeRemote>,
    pub importer: Importer,
}

impl Harness {
    pub fn new(probe_ms: f64) -> Self {
        Self::build(probe_ms, false)
    }

    /// Harness whose remote trips cancellation after each download
    pub fn cancelling() -> Self {
        Self::build(1000.0, true)
    }

    fn build(probe_ms: f64, cancel_after_acquire: bool) -> Self {
        let temp = TempDir::new().unwrap();
        let library = Arc::new(FileLibrary::open(temp.path().join("library")));

        let mut remote = FakeRemote::new(temp.path().join("staging"));
        if cancel_after_acquire {
            remote = remote.cancelling();
        }
        let remote = Arc::new(remote);

        let importer = Importer::new(
            library.clone(),
            adapters_for(&remote),
            remote.clone(),
            Arc::new(FixedProber(probe_ms)),
        );

        Self {
            temp,
            library,
            remote,
            importer,
        }
    }

    /// A second importer over the same library and remote, with `prober`
    pub fn importer_with_prober(&self, prober: Arc<dyn DurationProber>) -> Importer {
        Importer::new(
            self.library.clone(),
            adapters_for(&self.remote),
            self.remote.clone(),
            prober,
        )
    }

    pub fn library_root(&self) -> PathBuf {
        self.temp.path().join("library")
    }

    /// Write an embedded bundle directory with the given manifest and assets
    pub fn write_bundle(&self, name: &str, manifest: &str, assets: &[(&str, &[u8])]) -> PathBuf {
        let dir = self.temp.path().join("bundles").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("manifest.json"), manifest).unwrap();
        for (asset, bytes) in assets {
            std::fs::write(dir.join(asset), bytes).unwrap();
        }
        dir
    }

    /// Write a loose file outside the library
    pub fn write_file(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.temp.path().join("incoming").join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, bytes).unwrap();
        path
    }

    /// Files under the library root, relative to it, sorted
    pub fn library_files(&self) -> Vec<String> {
        let root = self.library_root();
        let mut files = Vec::new();
        let mut stack = vec![root.clone()];
        while let Some(dir) = stack.pop() {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    files.push(path.strip_prefix(&root).unwrap().display().to_string());
                }
            }
        }
        files.sort();
        files
    }
}

fn adapters_for(remote: &Arc<FakeRemote>) -> AcquisitionAdapters {
    AcquisitionAdapters {
        embedded: Arc::new(EmbeddedAcquirer::new()),
        local: Arc::new(LocalFileAcquirer::files()),
        recording: Arc::new(LocalFileAcquirer::recordings()),
        remote: remote.clone(),
    }
}

/// A reporter plus the receiving end of its channel
pub fn recording_reporter() -> (ProgressReporter, UnboundedReceiver<ImportProgress>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressReporter::new(tx), rx)
}

/// Drain every update already sent
pub fn collect_progress(rx: &mut UnboundedReceiver<ImportProgress>) -> Vec<ImportProgress> {
    let mut updates = Vec::new();
    while let Ok(update) = rx.try_recv() {
        updates.push(update);
    }
    updates
}
