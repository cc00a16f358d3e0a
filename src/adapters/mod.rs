//! Acquisition adapters.
//!
//! An adapter turns a source descriptor into a local, readable media file.
//! The import orchestrator only depends on the [`Acquirer`] and
//! [`ManifestFetcher`] traits; the concrete adapters here cover embedded
//! bundle assets, local files, recordings and http(s) downloads.

pub mod embedded;
pub mod local;
pub mod probe;
pub mod remote;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use tempfile::TempPath;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::domain::SourceType;

pub use embedded::EmbeddedAcquirer;
pub use local::LocalFileAcquirer;
pub use probe::{duration_ms_from_probe, DurationProber, LoftyProber};
pub use remote::RemoteAcquirer;

/// Audio container extensions accepted from local sources
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "wav", "aac", "flac", "ogg", "opus", "caf", "aiff"];

/// Video container extensions whose audio track is played directly
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v"];

/// Errors raised while acquiring a source
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Source not found: {0}")]
    NotFound(String),

    #[error("Source unreadable: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid source reference: {0}")]
    InvalidReference(String),

    #[error("Unsupported URL scheme '{0}' (expected http or https)")]
    InvalidScheme(String),

    #[error("Source is not audio: {0}")]
    NotAudio(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to stage download: {0}")]
    Staging(#[from] std::io::Error),

    #[error("Acquisition cancelled")]
    Cancelled,
}

impl AcquisitionError {
    /// Whether the failure is a gap in the content (missing or unusable
    /// reference) rather than a transport or decoding fault.
    ///
    /// Batch imports skip tracks with content gaps and abort on faults.
    pub fn is_content_gap(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::Unreadable { .. }
                | Self::InvalidReference(_)
                | Self::InvalidScheme(_)
        )
    }
}

impl From<reqwest::Error> for AcquisitionError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::HttpStatus(status.as_u16()),
            None => Self::Transport(e.to_string()),
        }
    }
}

/// What to acquire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceDescriptor {
    /// Named asset inside an embedded bundle directory
    Embedded { root: PathBuf, name: String },

    /// File picked from the local filesystem
    LocalFile(PathBuf),

    /// Microphone recording left on disk by the recorder
    Recording(PathBuf),

    /// http(s) download
    Remote(Url),
}

impl SourceDescriptor {
    /// Human-readable reference, used in logs and as track provenance
    pub fn describe(&self) -> String {
        match self {
            Self::Embedded { name, .. } => name.clone(),
            Self::LocalFile(path) | Self::Recording(path) => path.display().to_string(),
            Self::Remote(url) => url.to_string(),
        }
    }
}

/// A local file produced by an adapter.
///
/// Downloads are staged in a temporary file that is removed when this value
/// is dropped, so an abandoned acquisition never leaves a partial file behind.
#[derive(Debug)]
pub struct AcquiredFile {
    path: PathBuf,
    extension: Option<String>,
    source_type: SourceType,
    _staged: Option<TempPath>,
}

impl AcquiredFile {
    /// A file that already lives somewhere stable (asset, user file, recording)
    pub fn in_place(path: PathBuf, source_type: SourceType) -> Self {
        let extension = extension_of(&path);
        Self {
            path,
            extension,
            source_type,
            _staged: None,
        }
    }

    /// A temporary download; deleted on drop
    pub fn staged(staged: TempPath, extension: Option<String>, source_type: SourceType) -> Self {
        Self {
            path: staged.to_path_buf(),
            extension,
            source_type,
            _staged: Some(staged),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lowercased extension without the dot, if one is known
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }
}

/// Lowercased extension of a path, if any
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_lowercase)
}

/// Accept only http and https URLs
pub fn require_http(url: &Url) -> Result<(), AcquisitionError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(AcquisitionError::InvalidScheme(other.to_string())),
    }
}

/// Trait for acquisition adapters
#[async_trait]
pub trait Acquirer: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Produce a local readable file for `source`.
    ///
    /// Implementations that suspend must observe `cancel` and return
    /// [`AcquisitionError::Cancelled`] without leaving partial files.
    async fn acquire(
        &self,
        source: &SourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<AcquiredFile, AcquisitionError>;
}

/// A fetched manifest document
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Trait for fetching remote manifest documents
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<FetchedDocument, AcquisitionError>;
}

/// The set of adapters an importer dispatches to
#[derive(Clone)]
pub struct AcquisitionAdapters {
    pub embedded: Arc<dyn Acquirer>,
    pub local: Arc<dyn Acquirer>,
    pub recording: Arc<dyn Acquirer>,
    pub remote: Arc<dyn Acquirer>,
}

impl AcquisitionAdapters {
    /// Default adapters backed by the filesystem and a shared HTTP client
    pub fn standard(remote: Arc<RemoteAcquirer>) -> Self {
        Self {
            embedded: Arc::new(EmbeddedAcquirer::new()),
            local: Arc::new(LocalFileAcquirer::files()),
            recording: Arc::new(LocalFileAcquirer::recordings()),
            remote,
        }
    }

    /// Adapter responsible for `source`
    pub fn for_source(&self, source: &SourceDescriptor) -> &dyn Acquirer {
        match source {
            SourceDescriptor::Embedded { .. } => self.embedded.as_ref(),
            SourceDescriptor::LocalFile(_) => self.local.as_ref(),
            SourceDescriptor::Recording(_) => self.recording.as_ref(),
            SourceDescriptor::Remote(_) => self.remote.as_ref(),
        }
    }
}
