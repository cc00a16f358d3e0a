//! Import results and errors.

use thiserror::Error;

use crate::adapters::AcquisitionError;
use crate::domain::Track;
use crate::ingest::PendingQueueError;
use crate::library::LibraryError;
use crate::manifest::ManifestParseError;

/// Errors that abort an import call
#[derive(Debug, Error)]
pub enum ImportError {
    /// Bad scheme, unparsable URL or otherwise unusable source
    #[error("Invalid source: {0}")]
    Validation(String),

    #[error(transparent)]
    Manifest(#[from] ManifestParseError),

    #[error("Failed to acquire '{reference}': {source}")]
    Acquisition {
        reference: String,
        #[source]
        source: AcquisitionError,
    },

    #[error("Failed to store media for '{reference}': {source}")]
    Persistence {
        reference: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Queue(#[from] PendingQueueError),

    #[error("Import cancelled")]
    Cancelled,
}

impl ImportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Why a track in a batch was passed over
#[derive(Debug)]
pub enum SkipReason {
    /// No usable audio reference in the manifest
    Unresolvable(String),

    /// The referenced content is missing or unusable
    Acquisition(AcquisitionError),

    /// Copying the media into the track folder failed
    Persistence(std::io::Error),

    /// Writing the catalog failed
    Catalog(LibraryError),
}

impl SkipReason {
    /// Escalate to an error, for imports that have no batch to continue
    pub fn into_error(self, reference: impl Into<String>) -> ImportError {
        match self {
            SkipReason::Unresolvable(reason) => ImportError::Validation(reason),
            SkipReason::Acquisition(source) => ImportError::Acquisition {
                reference: reference.into(),
                source,
            },
            SkipReason::Persistence(source) => ImportError::Persistence {
                reference: reference.into(),
                source,
            },
            SkipReason::Catalog(e) => ImportError::Library(e),
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Unresolvable(reason) => write!(f, "unresolvable audio reference: {}", reason),
            SkipReason::Acquisition(e) => write!(f, "{}", e),
            SkipReason::Persistence(e) => write!(f, "failed to store media: {}", e),
            SkipReason::Catalog(e) => write!(f, "{}", e),
        }
    }
}

/// Result of running the stage sequence for one track.
///
/// The batch loop branches on this: commit and continue, skip and continue,
/// or abort the whole batch.
#[derive(Debug)]
pub enum TrackResult {
    Committed(Track),
    Skipped(SkipReason),
    Fatal(ImportError),
}

/// A track left out of a batch
#[derive(Debug, Clone)]
pub struct SkippedTrack {
    pub title: String,
    pub reason: String,
}

/// Outcome of a batch import
#[derive(Debug, Default)]
pub struct ImportReport {
    /// Tracks committed by this call (new or replaced), in processing order
    pub committed: Vec<Track>,

    /// Tracks that were skipped, in processing order
    pub skipped: Vec<SkippedTrack>,
}

impl ImportReport {
    pub fn track_ids(&self) -> Vec<uuid::Uuid> {
        self.committed.iter().map(|t| t.id).collect()
    }
}
