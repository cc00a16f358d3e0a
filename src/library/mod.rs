//! Content-addressable track library.
//!
//! # Storage Layout
//!
//! ```text
//! <libraryRoot>/
//! ├── catalog.json               # Full pack/track graph, rewritten atomically
//! ├── catalog.lock               # Single-writer lock
//! └── <packId>/
//!     └── <trackId>/
//!         └── audio.<ext>        # Exactly one audio file per track
//! ```
//!
//! Pack and track ids are deterministic, so a track's folder is a pure
//! function of its semantic identity.

pub mod catalog;
pub mod store;

use thiserror::Error;
use uuid::Uuid;

pub use catalog::{Catalog, CATALOG_VERSION};
pub use store::{FileLibrary, LibraryStore};

/// Errors raised by the library store
#[derive(Debug, Error)]
pub enum LibraryError {
    /// A track was added to a pack that was never added; an importer
    /// sequencing bug, not a user-facing condition
    #[error("Pack not found: {0}")]
    PackNotFound(Uuid),

    #[error("Failed to write library: {context}: {source}")]
    Write {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read library catalog: {0}")]
    Read(#[source] std::io::Error),

    #[error("Library catalog is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
}

impl LibraryError {
    pub(crate) fn write(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Write {
            context: context.into(),
            source,
        }
    }
}
