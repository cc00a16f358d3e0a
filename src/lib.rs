//! lessonkit - Deterministic audio-lesson importer
//!
//! Imports language-learning audio from embedded bundles, remote manifests,
//! local files, recordings and URLs into a content-addressable library.
//!
//! # Architecture
//!
//! Every import is a fixed per-track stage sequence:
//! - Acquire the source into a readable local file
//! - Persist it to `<library>/<packId>/<trackId>/audio.<ext>`
//! - Probe its duration
//! - Commit pack and track to the catalog
//!
//! Ids are name-based UUIDs derived from manifest titles, so importing the
//! same content twice replaces records in place instead of duplicating them.
//!
//! # Modules
//!
//! - `adapters`: Source acquisition (embedded, local, recording, http) and duration probing
//! - `core`: Import orchestration, progress and results
//! - `domain`: Data structures (Pack, Track, PracticeSet, Clip) and id derivation
//! - `manifest`: Manifest schema and decoding
//! - `library`: Catalog and on-disk store
//! - `ingest`: Pending-import hand-off queue
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Import an embedded bundle
//! lessonkit import-bundle ./bundles/spanish-basics
//!
//! # Import a remote manifest
//! lessonkit import-manifest https://example.com/lessons/manifest.json
//!
//! # Import a single file into a pack
//! lessonkit import-file lesson.mp3 --pack "Spanish"
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;
pub mod library;
pub mod manifest;

// Re-export main types at crate root for convenience
pub use crate::core::{ImportError, ImportReport, Importer, ProgressReporter, SingleImport};
pub use domain::{Clip, ClipKind, Pack, PracticeSet, SourceType, Track, TranscriptSpan};
pub use library::{Catalog, FileLibrary, LibraryStore};
pub use manifest::BundleManifest;
pub use ingest::PendingQueue;
