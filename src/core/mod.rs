//! Import orchestration.
//!
//! This module contains:
//! - Importer: per-track stage sequence and batch policy
//! - Outcome: per-track results, batch reports and import errors
//! - Progress: monotonic progress reporting

pub mod orchestrator;
pub mod outcome;
pub mod progress;

pub use orchestrator::{
    title_from_file_name, ImportSettings, Importer, SingleImport, DEFAULT_FALLBACK_EXTENSION,
    DEFAULT_PACK_TITLE, MANIFEST_FILE,
};
pub use outcome::{ImportError, ImportReport, SkipReason, SkippedTrack, TrackResult};
pub use progress::{BatchProgress, ImportProgress, ProgressReporter};
