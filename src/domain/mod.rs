//! Domain types for the lesson library.
//!
//! This module contains the core data structures:
//! - Entities: packs, tracks, practice sets, clips and transcript spans
//! - Identity: deterministic name-based ids
//! - Stage: per-track import stages

pub mod entities;
pub mod identity;
pub mod stage;

// Re-export commonly used types
pub use entities::{
    Clip, ClipKind, Pack, PracticeSet, SourceType, Track, TranscriptSpan, FULL_TRACK_TITLE,
};
pub use stage::TrackStage;
