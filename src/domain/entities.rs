//! Persisted library entities.
//!
//! These are the records held by the library catalog. Manifest types are
//! converted into these by the import orchestrator once a track's audio has
//! been acquired, copied into its folder and probed.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity;

/// Title of the practice set synthesized when a manifest declares none
pub const FULL_TRACK_TITLE: &str = "Full Track";

/// A named grouping of tracks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pack {
    /// Deterministic pack id
    pub id: Uuid,

    /// Display title
    pub title: String,

    /// Dominant language of the pack, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_hint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,

    /// Track ids in insertion order
    #[serde(default)]
    pub track_ids: Vec<Uuid>,
}

impl Pack {
    /// Create an empty pack record
    pub fn new(id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            language_hint: None,
            author: None,
            cover_url: None,
            track_ids: Vec::new(),
        }
    }

    pub fn with_language_hint(mut self, hint: Option<String>) -> Self {
        self.language_hint = hint;
        self
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    pub fn with_cover_url(mut self, cover_url: Option<String>) -> Self {
        self.cover_url = cover_url;
        self
    }
}

/// How a track's audio reached the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Asset shipped inside an embedded bundle
    Embedded,

    /// Audio file picked from the local filesystem
    LocalFile,

    /// Microphone recording
    Recording,

    /// Video container whose audio is played back directly
    Video,

    /// Downloaded over http(s)
    Remote,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Embedded => write!(f, "embedded"),
            SourceType::LocalFile => write!(f, "local_file"),
            SourceType::Recording => write!(f, "recording"),
            SourceType::Video => write!(f, "video"),
            SourceType::Remote => write!(f, "remote"),
        }
    }
}

/// A single audio asset plus its practice and transcript metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: Uuid,

    /// Owning pack; always refers to a pack in the same catalog
    pub pack_id: Uuid,

    pub title: String,

    /// Stored file name inside the track folder (`audio.<ext>`)
    pub filename: String,

    /// Absolute path of the stored audio file
    pub local_path: PathBuf,

    pub duration_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,

    /// Ordered; `display_order` equals the index
    #[serde(default)]
    pub practice_sets: Vec<PracticeSet>,

    #[serde(default)]
    pub transcripts: Vec<TranscriptSpan>,

    #[serde(default)]
    pub tags: Vec<String>,

    pub source_type: SourceType,

    /// Original audio reference (URL, asset name or file name)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// An ordered grouping of clips for guided practice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSet {
    pub id: Uuid,
    pub track_id: Uuid,
    pub display_order: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub clips: Vec<Clip>,

    #[serde(default)]
    pub is_favorite: bool,
}

impl PracticeSet {
    /// The single practice set covering `[0, duration_ms]`.
    ///
    /// A zero-length track gets the set without any clip.
    pub fn full_track(track_id: Uuid, duration_ms: u64) -> Self {
        let id = identity::practice_set_id(track_id, FULL_TRACK_TITLE);
        let clips = if duration_ms > 0 {
            vec![Clip {
                id: identity::clip_id(id, FULL_TRACK_TITLE, 0, duration_ms),
                start_ms: 0,
                end_ms: duration_ms,
                kind: ClipKind::Drill,
                title: Some(FULL_TRACK_TITLE.to_string()),
                language_code: None,
                repeats: None,
                start_speed: None,
                end_speed: None,
            }]
        } else {
            Vec::new()
        };

        Self {
            id,
            track_id,
            display_order: 0,
            title: Some(FULL_TRACK_TITLE.to_string()),
            clips,
            is_favorite: false,
        }
    }
}

/// Whether a clip is practiced or passed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipKind {
    Drill,
    /// Also covers `noise` segments from manifests
    #[serde(alias = "noise")]
    Skip,
}

/// A timed sub-range of a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub id: Uuid,
    pub start_ms: u64,
    pub end_ms: u64,
    pub kind: ClipKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,

    /// Playback repetitions for drills
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeats: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_speed: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_speed: Option<f32>,
}

/// A timed line of transcript text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptSpan {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,
}
