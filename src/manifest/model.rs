//! Typed import manifest.
//!
//! A manifest describes one bundle of packs of tracks. It exists only for the
//! duration of an import call; nothing here is persisted as-is.

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{ClipKind, TranscriptSpan};

/// Treat an explicit `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Top-level manifest document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
    /// Publisher-side bundle id (informational only)
    #[serde(default)]
    pub id: Option<String>,

    pub title: String,

    pub packs: Vec<ManifestPack>,
}

impl BundleManifest {
    /// Total number of tracks across all packs
    pub fn track_count(&self) -> usize {
        self.packs.iter().map(|p| p.tracks.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestPack {
    #[serde(default)]
    pub id: Option<String>,

    pub title: String,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub cover_url: Option<String>,

    #[serde(default)]
    pub cover_filename: Option<String>,

    #[serde(default)]
    pub language_hint: Option<String>,

    pub tracks: Vec<ManifestTrack>,
}

impl ManifestPack {
    /// Name used to derive the pack id
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestTrack {
    #[serde(default)]
    pub id: Option<String>,

    pub title: String,

    /// Remote audio location
    #[serde(default)]
    pub url: Option<String>,

    /// Asset name inside an embedded bundle, or a name relative to the manifest URL
    #[serde(default)]
    pub filename: Option<String>,

    #[serde(default)]
    pub duration_ms: Option<u64>,

    #[serde(default)]
    pub language_code: Option<String>,

    #[serde(default)]
    pub practice_sets: Option<Vec<ManifestPracticeSet>>,

    #[serde(default)]
    pub transcripts: Option<Vec<TranscriptSpan>>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

impl ManifestTrack {
    /// Name used to derive the track id
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.title)
    }

    /// Audio reference mixed into the track id (`url`, else `filename`)
    pub fn source_key(&self) -> Option<&str> {
        self.url.as_deref().or(self.filename.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestPracticeSet {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub clips: Vec<ManifestClip>,

    #[serde(default)]
    pub is_favorite: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestClip {
    #[serde(default)]
    pub id: Option<String>,

    pub start_ms: u64,
    pub end_ms: u64,
    pub kind: ClipKind,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub language_code: Option<String>,

    #[serde(default)]
    pub repeats: Option<u32>,

    #[serde(default)]
    pub start_speed: Option<f32>,

    #[serde(default)]
    pub end_speed: Option<f32>,
}
