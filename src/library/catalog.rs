//! Catalog document for the track library.
//!
//! The whole pack/track graph lives in one JSON document. This type holds the
//! pure upsert and query logic; [`super::store::FileLibrary`] handles the
//! locking and atomic rewrite around it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::LibraryError;
use crate::domain::{Pack, Track};

/// Current catalog format version
pub const CATALOG_VERSION: u32 = 1;

/// Catalog of all packs and tracks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Catalog format version
    pub version: u32,

    /// Packs in insertion order
    #[serde(default)]
    pub packs: Vec<Pack>,

    /// Tracks in insertion order
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create a new empty catalog
    pub fn new() -> Self {
        Self {
            version: CATALOG_VERSION,
            packs: Vec::new(),
            tracks: Vec::new(),
        }
    }

    /// Parse a catalog document
    pub fn from_json(bytes: &[u8]) -> Result<Self, LibraryError> {
        serde_json::from_slice(bytes).map_err(LibraryError::Corrupt)
    }

    /// Serialize the catalog document
    pub fn to_json(&self) -> Result<Vec<u8>, LibraryError> {
        serde_json::to_vec_pretty(self).map_err(LibraryError::Corrupt)
    }

    /// Insert or update a pack.
    ///
    /// Title and metadata are replaced; existing track ids are kept and any
    /// new ids on `pack` are appended.
    pub fn upsert_pack(&mut self, pack: Pack) {
        if let Some(existing) = self.packs.iter_mut().find(|p| p.id == pack.id) {
            existing.title = pack.title;
            existing.language_hint = pack.language_hint;
            existing.author = pack.author;
            existing.cover_url = pack.cover_url;
            for id in pack.track_ids {
                if !existing.track_ids.contains(&id) {
                    existing.track_ids.push(id);
                }
            }
        } else {
            self.packs.push(pack);
        }
    }

    /// Insert or replace a track inside an existing pack.
    ///
    /// Returns `true` when the track id was not present before.
    pub fn upsert_track(&mut self, mut track: Track, pack_id: Uuid) -> Result<bool, LibraryError> {
        if !self.packs.iter().any(|p| p.id == pack_id) {
            return Err(LibraryError::PackNotFound(pack_id));
        }
        track.pack_id = pack_id;
        let track_id = track.id;

        let is_new = match self.tracks.iter_mut().find(|t| t.id == track_id) {
            Some(existing) => {
                let previous_pack = existing.pack_id;
                *existing = track;
                if previous_pack != pack_id {
                    if let Some(old) = self.packs.iter_mut().find(|p| p.id == previous_pack) {
                        old.track_ids.retain(|id| *id != track_id);
                    }
                }
                false
            }
            None => {
                self.tracks.push(track);
                true
            }
        };

        if let Some(pack) = self.packs.iter_mut().find(|p| p.id == pack_id) {
            if !pack.track_ids.contains(&track_id) {
                pack.track_ids.push(track_id);
            }
        }

        Ok(is_new)
    }

    /// Remove a track and its pack membership
    pub fn remove_track(&mut self, id: Uuid) -> Option<Track> {
        let pos = self.tracks.iter().position(|t| t.id == id)?;
        let track = self.tracks.remove(pos);
        if let Some(pack) = self.packs.iter_mut().find(|p| p.id == track.pack_id) {
            pack.track_ids.retain(|t| *t != id);
        }
        Some(track)
    }

    /// Get a pack by ID
    pub fn pack(&self, id: Uuid) -> Option<&Pack> {
        self.packs.iter().find(|p| p.id == id)
    }

    /// Get a track by ID
    pub fn track(&self, id: Uuid) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Tracks of a pack, in the pack's order
    pub fn tracks_in_pack(&self, pack_id: Uuid) -> Vec<&Track> {
        self.pack(pack_id)
            .map(|pack| pack.track_ids.iter().filter_map(|id| self.track(*id)).collect())
            .unwrap_or_default()
    }

    /// Search tracks by query (case-insensitive substring of title or tag)
    pub fn search(&self, query: &str) -> Vec<&Track> {
        let query_lower = query.to_lowercase();

        self.tracks
            .iter()
            .filter(|track| {
                track.title.to_lowercase().contains(&query_lower)
                    || track.tags.iter().any(|t| t.to_lowercase().contains(&query_lower))
            })
            .collect()
    }

    /// Get the number of tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Check if the catalog holds no tracks
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Every track's pack exists and lists it
    pub fn is_consistent(&self) -> bool {
        self.tracks.iter().all(|t| {
            self.pack(t.pack_id)
                .map(|p| p.track_ids.contains(&t.id))
                .unwrap_or(false)
        })
    }
}
