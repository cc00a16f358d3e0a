//! Deterministic identifiers.
//!
//! Every pack, track, practice set and clip id is a version-5 UUID computed
//! from its parent id and a normalized name. The root of every scope chain is
//! the DNS namespace, so identical semantic input yields identical ids on any
//! machine and across re-imports.

use uuid::Uuid;

/// Root namespace for bundle ids
pub const ROOT_NAMESPACE: Uuid = Uuid::NAMESPACE_DNS;

/// Canonicalize a name before hashing: trim, lowercase, collapse whitespace
pub fn normalize(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Derive a child id from a parent id and a name
pub fn derive(parent: Uuid, name: &str) -> Uuid {
    Uuid::new_v5(&parent, normalize(name).as_bytes())
}

/// Id of a bundle, rooted at [`ROOT_NAMESPACE`]
pub fn bundle_id(title: &str) -> Uuid {
    derive(ROOT_NAMESPACE, title)
}

/// Id of a pack within a bundle (`key` is the manifest pack id, or its title)
pub fn pack_id(bundle_id: Uuid, key: &str) -> Uuid {
    derive(bundle_id, key)
}

/// Id of a track within a pack.
///
/// `key` is the manifest track id (or title) and `source_key` the audio
/// reference, concatenated without a separator.
pub fn track_id(pack_id: Uuid, key: &str, source_key: &str) -> Uuid {
    derive(pack_id, &format!("{}{}", key, source_key))
}

/// Id of a practice set within a track
pub fn practice_set_id(track_id: Uuid, title: &str) -> Uuid {
    derive(track_id, title)
}

/// Id of a clip within a practice set
pub fn clip_id(practice_set_id: Uuid, key: &str, start_ms: u64, end_ms: u64) -> Uuid {
    derive(practice_set_id, &format!("{}:{}-{}", key, start_ms, end_ms))
}
