//! Canonical paths for lessonkit.
//!
//! Single source of truth - use these instead of hardcoding paths.
//!
//! ## Layout
//!
//! | Location | Purpose |
//! |----------|---------|
//! | `<home>/library/` | Catalog plus `<packId>/<trackId>/audio.<ext>` |
//! | `<home>/assets/` | Embedded bundles (`<bundle>/manifest.json` + audio) |
//! | `<home>/pending/` | Pending-import log and inbox |
//! | `<home>/staging/` | In-flight downloads |

use std::path::PathBuf;

use super::ResolvedConfig;
use crate::ingest::queue::{INBOX_DIR, QUEUE_FILE};
use crate::library::store::CATALOG_FILE;

/// Project-level config directory name
pub const CONFIG_DIR: &str = ".lessonkit";

/// Config file name inside [`CONFIG_DIR`]
pub const CONFIG_FILE: &str = "config.yaml";

pub const LIBRARY_DIR: &str = "library";
pub const ASSETS_DIR: &str = "assets";
pub const PENDING_DIR: &str = "pending";
pub const STAGING_DIR: &str = "staging";

/// Catalog document (`<library>/catalog.json`)
pub fn catalog_file(config: &ResolvedConfig) -> PathBuf {
    config.library.join(CATALOG_FILE)
}

/// Pending-import log (`<pending>/pending.jsonl`)
pub fn pending_log(config: &ResolvedConfig) -> PathBuf {
    config.pending.join(QUEUE_FILE)
}

/// Pending-import inbox (`<pending>/inbox/`)
pub fn pending_inbox(config: &ResolvedConfig) -> PathBuf {
    config.pending.join(INBOX_DIR)
}

/// Download staging directory (`<home>/staging/`)
pub fn staging_dir(config: &ResolvedConfig) -> PathBuf {
    config.home.join(STAGING_DIR)
}

/// Embedded bundle directory by name (`<assets>/<name>/`)
pub fn bundle_dir(config: &ResolvedConfig, name: &str) -> PathBuf {
    config.assets.join(name)
}
