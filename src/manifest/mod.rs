//! Import manifests.
//!
//! A manifest is JSON describing `bundle → packs → tracks → practice sets /
//! transcripts`. Decoding never touches the network or the disk; callers hand
//! in the bytes they fetched or read.

pub mod decode;
pub mod model;

pub use decode::{decode, sniff, ManifestParseError};
pub use model::{BundleManifest, ManifestClip, ManifestPack, ManifestPracticeSet, ManifestTrack};
