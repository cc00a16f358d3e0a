//! Embedded bundle assets.
//!
//! An embedded bundle is a directory shipped with the application holding a
//! `manifest.json` and the audio files it names. Asset names are resolved
//! strictly inside that directory.

use std::path::{Component, Path};

use async_trait::async_trait;
use tokio::fs;
use tokio_util::sync::CancellationToken;

use super::{AcquiredFile, AcquisitionError, Acquirer, SourceDescriptor};
use crate::domain::SourceType;

/// Looks up assets inside an embedded bundle directory
#[derive(Debug, Default)]
pub struct EmbeddedAcquirer;

impl EmbeddedAcquirer {
    pub fn new() -> Self {
        Self
    }
}

/// An asset name must be a plain relative path without parent references
fn is_contained(name: &str) -> bool {
    let path = Path::new(name);
    !name.trim().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[async_trait]
impl Acquirer for EmbeddedAcquirer {
    fn name(&self) -> &str {
        "embedded"
    }

    async fn acquire(
        &self,
        source: &SourceDescriptor,
        _cancel: &CancellationToken,
    ) -> Result<AcquiredFile, AcquisitionError> {
        let SourceDescriptor::Embedded { root, name } = source else {
            return Err(AcquisitionError::InvalidReference(source.describe()));
        };

        if !is_contained(name) {
            return Err(AcquisitionError::InvalidReference(name.clone()));
        }

        let path = root.join(name);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(AcquisitionError::NotFound(name.clone())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AcquisitionError::NotFound(name.clone()))
            }
            Err(e) => return Err(AcquisitionError::Unreadable { path, source: e }),
        }

        Ok(AcquiredFile::in_place(path, SourceType::Embedded))
    }
}
