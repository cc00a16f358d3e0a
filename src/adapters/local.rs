//! Local files and recordings.
//!
//! Nothing is copied here; the adapter only checks that the file exists, can
//! be opened, and looks like a media container we can play.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs;
use tokio_util::sync::CancellationToken;

use super::{
    extension_of, AcquiredFile, AcquisitionError, Acquirer, SourceDescriptor, AUDIO_EXTENSIONS,
    VIDEO_EXTENSIONS,
};
use crate::domain::SourceType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Files,
    Recordings,
}

/// Validates user-picked files or microphone recordings
#[derive(Debug)]
pub struct LocalFileAcquirer {
    mode: Mode,
}

impl LocalFileAcquirer {
    /// Accepts audio and video containers picked by the user
    pub fn files() -> Self {
        Self { mode: Mode::Files }
    }

    /// Accepts non-empty audio recordings only
    pub fn recordings() -> Self {
        Self {
            mode: Mode::Recordings,
        }
    }

    fn classify(&self, path: &Path) -> Result<SourceType, AcquisitionError> {
        let ext = extension_of(path).unwrap_or_default();
        let is_audio = AUDIO_EXTENSIONS.contains(&ext.as_str());
        let is_video = VIDEO_EXTENSIONS.contains(&ext.as_str());

        match self.mode {
            Mode::Files if is_audio => Ok(SourceType::LocalFile),
            Mode::Files if is_video => Ok(SourceType::Video),
            Mode::Recordings if is_audio => Ok(SourceType::Recording),
            _ => Err(AcquisitionError::NotAudio(format!(
                "unsupported file type '{}': {}",
                ext,
                path.display()
            ))),
        }
    }
}

#[async_trait]
impl Acquirer for LocalFileAcquirer {
    fn name(&self) -> &str {
        match self.mode {
            Mode::Files => "local",
            Mode::Recordings => "recording",
        }
    }

    async fn acquire(
        &self,
        source: &SourceDescriptor,
        _cancel: &CancellationToken,
    ) -> Result<AcquiredFile, AcquisitionError> {
        let path = match (self.mode, source) {
            (Mode::Files, SourceDescriptor::LocalFile(path)) => path,
            (Mode::Recordings, SourceDescriptor::Recording(path)) => path,
            _ => return Err(AcquisitionError::InvalidReference(source.describe())),
        };

        let meta = match fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AcquisitionError::NotFound(path.display().to_string()))
            }
            Err(e) => {
                return Err(AcquisitionError::Unreadable {
                    path: path.clone(),
                    source: e,
                })
            }
        };
        if !meta.is_file() {
            return Err(AcquisitionError::NotFound(path.display().to_string()));
        }

        // Opening proves readability; the handle is dropped immediately
        fs::File::open(path)
            .await
            .map_err(|e| AcquisitionError::Unreadable {
                path: path.clone(),
                source: e,
            })?;

        let source_type = self.classify(path)?;

        if self.mode == Mode::Recordings && meta.len() == 0 {
            return Err(AcquisitionError::NotAudio(format!(
                "empty recording: {}",
                path.display()
            )));
        }

        Ok(AcquiredFile::in_place(path.clone(), source_type))
    }
}
