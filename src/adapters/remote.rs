//! http(s) downloads.
//!
//! Audio is streamed into a temporary file in the staging directory; the
//! temporary file is deleted if the download fails or is cancelled. One
//! client is shared by every track of a batch.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Response, Url};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{
    extension_of, require_http, AcquiredFile, AcquisitionError, Acquirer, FetchedDocument,
    ManifestFetcher, SourceDescriptor,
};
use crate::domain::SourceType;

/// Downloads audio and manifest documents over http(s)
pub struct RemoteAcquirer {
    client: reqwest::Client,
    staging_dir: PathBuf,
}

impl RemoteAcquirer {
    /// Create a downloader staging files in `staging_dir`
    pub fn new(
        staging_dir: PathBuf,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, AcquisitionError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            staging_dir,
        })
    }

    /// Create a downloader with a caller-provided client
    pub fn with_client(client: reqwest::Client, staging_dir: PathBuf) -> Self {
        Self {
            client,
            staging_dir,
        }
    }

    async fn get(&self, url: &Url, cancel: &CancellationToken) -> Result<Response, AcquisitionError> {
        require_http(url)?;

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AcquisitionError::Cancelled),
            r = self.client.get(url.clone()).send() => r?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(AcquisitionError::HttpStatus(status.as_u16()));
        }
        Ok(response)
    }

    async fn download(&self, url: &Url, cancel: &CancellationToken) -> Result<AcquiredFile, AcquisitionError> {
        let mut response = self.get(url, cancel).await?;

        let content_type = content_type_of(&response);
        if let Some(ct) = content_type.as_deref() {
            if !is_audio_content_type(ct) {
                return Err(AcquisitionError::NotAudio(ct.to_string()));
            }
        }

        let extension = url_extension(url)
            .or_else(|| content_type.as_deref().and_then(extension_for_content_type));

        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let staged = tempfile::Builder::new()
            .prefix("download-")
            .tempfile_in(&self.staging_dir)?
            .into_temp_path();

        let mut file = tokio::fs::File::create(&staged).await?;
        let mut bytes: u64 = 0;
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AcquisitionError::Cancelled),
                c = response.chunk() => c?,
            };
            let Some(chunk) = chunk else { break };
            bytes += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        if bytes == 0 {
            return Err(AcquisitionError::NotAudio("empty response body".to_string()));
        }

        debug!(%url, bytes, "Download staged");
        Ok(AcquiredFile::staged(staged, extension, SourceType::Remote))
    }
}

#[async_trait]
impl Acquirer for RemoteAcquirer {
    fn name(&self) -> &str {
        "remote"
    }

    async fn acquire(
        &self,
        source: &SourceDescriptor,
        cancel: &CancellationToken,
    ) -> Result<AcquiredFile, AcquisitionError> {
        match source {
            SourceDescriptor::Remote(url) => self.download(url, cancel).await,
            other => Err(AcquisitionError::InvalidReference(other.describe())),
        }
    }
}

#[async_trait]
impl ManifestFetcher for RemoteAcquirer {
    async fn fetch(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<FetchedDocument, AcquisitionError> {
        let response = self.get(url, cancel).await?;
        let content_type = content_type_of(&response);

        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AcquisitionError::Cancelled),
            b = response.bytes() => b?,
        };

        Ok(FetchedDocument {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

fn content_type_of(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_lowercase()
        })
        .filter(|v| !v.is_empty())
}

/// Content types a host may plausibly serve audio under
pub fn is_audio_content_type(content_type: &str) -> bool {
    content_type.starts_with("audio/")
        || content_type.starts_with("video/")
        || matches!(
            content_type,
            "application/octet-stream" | "binary/octet-stream" | "application/mp4"
        )
}

/// Extension for well-known audio content types
pub fn extension_for_content_type(content_type: &str) -> Option<String> {
    let ext = match content_type {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/x-m4a" | "audio/m4a" | "audio/aac-mp4" => "m4a",
        "audio/aac" | "audio/x-aac" => "aac",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/flac" | "audio/x-flac" => "flac",
        "audio/ogg" => "ogg",
        "audio/opus" => "opus",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        _ => return None,
    };
    Some(ext.to_string())
}

/// Extension of the last path segment of a URL
pub fn url_extension(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.last()?;
    extension_of(std::path::Path::new(segment))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_content_types() {
        assert!(is_audio_content_type("audio/mpeg"));
        assert!(is_audio_content_type("application/octet-stream"));
        assert!(is_audio_content_type("video/mp4"));
        assert!(!is_audio_content_type("text/html"));
        assert!(!is_audio_content_type("application/json"));
    }

    #[test]
    fn test_url_extension() {
        let url = Url::parse("https://cdn.example.com/packs/Lesson%201.MP3?sig=abc").unwrap();
        assert_eq!(url_extension(&url), Some("mp3".to_string()));

        let url = Url::parse("https://cdn.example.com/stream").unwrap();
        assert_eq!(url_extension(&url), None);
    }

    #[test]
    fn test_extension_for_content_type() {
        assert_eq!(extension_for_content_type("audio/x-m4a"), Some("m4a".to_string()));
        assert_eq!(extension_for_content_type("audio/unknown"), None);
    }

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let temp = tempfile::TempDir::new().unwrap();
        let remote = RemoteAcquirer::with_client(reqwest::Client::new(), temp.path().to_path_buf());
        let source = SourceDescriptor::Remote(Url::parse("ftp://example.com/a.mp3").unwrap());

        let err = remote
            .acquire(&source, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::InvalidScheme(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_request() {
        let temp = tempfile::TempDir::new().unwrap();
        let remote = RemoteAcquirer::with_client(reqwest::Client::new(), temp.path().to_path_buf());
        let source = SourceDescriptor::Remote(Url::parse("https://example.invalid/a.mp3").unwrap());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = remote.acquire(&source, &cancel).await.unwrap_err();
        assert!(matches!(err, AcquisitionError::Cancelled));
        // Nothing was staged
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}
