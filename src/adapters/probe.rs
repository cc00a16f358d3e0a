//! Duration probing.
//!
//! Duration is enrichment, not a correctness gate: a probe never fails the
//! import. Whatever the prober reports is coerced by
//! [`duration_ms_from_probe`], so NaN, infinite or negative readings become 0.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lofty::prelude::AudioFile;
use lofty::probe::Probe;
use tracing::debug;

/// Trait for duration probers
#[async_trait]
pub trait DurationProber: Send + Sync {
    /// Duration of the media file in milliseconds.
    ///
    /// Never errors; unreadable files report `0.0`. The value may be
    /// non-finite and is coerced by the caller.
    async fn probe_ms(&self, path: &Path) -> f64;
}

/// Coerce a raw probe reading into a stored duration
pub fn duration_ms_from_probe(raw_ms: f64) -> u64 {
    if raw_ms.is_finite() && raw_ms > 0.0 {
        raw_ms.round() as u64
    } else {
        0
    }
}

/// Reads container headers with lofty
#[derive(Debug, Default)]
pub struct LoftyProber;

impl LoftyProber {
    pub fn new() -> Self {
        Self
    }

    fn probe_blocking(path: PathBuf) -> f64 {
        match Probe::open(&path).and_then(|probe| probe.read()) {
            Ok(tagged_file) => tagged_file.properties().duration().as_secs_f64() * 1000.0,
            Err(e) => {
                debug!(file = %path.display(), error = %e, "Duration probe failed");
                0.0
            }
        }
    }
}

#[async_trait]
impl DurationProber for LoftyProber {
    async fn probe_ms(&self, path: &Path) -> f64 {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::probe_blocking(path))
            .await
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_coercion() {
        assert_eq!(duration_ms_from_probe(f64::NAN), 0);
        assert_eq!(duration_ms_from_probe(f64::INFINITY), 0);
        assert_eq!(duration_ms_from_probe(f64::NEG_INFINITY), 0);
        assert_eq!(duration_ms_from_probe(-5.0), 0);
        assert_eq!(duration_ms_from_probe(0.0), 0);
        assert_eq!(duration_ms_from_probe(1234.4), 1234);
        assert_eq!(duration_ms_from_probe(1234.6), 1235);
    }

    #[tokio::test]
    async fn test_lofty_probe_of_garbage_is_zero() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("fake.mp3");
        tokio::fs::write(&path, b"not really audio").await.unwrap();

        let ms = LoftyProber::new().probe_ms(&path).await;
        assert_eq!(duration_ms_from_probe(ms), 0);
    }

    #[tokio::test]
    async fn test_lofty_probe_of_missing_file_is_zero() {
        let ms = LoftyProber::new().probe_ms(Path::new("/no/such/file.m4a")).await;
        assert_eq!(ms, 0.0);
    }
}
