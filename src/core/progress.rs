//! Import progress reporting.
//!
//! Progress is a fraction in `[0, 1]` plus a phase message. The reporter
//! clamps every update so the fraction seen by listeners never decreases.

use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// One progress update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportProgress {
    /// Completed fraction, non-decreasing over one import call
    pub fraction: f64,

    /// Human-readable phase message
    pub message: String,
}

/// Sends progress updates to an optional listener
#[derive(Debug, Default)]
pub struct ProgressReporter {
    tx: Option<UnboundedSender<ImportProgress>>,
    last: Mutex<f64>,
}

impl ProgressReporter {
    /// Report to `tx`
    pub fn new(tx: UnboundedSender<ImportProgress>) -> Self {
        Self {
            tx: Some(tx),
            last: Mutex::new(0.0),
        }
    }

    /// Discard all updates
    pub fn silent() -> Self {
        Self::default()
    }

    /// Emit an update; lower fractions than the last one are raised to it
    pub fn report(&self, fraction: f64, message: impl Into<String>) {
        let fraction = {
            let mut last = match self.last.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let clamped = if fraction.is_finite() {
                fraction.clamp(0.0, 1.0)
            } else {
                *last
            };
            *last = last.max(clamped);
            *last
        };

        if let Some(tx) = &self.tx {
            // A dropped receiver just means nobody is listening
            let _ = tx.send(ImportProgress {
                fraction,
                message: message.into(),
            });
        }
    }

    /// Last fraction reported
    pub fn fraction(&self) -> f64 {
        match self.last.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Fraction math for a batch of tracks.
///
/// After `done` of `total` tracks the fraction is
/// `base + remaining × done / total`, where `remaining = 1 − base`.
#[derive(Debug, Clone, Copy)]
pub struct BatchProgress {
    base: f64,
    total: usize,
}

impl BatchProgress {
    pub fn new(base: f64, total: usize) -> Self {
        Self {
            base: base.clamp(0.0, 1.0),
            total,
        }
    }

    /// Fraction after `done` tracks have finished (committed or skipped)
    pub fn after(&self, done: usize) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        let remaining = 1.0 - self.base;
        self.base + remaining * (done.min(self.total) as f64 / self.total as f64)
    }
}
