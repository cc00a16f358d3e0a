//! Manifest decoding.
//!
//! Decoding runs in three layers over an in-memory buffer:
//! 1. content sniff (non-empty, first non-whitespace byte is `{` or `[`)
//! 2. JSON syntax
//! 3. schema walk reporting the path of the first offending field
//!
//! Only a document that passes all three is turned into a [`BundleManifest`].

use serde_json::{Map, Value};
use thiserror::Error;

use super::model::BundleManifest;

/// Errors produced while decoding a manifest
#[derive(Debug, Error)]
pub enum ManifestParseError {
    #[error("Manifest is not JSON: {0}")]
    NotJson(String),

    #[error("Malformed manifest JSON at line {line}, column {column}: {message}")]
    Malformed {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Invalid manifest at {path}: {message}")]
    Schema { path: String, message: String },
}

impl ManifestParseError {
    fn schema(path: &str, message: impl Into<String>) -> Self {
        Self::Schema {
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Path of the offending field, for schema errors
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Schema { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Reject payloads that cannot be a JSON manifest without parsing them
pub fn sniff(bytes: &[u8]) -> Result<(), ManifestParseError> {
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        None => Err(ManifestParseError::NotJson("empty payload".to_string())),
        Some(b'{') | Some(b'[') => Ok(()),
        Some(b) => Err(ManifestParseError::NotJson(format!(
            "unexpected leading byte {:?}",
            char::from(*b)
        ))),
    }
}

/// Decode and validate a bundle manifest
pub fn decode(bytes: &[u8]) -> Result<BundleManifest, ManifestParseError> {
    sniff(bytes)?;

    let value: Value = serde_json::from_slice(bytes).map_err(|e| ManifestParseError::Malformed {
        line: e.line(),
        column: e.column(),
        message: e.to_string(),
    })?;

    validate_bundle(&value)?;

    serde_json::from_value(value).map_err(|e| ManifestParseError::schema("$", e.to_string()))
}

fn validate_bundle(value: &Value) -> Result<(), ManifestParseError> {
    let root = as_object(value, "$")?;
    optional_str(root, "id", "$")?;
    require_title(root, "$")?;

    let packs = require_array(root, "packs", "$")?;
    for (i, pack) in packs.iter().enumerate() {
        validate_pack(pack, &format!("$.packs[{}]", i))?;
    }
    Ok(())
}

fn validate_pack(value: &Value, path: &str) -> Result<(), ManifestParseError> {
    let pack = as_object(value, path)?;
    optional_str(pack, "id", path)?;
    require_title(pack, path)?;
    for key in ["author", "coverUrl", "coverFilename", "languageHint"] {
        optional_str(pack, key, path)?;
    }

    let tracks = require_array(pack, "tracks", path)?;
    for (i, track) in tracks.iter().enumerate() {
        validate_track(track, &format!("{}.tracks[{}]", path, i))?;
    }
    Ok(())
}

fn validate_track(value: &Value, path: &str) -> Result<(), ManifestParseError> {
    let track = as_object(value, path)?;
    optional_str(track, "id", path)?;
    require_title(track, path)?;
    for key in ["url", "filename", "languageCode"] {
        optional_str(track, key, path)?;
    }
    optional_u64(track, "durationMs", path)?;

    if let Some(tags) = optional_array(track, "tags", path)? {
        for (i, tag) in tags.iter().enumerate() {
            if !tag.is_string() {
                return Err(ManifestParseError::schema(
                    &format!("{}.tags[{}]", path, i),
                    "expected string",
                ));
            }
        }
    }

    if let Some(sets) = optional_array(track, "practiceSets", path)? {
        for (i, set) in sets.iter().enumerate() {
            validate_practice_set(set, &format!("{}.practiceSets[{}]", path, i))?;
        }
    }

    if let Some(spans) = optional_array(track, "transcripts", path)? {
        for (i, span) in spans.iter().enumerate() {
            validate_transcript(span, &format!("{}.transcripts[{}]", path, i))?;
        }
    }
    Ok(())
}

fn validate_practice_set(value: &Value, path: &str) -> Result<(), ManifestParseError> {
    let set = as_object(value, path)?;
    optional_str(set, "id", path)?;
    optional_str(set, "title", path)?;
    if let Some(v) = non_null(set, "isFavorite") {
        if !v.is_boolean() {
            return Err(ManifestParseError::schema(
                &field_path(path, "isFavorite"),
                "expected boolean",
            ));
        }
    }

    if let Some(clips) = optional_array(set, "clips", path)? {
        for (i, clip) in clips.iter().enumerate() {
            validate_clip(clip, &format!("{}.clips[{}]", path, i))?;
        }
    }
    Ok(())
}

fn validate_clip(value: &Value, path: &str) -> Result<(), ManifestParseError> {
    let clip = as_object(value, path)?;
    optional_str(clip, "id", path)?;
    optional_str(clip, "title", path)?;
    optional_str(clip, "languageCode", path)?;
    require_range(clip, path)?;

    match non_null(clip, "kind") {
        Some(Value::String(kind)) if matches!(kind.as_str(), "drill" | "skip" | "noise") => {}
        Some(Value::String(kind)) => {
            return Err(ManifestParseError::schema(
                &field_path(path, "kind"),
                format!("unknown clip kind '{}'", kind),
            ))
        }
        Some(_) => {
            return Err(ManifestParseError::schema(
                &field_path(path, "kind"),
                "expected string",
            ))
        }
        None => {
            return Err(ManifestParseError::schema(
                &field_path(path, "kind"),
                "missing required field",
            ))
        }
    }

    if let Some(repeats) = optional_u64(clip, "repeats", path)? {
        if repeats > u64::from(u32::MAX) {
            return Err(ManifestParseError::schema(
                &field_path(path, "repeats"),
                "out of range",
            ));
        }
    }

    for key in ["startSpeed", "endSpeed"] {
        if let Some(v) = non_null(clip, key) {
            match v.as_f64() {
                Some(speed) if speed > 0.0 && speed <= 4.0 => {}
                Some(_) => {
                    return Err(ManifestParseError::schema(
                        &field_path(path, key),
                        "speed must be in (0, 4]",
                    ))
                }
                None => {
                    return Err(ManifestParseError::schema(
                        &field_path(path, key),
                        "expected number",
                    ))
                }
            }
        }
    }
    Ok(())
}

fn validate_transcript(value: &Value, path: &str) -> Result<(), ManifestParseError> {
    let span = as_object(value, path)?;
    require_range(span, path)?;
    match non_null(span, "text") {
        Some(Value::String(_)) => {}
        Some(_) => {
            return Err(ManifestParseError::schema(
                &field_path(path, "text"),
                "expected string",
            ))
        }
        None => {
            return Err(ManifestParseError::schema(
                &field_path(path, "text"),
                "missing required field",
            ))
        }
    }
    optional_str(span, "speaker", path)?;
    optional_str(span, "languageCode", path)?;
    Ok(())
}

// ============================================================================
// Field helpers
// ============================================================================

fn field_path(path: &str, key: &str) -> String {
    format!("{}.{}", path, key)
}

/// Field value, treating explicit `null` as absent
fn non_null<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    obj.get(key).filter(|v| !v.is_null())
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, ManifestParseError> {
    value
        .as_object()
        .ok_or_else(|| ManifestParseError::schema(path, "expected object"))
}

fn require_title(obj: &Map<String, Value>, path: &str) -> Result<(), ManifestParseError> {
    let title_path = field_path(path, "title");
    match non_null(obj, "title") {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(()),
        Some(Value::String(_)) => Err(ManifestParseError::schema(&title_path, "must not be empty")),
        Some(_) => Err(ManifestParseError::schema(&title_path, "expected string")),
        None => Err(ManifestParseError::schema(&title_path, "missing required field")),
    }
}

fn optional_str(obj: &Map<String, Value>, key: &str, path: &str) -> Result<(), ManifestParseError> {
    match non_null(obj, key) {
        None | Some(Value::String(_)) => Ok(()),
        Some(_) => Err(ManifestParseError::schema(&field_path(path, key), "expected string")),
    }
}

fn optional_u64(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<u64>, ManifestParseError> {
    match non_null(obj, key) {
        None => Ok(None),
        Some(v) => v.as_u64().map(Some).ok_or_else(|| {
            ManifestParseError::schema(&field_path(path, key), "expected non-negative integer")
        }),
    }
}

fn require_u64(obj: &Map<String, Value>, key: &str, path: &str) -> Result<u64, ManifestParseError> {
    optional_u64(obj, key, path)?
        .ok_or_else(|| ManifestParseError::schema(&field_path(path, key), "missing required field"))
}

fn require_range(obj: &Map<String, Value>, path: &str) -> Result<(), ManifestParseError> {
    let start = require_u64(obj, "startMs", path)?;
    let end = require_u64(obj, "endMs", path)?;
    if start > end {
        return Err(ManifestParseError::schema(
            &field_path(path, "endMs"),
            format!("endMs {} precedes startMs {}", end, start),
        ));
    }
    Ok(())
}

fn optional_array<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<&'a Vec<Value>>, ManifestParseError> {
    match non_null(obj, key) {
        None => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(_) => Err(ManifestParseError::schema(&field_path(path, key), "expected array")),
    }
}

fn require_array<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a Vec<Value>, ManifestParseError> {
    optional_array(obj, key, path)?
        .ok_or_else(|| ManifestParseError::schema(&field_path(path, key), "missing required field"))
}
