//! Object key conventions for input and resized artifacts.
//!
//! Pure string functions with no I/O. The input key encodes the resize
//! parameters in its first path segment; the resize worker writes its result
//! under the same segment prefixed with `resized-`, so the output location can
//! be derived locally from the input key alone.

use crate::models::JobParameters;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Output format the resize worker produces unless configured otherwise.
pub const DEFAULT_OUTPUT_EXTENSION: &str = "jpeg";

const OUTPUT_PREFIX: &str = "resized-";
const LEGACY_PREFIX: &str = "quality";

/// Storage key of an uploaded input artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage key where the resized artifact is expected to appear.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputLocation(String);

impl OutputLocation {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OutputLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unrecognized object key layout: {key}")]
pub struct KeyParseError {
    pub key: String,
}

/// Structural reading of an object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyShape<'a> {
    /// `q{quality}_w{width}_h{height}/{name}`
    Current {
        prefix: &'a str,
        quality: u32,
        max_width: u32,
        max_height: u32,
        name: &'a str,
    },
    /// `quality{quality}/{name}`, written by older uploaders.
    Legacy {
        prefix: &'a str,
        quality: u32,
        name: &'a str,
    },
    Unrecognized,
}

impl<'a> KeyShape<'a> {
    fn prefix_and_name(&self) -> Option<(&'a str, &'a str)> {
        match *self {
            KeyShape::Current { prefix, name, .. } | KeyShape::Legacy { prefix, name, .. } => {
                Some((prefix, name))
            }
            KeyShape::Unrecognized => None,
        }
    }
}

fn parameter_prefix(quality: u8, max_width: u32, max_height: u32) -> String {
    format!("q{}_w{}_h{}", quality, max_width, max_height)
}

/// Build the input key for a job. Same parameters, same key.
pub fn build_input_key(params: &JobParameters) -> ObjectKey {
    ObjectKey(format!(
        "{}/{}",
        parameter_prefix(params.quality, params.max_width, params.max_height),
        params.file_name
    ))
}

fn parse_number(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn parse_current(prefix: &str) -> Option<(u32, u32, u32)> {
    let rest = prefix.strip_prefix('q')?;
    let (quality, rest) = rest.split_once("_w")?;
    let (width, height) = rest.split_once("_h")?;
    Some((
        parse_number(quality)?,
        parse_number(width)?,
        parse_number(height)?,
    ))
}

pub fn parse_key(key: &str) -> KeyShape<'_> {
    let Some((prefix, name)) = key.split_once('/') else {
        return KeyShape::Unrecognized;
    };
    if name.is_empty() {
        return KeyShape::Unrecognized;
    }

    if let Some((quality, max_width, max_height)) = parse_current(prefix) {
        return KeyShape::Current {
            prefix,
            quality,
            max_width,
            max_height,
            name,
        };
    }

    match prefix.strip_prefix(LEGACY_PREFIX).and_then(parse_number) {
        Some(quality) => KeyShape::Legacy {
            prefix,
            quality,
            name,
        },
        None => KeyShape::Unrecognized,
    }
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot > 0 && !name[..dot].ends_with('/') && !name[dot..].contains('/') => {
            &name[..dot]
        }
        _ => name,
    }
}

/// Derive where the resize worker will write the result for `input_key`.
pub fn derive_output_location(
    input_key: &ObjectKey,
    output_extension: &str,
) -> std::result::Result<OutputLocation, KeyParseError> {
    let (prefix, name) =
        parse_key(input_key.as_str())
            .prefix_and_name()
            .ok_or_else(|| KeyParseError {
                key: input_key.to_string(),
            })?;

    Ok(OutputLocation(format!(
        "{}{}/{}.{}",
        OUTPUT_PREFIX,
        prefix,
        strip_extension(name),
        output_extension
    )))
}

/// File name to show (or save as) for a key: its last path segment.
pub fn extract_display_name(key: &str) -> String {
    match key.rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name.to_string(),
        _ => format!("{}image.{}", OUTPUT_PREFIX, DEFAULT_OUTPUT_EXTENSION),
    }
}
