use std::fmt;

use crate::dto::pipeline_error::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("No URL provided")]
    Missing,
    #[error("Invalid source identifier: {0:?}")]
    Malformed(String),
}

impl Classify for InputError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::InputError
    }
}

/// Opaque reference to a remote media item, usually a URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId(String);

impl SourceId {
    pub fn parse(raw: &str) -> Result<Self, InputError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InputError::Missing);
        }
        // Identifiers are handed to yt-dlp as a positional argument, so anything that looks like a
        // flag has to be rejected here.
        if trimmed.starts_with('-') || trimmed.chars().any(char::is_control) {
            return Err(InputError::Malformed(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMetadata {
    /// Provider-side key of the item. Used to build thumbnail URL patterns.
    pub id: String,
    pub title: String,
    pub author: String,
    pub duration_seconds: u64,
    pub thumbnail_url: String,
}
