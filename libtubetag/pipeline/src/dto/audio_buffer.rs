use std::path::{Path, PathBuf};

/// Downloaded, un-transcoded audio. The bytes live in a temp file owned by the request's scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAudioBuffer {
    path: PathBuf,
    len: u64,
    extension: String,
}

impl RawAudioBuffer {
    pub fn new(path: PathBuf, len: u64, extension: impl Into<String>) -> Self {
        Self {
            path,
            len,
            extension: extension.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }
}

/// Transcoded MP3 audio held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudioBuffer(Vec<u8>);

impl EncodedAudioBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
