mod http;
mod yt_dlp;

use std::path::Path;

use async_trait::async_trait;
pub(crate) use http::*;
use thiserror::Error;
use tracing::info;
pub use yt_dlp::*;

use crate::dto::media_metadata::{MediaMetadata, SourceId};
use crate::dto::pipeline_error::{Classify, ErrorKind};
use crate::dto::stream_handle::StreamHandle;
use crate::scope::{ResourceScope, ScopeError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Source not found: {0}")]
    NotFound(String),
    #[error("Access denied by source: {0}")]
    Unavailable(String),
    #[error("No audio stream found")]
    NoAudioStream,
    #[error("No progressive mp4 stream found")]
    NoVideoStream,
    #[error("Download failed: {0}")]
    Download(String),
    #[error("Thumbnail request returned status {0}")]
    ThumbnailStatus(u16),
    #[error("Thumbnail request failed: {0}")]
    Thumbnail(String),
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Scope error: {0}")]
    Scope(String),
}

impl From<ScopeError> for SourceError {
    fn from(e: ScopeError) -> Self {
        Self::Scope(e.to_string())
    }
}

impl Classify for SourceError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::NoVideoStream => ErrorKind::NotFound,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::NoAudioStream => ErrorKind::NoAudioStream,
            Self::Download(_) | Self::ThumbnailStatus(_) | Self::Thumbnail(_) => {
                ErrorKind::DownloadError
            }
            Self::Provider(_) => ErrorKind::ProviderError,
            Self::Scope(_) => ErrorKind::InternalError,
        }
    }
}

/// Everything the provider reports about a media item in one round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceListing {
    pub metadata: MediaMetadata,
    /// Streams in the provider's enumeration order
    pub streams: Vec<StreamHandle>,
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn inspect(&self, source_id: &SourceId) -> Result<SourceListing, SourceError>;

    async fn resolve(&self, source_id: &SourceId) -> Result<MediaMetadata, SourceError> {
        Ok(self.inspect(source_id).await?.metadata)
    }

    async fn select_audio_stream(&self, source_id: &SourceId) -> Result<StreamHandle, SourceError> {
        select_audio_stream(&self.inspect(source_id).await?.streams)
    }

    /// Writes the stream's bytes to `destination` and returns the number of bytes written. Any
    /// subprocess used for the transfer is spawned under `scope`.
    async fn download(
        &self,
        handle: &StreamHandle,
        destination: &Path,
        scope: &mut ResourceScope,
    ) -> Result<u64, SourceError>;

    async fn fetch_thumbnail(&self, url: &str) -> Result<Vec<u8>, SourceError>;
}

/// Picks the audio-only stream with the highest bitrate. Ties go to the stream the provider listed
/// first, so identical provider responses always give the same choice.
pub fn select_audio_stream(streams: &[StreamHandle]) -> Result<StreamHandle, SourceError> {
    let best = streams
        .iter()
        .filter(|s| s.is_audio_only())
        .fold(None::<&StreamHandle>, |best, stream| match best {
            Some(best) if stream.bitrate_kbps <= best.bitrate_kbps => Some(best),
            _ => Some(stream),
        })
        .ok_or(SourceError::NoAudioStream)?;

    info!(
        "selected audio stream {} at {}kbps ({:?})",
        best.format_id, best.bitrate_kbps, best.audio_codec
    );
    Ok(best.clone())
}

/// Picks the highest resolution stream that carries both audio and video in an mp4 container.
pub fn select_progressive_video(streams: &[StreamHandle]) -> Result<StreamHandle, SourceError> {
    streams
        .iter()
        .filter(|s| s.has_audio() && s.has_video() && s.extension.as_deref() == Some("mp4"))
        .fold(None::<&StreamHandle>, |best, stream| match best {
            Some(best)
                if (stream.height.unwrap_or(0), stream.bitrate_kbps)
                    <= (best.height.unwrap_or(0), best.bitrate_kbps) =>
            {
                Some(best)
            }
            _ => Some(stream),
        })
        .cloned()
        .ok_or(SourceError::NoVideoStream)
}

/// Thumbnail URLs to try, best first.
pub fn thumbnail_candidates(primary_pattern: Option<&str>, metadata: &MediaMetadata) -> Vec<String> {
    let mut candidates = Vec::with_capacity(2);
    if let Some(pattern) = primary_pattern
        && !metadata.id.is_empty()
    {
        candidates.push(pattern.replace("{id}", &urlencoding::encode(&metadata.id)));
    }
    if !metadata.thumbnail_url.is_empty() && !candidates.contains(&metadata.thumbnail_url) {
        candidates.push(metadata.thumbnail_url.clone());
    }
    candidates
}

#[cfg(test)]
#[path = "./source_test.rs"]
mod source_test;
