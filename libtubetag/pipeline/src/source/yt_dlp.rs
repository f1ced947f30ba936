use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use lazy_regex::regex_is_match;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info, warn};
use youtube_dl::{Format, SingleVideo, YoutubeDl, YoutubeDlOutput};

use super::{MediaSource, SourceError, SourceListing, ThumbnailClient};
use crate::dto::media_metadata::{MediaMetadata, SourceId};
use crate::dto::stream_handle::StreamHandle;
use crate::scope::ResourceScope;
use crate::settings::Settings;
use crate::util::{ExeNotFound, find_exe, stderr_tail};

#[derive(Error, Debug)]
pub enum SourceSetupError {
    #[error(transparent)]
    Exe(#[from] ExeNotFound),
    #[error("Error creating http client: {0}")]
    Http(#[from] reqwest::Error),
}

/// [`MediaSource`] backed by the yt-dlp executable. Metadata comes from a single `--dump-json`
/// style invocation, stream bytes from a second invocation pinned to the chosen format id.
#[derive(Clone, Debug)]
pub struct YtDlpMediaSource {
    yt_dlp_path: PathBuf,
    thumbnails: ThumbnailClient,
}

impl YtDlpMediaSource {
    pub fn new(settings: &Settings) -> Result<Self, SourceSetupError> {
        Ok(Self {
            yt_dlp_path: find_exe(settings.yt_dlp_path.as_deref(), "YT_DLP_PATH", "yt-dlp")?,
            thumbnails: ThumbnailClient::new(settings.thumbnail_retries)?,
        })
    }
}

#[async_trait]
impl MediaSource for YtDlpMediaSource {
    async fn inspect(&self, source_id: &SourceId) -> Result<SourceListing, SourceError> {
        info!("extracting metadata for {source_id} - this may take a few seconds");
        let mut command = YoutubeDl::new(source_id.as_str());
        command.youtube_dl_path(&self.yt_dlp_path);
        command.extra_arg("--no-playlist");
        let output = command.run_async().await.map_err(|e| match e {
            youtube_dl::Error::ExitCode { code, stderr } => {
                error!("yt-dlp exited with {code}: {stderr}");
                classify_provider_error(&stderr)
            }
            e => SourceError::Provider(format!("error running yt-dlp: {e}")),
        })?;
        info!("metadata extraction complete");

        match output {
            YoutubeDlOutput::SingleVideo(video) => {
                info!("found single video: {:?}", video.title);
                ProviderVideo::from(*video).into_listing(source_id)
            }
            YoutubeDlOutput::Playlist(playlist) => {
                warn!("found playlist: {:?}", playlist.title);
                Err(SourceError::Provider(
                    "playlists are not supported".to_owned(),
                ))
            }
        }
    }

    async fn download(
        &self,
        handle: &StreamHandle,
        destination: &Path,
        scope: &mut ResourceScope,
    ) -> Result<u64, SourceError> {
        info!(
            "downloading format {} of {} to {destination:?}",
            handle.format_id, handle.source
        );
        let mut command = Command::new(&self.yt_dlp_path);
        command
            .args([
                "--no-playlist",
                "--no-part",
                "--no-progress",
                "--no-warnings",
                "--quiet",
                "--force-overwrites",
                "--no-cache-dir",
            ])
            .args(["-f", &handle.format_id])
            .arg("-o")
            .arg(destination)
            .arg("--")
            .arg(&handle.source)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let output = scope.spawn(command)?.wait_with_output().await?;
        if !output.status.success() {
            let stderr = stderr_tail(&output.stderr);
            error!("yt-dlp download failed with {}: {stderr}", output.status);
            return Err(SourceError::Download(stderr));
        }

        let len = tokio::fs::metadata(destination)
            .await
            .map_err(|e| SourceError::Download(format!("downloaded file missing: {e}")))?
            .len();
        if len == 0 {
            return Err(SourceError::Download("downloaded file is empty".to_owned()));
        }
        if let Some(expected) = handle.filesize
            && expected != len
        {
            warn!("expected {expected} bytes but downloaded {len}");
        }
        info!("download complete, {len} bytes");
        Ok(len)
    }

    async fn fetch_thumbnail(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        self.thumbnails.fetch(url).await
    }
}

/// Maps yt-dlp's error output onto the error taxonomy. Access restrictions are checked first since
/// yt-dlp often prefixes them with "Video unavailable".
pub(crate) fn classify_provider_error(stderr: &str) -> SourceError {
    let message = stderr_tail(stderr.as_bytes());
    if regex_is_match!(
        r"(?i)(sign in to confirm|age[- ]restricted|inappropriate for some users|available in your country|geo[- ]?restrict|private video|members[- ]only|requires payment|blocked it)",
        stderr
    ) {
        SourceError::Unavailable(message)
    } else if regex_is_match!(
        r"(?i)(unsupported url|is not a valid url|video unavailable|does not exist|incomplete youtube id|http error 404|name or service not known)",
        stderr
    ) {
        SourceError::NotFound(message)
    } else {
        SourceError::Provider(message)
    }
}

/// The subset of yt-dlp's output the pipeline relies on, before validation.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProviderVideo {
    pub(crate) id: String,
    pub(crate) title: Option<String>,
    pub(crate) uploader: Option<String>,
    pub(crate) channel: Option<String>,
    pub(crate) duration: Option<f64>,
    pub(crate) thumbnail: Option<String>,
    pub(crate) formats: Vec<ProviderFormat>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ProviderFormat {
    pub(crate) format_id: Option<String>,
    pub(crate) acodec: Option<String>,
    pub(crate) vcodec: Option<String>,
    pub(crate) abr: Option<f64>,
    pub(crate) tbr: Option<f64>,
    pub(crate) ext: Option<String>,
    pub(crate) height: Option<u32>,
    pub(crate) filesize: Option<u64>,
}

impl From<SingleVideo> for ProviderVideo {
    fn from(video: SingleVideo) -> Self {
        Self {
            id: video.id,
            title: video.title,
            uploader: video.uploader,
            channel: video.channel,
            duration: video.duration.as_ref().and_then(|d| d.as_f64()),
            thumbnail: video.thumbnail,
            formats: video
                .formats
                .unwrap_or_default()
                .into_iter()
                .map(ProviderFormat::from)
                .collect(),
        }
    }
}

impl From<Format> for ProviderFormat {
    fn from(format: Format) -> Self {
        Self {
            format_id: format.format_id,
            acodec: format.acodec,
            vcodec: format.vcodec,
            abr: format.abr.map(|b| b as f64),
            tbr: format.tbr.map(|b| b as f64),
            ext: format.ext,
            height: format.height.map(|h| h as u32),
            filesize: format.filesize.map(|s| s as u64),
        }
    }
}

/// Blank values count as missing. Present values are kept as the provider sent them.
fn required(value: Option<String>, field: &str) -> Result<String, SourceError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(SourceError::Provider(format!(
            "provider response is missing {field}"
        ))),
    }
}

impl ProviderVideo {
    pub(crate) fn into_listing(self, source_id: &SourceId) -> Result<SourceListing, SourceError> {
        let title = required(self.title, "title")?;
        let author = required(self.uploader.or(self.channel), "uploader")?;
        let thumbnail_url = required(self.thumbnail, "thumbnail")?;
        let duration_seconds = match self.duration {
            Some(duration) if duration.is_finite() && duration >= 0.0 => duration.round() as u64,
            _ => {
                // live streams don't report a duration
                warn!("no duration reported for {source_id}");
                0
            }
        };

        let streams = self
            .formats
            .into_iter()
            .filter_map(|format| {
                let Some(format_id) = format.format_id else {
                    warn!("skipping format without an id");
                    return None;
                };
                Some(StreamHandle {
                    source: source_id.as_str().to_owned(),
                    format_id,
                    bitrate_kbps: format.abr.or(format.tbr).unwrap_or(0.0),
                    extension: format.ext,
                    audio_codec: format.acodec,
                    video_codec: format.vcodec,
                    height: format.height,
                    filesize: format.filesize,
                })
            })
            .collect();

        Ok(SourceListing {
            metadata: MediaMetadata {
                id: self.id,
                title,
                author,
                duration_seconds,
                thumbnail_url,
            },
            streams,
        })
    }
}

#[cfg(all(test, unix))]
#[path = "./yt_dlp_test.rs"]
mod yt_dlp_test;
