//! In-memory stand-ins for the provider and the encoder, for tests and local development.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::dto::audio_buffer::{EncodedAudioBuffer, RawAudioBuffer};
use crate::dto::media_metadata::{MediaMetadata, SourceId};
use crate::dto::stream_handle::StreamHandle;
use crate::scope::ResourceScope;
use crate::source::{MediaSource, SourceError, SourceListing};
use crate::transcoder::{TranscodeError, TranscodeOptions, Transcoder};

// MPEG-1 Layer III, 128kbps, 44.1kHz, joint stereo, no CRC
const FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x64];
// 144 * bitrate / sample rate
const FRAME_LEN: usize = 417;

/// A run of silent MPEG frames with no tags. Every byte after a frame header is zero, which is
/// enough for tag readers that only need to locate the audio.
pub fn silent_mp3(frames: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(frames * FRAME_LEN);
    for _ in 0..frames {
        bytes.extend_from_slice(&FRAME_HEADER);
        bytes.resize(bytes.len() + FRAME_LEN - FRAME_HEADER.len(), 0);
    }
    bytes
}

/// Smallest useful JPEG: the start-of-image marker followed by filler and end-of-image.
pub fn tiny_jpeg() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    bytes.extend_from_slice(b"JFIF\0");
    bytes.extend_from_slice(&[0x01; 32]);
    bytes.extend_from_slice(&[0xFF, 0xD9]);
    bytes
}

pub fn tiny_png() -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x0D]);
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&[0x02; 17]);
    bytes
}

/// How a fake encoder script behaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FakeEncoder {
    /// Copies its input to its output unchanged
    Copy,
    /// Writes a diagnostic to stderr and exits with status 1
    Fail,
    /// Sleeps for the given number of seconds without producing output
    Hang(u32),
}

/// Writes an executable shell script to `dir` that accepts the same `-i <input> ... <output>`
/// arguments as ffmpeg, and returns its path. `pipe:0` and `pipe:1` are honored.
#[cfg(unix)]
pub fn write_fake_encoder(dir: &Path, behavior: FakeEncoder) -> io::Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let body = match behavior {
        FakeEncoder::Copy => r#"
input=""
output=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-i" ]; then input="$arg"; fi
  prev="$arg"
  output="$arg"
done
if [ "$input" = "pipe:0" ]; then input="-"; fi
if [ "$output" = "pipe:1" ]; then
  cat -- "$input"
else
  cat -- "$input" > "$output"
fi
"#
        .to_owned(),
        FakeEncoder::Fail => {
            "echo 'Invalid data found when processing input' >&2\nexit 1\n".to_owned()
        }
        FakeEncoder::Hang(seconds) => format!("sleep {seconds}\n"),
    };

    let path = dir.join(format!("fake-ffmpeg-{behavior:?}").to_lowercase());
    std::fs::write(&path, format!("#!/bin/sh\n{body}"))?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

/// How a fake yt-dlp script behaves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FakeYtDlp {
    /// Prints `listing` for metadata requests and writes `media` to the `-o` path for downloads
    Serve { listing: String, media: Vec<u8> },
    /// Writes the message to stderr and exits with status 1
    Fail(String),
}

/// File in the script's directory that every fake yt-dlp run appends its arguments to, one per
/// line.
pub const FAKE_YT_DLP_ARGS: &str = "yt-dlp-args";

/// Writes an executable shell script to `dir` that stands in for yt-dlp, and returns its path.
/// A run with `-o <path>` is a download; any other run is a metadata request.
#[cfg(unix)]
pub fn write_fake_yt_dlp(dir: &Path, behavior: &FakeYtDlp) -> io::Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let body = match behavior {
        FakeYtDlp::Serve { listing, media } => {
            std::fs::write(dir.join("yt-dlp-listing.json"), listing)?;
            std::fs::write(dir.join("yt-dlp-media"), media)?;
            r#"
output=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then output="$arg"; fi
  prev="$arg"
done
if [ -z "$output" ]; then
  cat "$dir/yt-dlp-listing.json"
else
  cat "$dir/yt-dlp-media" > "$output"
fi
"#
        }
        FakeYtDlp::Fail(stderr) => {
            std::fs::write(dir.join("yt-dlp-stderr"), stderr)?;
            "cat \"$dir/yt-dlp-stderr\" >&2\nexit 1\n"
        }
    };

    let path = dir.join("fake-yt-dlp");
    std::fs::write(
        &path,
        format!(
            "#!/bin/sh\ndir=\"$(dirname \"$0\")\"\nprintf '%s\\n' \"$@\" >> \"$dir/{FAKE_YT_DLP_ARGS}\"\n{body}"
        ),
    )?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

/// A provider with a fixed listing. Thumbnail URLs that weren't registered respond with a 404.
#[derive(Debug)]
pub struct MockMediaSource {
    listing: SourceListing,
    audio: Vec<u8>,
    thumbnails: HashMap<String, Vec<u8>>,
    inspect_error: Option<SourceError>,
    download_error: Option<SourceError>,
    thumbnail_delay: Option<Duration>,
    requested_thumbnails: Mutex<Vec<String>>,
}

impl MockMediaSource {
    pub fn new(metadata: MediaMetadata) -> Self {
        Self {
            listing: SourceListing {
                metadata,
                streams: Vec::new(),
            },
            audio: silent_mp3(20),
            thumbnails: HashMap::new(),
            inspect_error: None,
            download_error: None,
            thumbnail_delay: None,
            requested_thumbnails: Mutex::new(Vec::new()),
        }
    }

    /// An audio-only stream descriptor for `source`.
    pub fn audio_stream(source: &str, format_id: &str, bitrate_kbps: f64) -> StreamHandle {
        StreamHandle {
            source: source.to_owned(),
            format_id: format_id.to_owned(),
            bitrate_kbps,
            extension: Some("webm".to_owned()),
            audio_codec: Some("opus".to_owned()),
            video_codec: Some("none".to_owned()),
            height: None,
            filesize: None,
        }
    }

    pub fn with_stream(mut self, stream: StreamHandle) -> Self {
        self.listing.streams.push(stream);
        self
    }

    /// Bytes written by every download.
    pub fn with_audio(mut self, audio: Vec<u8>) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.thumbnails.insert(url.into(), bytes);
        self
    }

    pub fn failing_inspect(mut self, error: SourceError) -> Self {
        self.inspect_error = Some(error);
        self
    }

    pub fn failing_download(mut self, error: SourceError) -> Self {
        self.download_error = Some(error);
        self
    }

    /// Every thumbnail request waits this long before answering.
    pub fn with_thumbnail_delay(mut self, delay: Duration) -> Self {
        self.thumbnail_delay = Some(delay);
        self
    }

    /// Thumbnail URLs requested so far, in order.
    pub fn requested_thumbnails(&self) -> Vec<String> {
        self.requested_thumbnails
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MediaSource for MockMediaSource {
    async fn inspect(&self, source_id: &SourceId) -> Result<SourceListing, SourceError> {
        info!("mock inspect {source_id}");
        match &self.inspect_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.listing.clone()),
        }
    }

    async fn download(
        &self,
        handle: &StreamHandle,
        destination: &Path,
        _scope: &mut ResourceScope,
    ) -> Result<u64, SourceError> {
        info!("mock download {} to {destination:?}", handle.format_id);
        if let Some(e) = &self.download_error {
            return Err(e.clone());
        }
        tokio::fs::write(destination, &self.audio)
            .await
            .map_err(|e| SourceError::Download(e.to_string()))?;
        Ok(self.audio.len() as u64)
    }

    async fn fetch_thumbnail(&self, url: &str) -> Result<Vec<u8>, SourceError> {
        if let Ok(mut requested) = self.requested_thumbnails.lock() {
            requested.push(url.to_owned());
        }
        if let Some(delay) = self.thumbnail_delay {
            tokio::time::sleep(delay).await;
        }
        self.thumbnails
            .get(url)
            .cloned()
            .ok_or(SourceError::ThumbnailStatus(404))
    }
}

/// In-process [`Transcoder`] that never starts a subprocess.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockTranscoder {
    /// Output is the input, copied through a file in the request's scope
    Copy,
    /// Fails like an encoder that exited with status 1
    Fail,
    /// Never finishes
    Hang,
}

#[async_trait]
impl Transcoder for MockTranscoder {
    async fn transcode(
        &self,
        scope: &mut ResourceScope,
        raw: &RawAudioBuffer,
        options: &TranscodeOptions,
    ) -> Result<EncodedAudioBuffer, TranscodeError> {
        match self {
            Self::Copy => {
                let output = scope.new_temp_file(&format!(".{}", options.format))?;
                tokio::fs::copy(raw.path(), &output).await?;
                Ok(EncodedAudioBuffer::new(tokio::fs::read(&output).await?))
            }
            Self::Fail => Err(TranscodeError::ExitStatus {
                status: "exit status: 1".to_owned(),
                stderr: "Invalid data found when processing input".to_owned(),
            }),
            Self::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TranscodeError::EmptyOutput)
            }
        }
    }
}
