use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::dto::audio_buffer::{EncodedAudioBuffer, RawAudioBuffer};
use crate::dto::pipeline_error::{Classify, ErrorKind};
use crate::scope::{ResourceScope, ScopeError};
use crate::util::stderr_tail;

/// Every request is transcoded to the same format.
pub const TARGET_BITRATE_KBPS: u32 = 192;
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("Encoder exited with {status}: {stderr}")]
    ExitStatus { status: String, stderr: String },
    #[error("Encoder produced no output")]
    EmptyOutput,
    #[error("Encoder io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Scope(#[from] ScopeError),
}

impl Classify for TranscodeError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Scope(ScopeError::Spawn(..)) => ErrorKind::InternalError,
            _ => ErrorKind::TranscodeError,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
}

impl AudioFormat {
    fn codec(&self) -> &'static str {
        match self {
            Self::Mp3 => "libmp3lame",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscodeOptions {
    pub format: AudioFormat,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
}

impl TranscodeOptions {
    /// mp3, 192k, 44.1kHz
    pub fn standard() -> Self {
        Self {
            format: AudioFormat::Mp3,
            bitrate_kbps: TARGET_BITRATE_KBPS,
            sample_rate: TARGET_SAMPLE_RATE,
        }
    }
}

/// How bytes travel to and from the encoder process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum IoMode {
    /// A file inside the request's scope
    #[default]
    Path,
    /// stdin for input, stdout for output
    Pipe,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TranscodeIo {
    pub input: IoMode,
    pub output: IoMode,
}

impl TranscodeIo {
    pub fn pipes() -> Self {
        Self {
            input: IoMode::Pipe,
            output: IoMode::Pipe,
        }
    }
}

/// Bytes in, bytes out, exit status. The orchestrator only depends on this, so the encoder can be
/// swapped for a library binding without touching the rest of the pipeline.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(
        &self,
        scope: &mut ResourceScope,
        raw: &RawAudioBuffer,
        options: &TranscodeOptions,
    ) -> Result<EncodedAudioBuffer, TranscodeError>;
}

#[derive(Clone, Debug)]
pub struct FfmpegTranscoder {
    ffmpeg_path: PathBuf,
    io: TranscodeIo,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, io: TranscodeIo) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            io,
        }
    }

    fn command(&self, input: &str, output: &str, options: &TranscodeOptions) -> Command {
        let mut command = Command::new(&self.ffmpeg_path);
        command.args(["-hide_banner", "-loglevel", "error", "-y"]);
        if self.io.input == IoMode::Path {
            command.arg("-nostdin");
        }
        command
            .args(["-i", input])
            // drop embedded cover art and source tags, the tag writer adds its own
            .args(["-vn", "-map_metadata", "-1"])
            // keep encoder version strings out of the output so identical input gives identical
            // bytes
            .args(["-fflags", "+bitexact", "-flags:a", "+bitexact"])
            .args(["-c:a", options.format.codec()])
            .args(["-b:a", &format!("{}k", options.bitrate_kbps)])
            .args(["-ar", &options.sample_rate.to_string()])
            .args(["-f", &options.format.to_string()])
            .arg(output)
            .stdout(if self.io.output == IoMode::Pipe {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdin(if self.io.input == IoMode::Pipe {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stderr(Stdio::piped());
        command
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        scope: &mut ResourceScope,
        raw: &RawAudioBuffer,
        options: &TranscodeOptions,
    ) -> Result<EncodedAudioBuffer, TranscodeError> {
        let input = match self.io.input {
            IoMode::Path => raw.path().to_string_lossy().into_owned(),
            IoMode::Pipe => "pipe:0".to_owned(),
        };
        let output_path = match self.io.output {
            IoMode::Path => Some(scope.new_temp_file(&format!(".{}", options.format))?),
            IoMode::Pipe => None,
        };
        let output = output_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pipe:1".to_owned());

        info!(
            "transcoding {} bytes of {} to {} {}k {}Hz (input: {}, output: {})",
            raw.len(),
            raw.extension(),
            options.format,
            options.bitrate_kbps,
            options.sample_rate,
            self.io.input,
            self.io.output
        );
        let mut child = scope.spawn(self.command(&input, &output, options))?;
        let stdin = child.take_stdin();

        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            let bytes = tokio::fs::read(raw.path()).await?;
            stdin.write_all(&bytes).await?;
            // closing stdin signals end of input
            stdin.shutdown().await
        };
        // the feed has to run alongside the wait, otherwise a full stdout pipe deadlocks
        let (fed, result) = tokio::join!(feed, child.wait_with_output());
        let result = result?;

        if !result.status.success() {
            let stderr = stderr_tail(&result.stderr);
            error!("ffmpeg failed with {}: {stderr}", result.status);
            return Err(TranscodeError::ExitStatus {
                status: result.status.to_string(),
                stderr,
            });
        }
        if let Err(e) = fed {
            // a successful exit with a broken input pipe still means truncated input
            warn!("error writing to ffmpeg stdin: {e:?}");
            return Err(TranscodeError::Io(e));
        }

        let bytes = match output_path {
            Some(path) => tokio::fs::read(path).await?,
            None => result.stdout,
        };
        if bytes.is_empty() {
            return Err(TranscodeError::EmptyOutput);
        }
        info!("transcoding complete, {} bytes", bytes.len());
        Ok(EncodedAudioBuffer::new(bytes))
    }
}

#[cfg(test)]
#[path = "./transcoder_test.rs"]
mod transcoder_test;
