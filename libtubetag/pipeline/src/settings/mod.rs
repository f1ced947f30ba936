use std::path::PathBuf;
use std::time::Duration;

use crate::transcoder::TranscodeIo;

pub const DEFAULT_THUMBNAIL_PATTERN: &str = "https://i.ytimg.com/vi/{id}/maxresdefault.jpg";
const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(300);

/// What to do when the transcoded audio can't be tagged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TagFailurePolicy {
    /// Fail the request. A tagging failure means the transcoder produced something unexpected.
    #[default]
    Fail,
    /// Return the untagged audio instead.
    Untagged,
}

#[derive(Clone, Debug)]
pub struct Settings {
    /// Explicit yt-dlp executable. Looked up from `YT_DLP_PATH` or `PATH` if not set.
    pub yt_dlp_path: Option<PathBuf>,
    /// Explicit ffmpeg executable. Looked up from `FFMPEG_PATH` or `PATH` if not set.
    pub ffmpeg_path: Option<PathBuf>,
    pub transcode_io: TranscodeIo,
    /// Higher quality thumbnail URL tried before the provider's default. `{id}` is replaced with
    /// the media id.
    pub primary_thumbnail_pattern: Option<String>,
    pub thumbnail_retries: u32,
    pub tag_failure: TagFailurePolicy,
    pub stage_timeout: Duration,
    /// Directory that request scopes are created in. Defaults to the system temp dir.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            yt_dlp_path: None,
            ffmpeg_path: None,
            transcode_io: TranscodeIo::default(),
            primary_thumbnail_pattern: Some(DEFAULT_THUMBNAIL_PATTERN.to_owned()),
            thumbnail_retries: 2,
            tag_failure: TagFailurePolicy::default(),
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            scratch_dir: None,
        }
    }
}
