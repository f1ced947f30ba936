mod dto;
pub mod mock;
mod orchestrator;
mod scope;
mod settings;
mod source;
mod tag_writer;
mod transcoder;
mod util;

pub mod tubetag {
    pub use crate::dto::artifact::{ArtifactResult, MP3_MIME_TYPE, MP4_MIME_TYPE};
    pub use crate::dto::audio_buffer::{EncodedAudioBuffer, RawAudioBuffer};
    pub use crate::dto::cover_image::{CoverImage, ImageKind};
    pub use crate::dto::media_metadata::{InputError, MediaMetadata, SourceId};
    pub use crate::dto::pipeline_error::{Classify, ErrorKind, PipelineError, Stage};
    pub use crate::dto::pipeline_state::PipelineState;
    pub use crate::dto::stream_handle::StreamHandle;
    pub use crate::orchestrator::Pipeline;
    pub use crate::scope::{ResourceScope, ScopeError, ScopedChild};
    pub use crate::settings::{DEFAULT_THUMBNAIL_PATTERN, Settings, TagFailurePolicy};
    pub use crate::source::{
        MediaSource, SourceError, SourceListing, SourceSetupError, YtDlpMediaSource,
        select_audio_stream, select_progressive_video, thumbnail_candidates,
    };
    pub use crate::tag_writer::{TagWriteError, TagWriter};
    pub use crate::transcoder::{
        AudioFormat, FfmpegTranscoder, IoMode, TARGET_BITRATE_KBPS, TARGET_SAMPLE_RATE,
        TranscodeError, TranscodeIo, TranscodeOptions, Transcoder,
    };
    pub use crate::util::{ExeNotFound, find_exe};
}
