use thiserror::Error;

/// Failure taxonomy shared by every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
pub enum ErrorKind {
    InputError,
    NotFound,
    Unavailable,
    NoAudioStream,
    DownloadError,
    TranscodeError,
    TagWriteError,
    ProviderError,
    InternalError,
}

impl ErrorKind {
    /// Whether the caller can fix the problem themselves, in which case it shouldn't be reported
    /// as a server failure.
    pub fn is_caller_actionable(&self) -> bool {
        matches!(
            self,
            Self::InputError | Self::Unavailable | Self::NoAudioStream | Self::NotFound
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Input,
    Scope,
    Resolve,
    Select,
    Download,
    Transcode,
    Thumbnail,
    Tag,
}

impl Stage {
    /// Kind reported when the stage runs past its deadline.
    pub fn timeout_kind(&self) -> ErrorKind {
        match self {
            Self::Input => ErrorKind::InputError,
            Self::Scope => ErrorKind::InternalError,
            Self::Resolve | Self::Select => ErrorKind::ProviderError,
            Self::Download | Self::Thumbnail => ErrorKind::DownloadError,
            Self::Transcode => ErrorKind::TranscodeError,
            Self::Tag => ErrorKind::TagWriteError,
        }
    }
}

/// Implemented by component errors so they can be folded into a [`PipelineError`].
pub trait Classify: std::error::Error {
    fn kind(&self) -> ErrorKind;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} failed ({kind}): {cause}")]
pub struct PipelineError {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub cause: String,
}

impl PipelineError {
    pub fn new(stage: Stage, kind: ErrorKind, cause: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            cause: cause.into(),
        }
    }

    pub fn at<E: Classify>(stage: Stage, error: &E) -> Self {
        Self::new(stage, error.kind(), error.to_string())
    }

    pub fn timed_out(stage: Stage, after: std::time::Duration) -> Self {
        Self::new(
            stage,
            stage.timeout_kind(),
            format!("{stage} timed out after {}s", after.as_secs()),
        )
    }
}
