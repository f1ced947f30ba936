use crate::dto::pipeline_error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum PipelineState {
    Start,
    MetadataResolved,
    StreamSelected,
    AudioDownloaded,
    Transcoded,
    ThumbnailAttempted,
    Tagged,
    Done,
    #[strum(to_string = "Failed({0})")]
    Failed(ErrorKind),
}

impl PipelineState {
    /// The only state reachable from `self` on success. Terminal states have no successor.
    pub fn successor(&self) -> Option<Self> {
        match self {
            Self::Start => Some(Self::MetadataResolved),
            Self::MetadataResolved => Some(Self::StreamSelected),
            Self::StreamSelected => Some(Self::AudioDownloaded),
            Self::AudioDownloaded => Some(Self::Transcoded),
            Self::Transcoded => Some(Self::ThumbnailAttempted),
            Self::ThumbnailAttempted => Some(Self::Tagged),
            Self::Tagged => Some(Self::Done),
            Self::Done | Self::Failed(_) => None,
        }
    }
}
