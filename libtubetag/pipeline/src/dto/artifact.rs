use crate::dto::audio_buffer::EncodedAudioBuffer;

pub const MP3_MIME_TYPE: &str = "audio/mpeg";
pub const MP4_MIME_TYPE: &str = "video/mp4";

/// Final output of a pipeline run, ready to be handed to the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactResult {
    pub bytes: Vec<u8>,
    pub suggested_file_name: String,
    pub mime_type: &'static str,
}

impl ArtifactResult {
    pub fn mp3(audio: EncodedAudioBuffer, title: &str) -> Self {
        Self {
            bytes: audio.into_bytes(),
            suggested_file_name: format!("{title}.mp3"),
            mime_type: MP3_MIME_TYPE,
        }
    }

    pub fn mp4(bytes: Vec<u8>, title: &str) -> Self {
        Self {
            bytes,
            suggested_file_name: format!("{title}.mp4"),
            mime_type: MP4_MIME_TYPE,
        }
    }
}
