/// A selectable remote stream. This only describes the stream, the bytes are fetched separately.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamHandle {
    /// Source identifier the stream belongs to
    pub source: String,
    pub format_id: String,
    /// Audio bitrate in kbps, falling back to the total bitrate when the provider doesn't report
    /// one
    pub bitrate_kbps: f64,
    pub extension: Option<String>,
    pub audio_codec: Option<String>,
    pub video_codec: Option<String>,
    pub height: Option<u32>,
    pub filesize: Option<u64>,
}

impl StreamHandle {
    pub fn has_audio(&self) -> bool {
        codec_present(&self.audio_codec)
    }

    pub fn has_video(&self) -> bool {
        codec_present(&self.video_codec)
    }

    pub fn is_audio_only(&self) -> bool {
        self.has_audio() && !self.has_video()
    }

    pub fn extension(&self) -> &str {
        self.extension.as_deref().unwrap_or("bin")
    }
}

fn codec_present(codec: &Option<String>) -> bool {
    match codec.as_deref() {
        Some(codec) => !codec.is_empty() && codec != "none",
        None => false,
    }
}
