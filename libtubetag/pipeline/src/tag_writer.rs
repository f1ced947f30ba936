use std::io::Cursor;

use lofty::config::{ParseOptions, WriteOptions};
use lofty::error::LoftyError;
use lofty::file::{FileType, TaggedFileExt};
use lofty::picture::{Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, Tag, TagExt, TagType};
use thiserror::Error;
use tracing::{debug, info};

use crate::dto::audio_buffer::EncodedAudioBuffer;
use crate::dto::cover_image::CoverImage;
use crate::dto::media_metadata::MediaMetadata;
use crate::dto::pipeline_error::{Classify, ErrorKind};

const COVER_DESCRIPTION: &str = "Cover";
const ID3V2_HEADER_LEN: usize = 10;

#[derive(Error, Debug)]
pub enum TagWriteError {
    #[error("Audio is not an MPEG stream")]
    NotMpeg,
    #[error("Unable to parse audio container: {0}")]
    Parse(LoftyError),
    #[error("Unable to save tags: {0}")]
    Save(LoftyError),
}

impl Classify for TagWriteError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::TagWriteError
    }
}

/// Writes title, artist and cover art into an MP3's ID3v2 tag.
///
/// The input buffer is never modified. A new buffer is only returned once the whole tag has been
/// written, so a failure can't leave a partially tagged file behind.
#[derive(Clone, Debug, Default)]
pub struct TagWriter;

impl TagWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn embed(
        &self,
        audio: &EncodedAudioBuffer,
        metadata: &MediaMetadata,
        cover: Option<&CoverImage>,
    ) -> Result<EncodedAudioBuffer, TagWriteError> {
        let bytes = audio.as_bytes();
        let audio_start = find_audio_start(bytes).ok_or(TagWriteError::NotMpeg)?;
        debug!("audio frames start at byte {audio_start}");

        let mut tagged_file = Probe::new(Cursor::new(bytes))
            .set_file_type(FileType::Mpeg)
            .options(ParseOptions::new().read_properties(false))
            .read()
            .map_err(TagWriteError::Parse)?;

        if tagged_file.tag(TagType::Id3v2).is_none() {
            debug!("no existing ID3v2 tag, creating one");
            tagged_file.insert_tag(Tag::new(TagType::Id3v2));
        }
        let Some(tag) = tagged_file.tag_mut(TagType::Id3v2) else {
            return Err(TagWriteError::NotMpeg);
        };

        tag.set_title(metadata.title.clone());
        tag.set_artist(metadata.author.clone());
        tag.remove_picture_type(PictureType::CoverFront);
        if let Some(cover) = cover {
            tag.push_picture(Picture::new_unchecked(
                PictureType::CoverFront,
                Some(cover.kind().to_lofty()),
                Some(COVER_DESCRIPTION.to_owned()),
                cover.bytes().to_vec(),
            ));
        }

        let mut output = Cursor::new(bytes.to_vec());
        // ID3v2.3 is still the most widely supported version among players
        tag.save_to(&mut output, WriteOptions::new().use_id3v23(true))
            .map_err(TagWriteError::Save)?;

        let output = output.into_inner();
        info!(
            "tagged audio: {} -> {} bytes, cover: {}",
            bytes.len(),
            output.len(),
            cover.map(|c| c.mime_type()).unwrap_or("none")
        );
        Ok(EncodedAudioBuffer::new(output))
    }
}

/// Offset of the first MPEG frame sync, skipping a leading ID3v2 tag if there is one.
fn find_audio_start(bytes: &[u8]) -> Option<usize> {
    let mut start = 0;
    if bytes.len() >= ID3V2_HEADER_LEN && bytes.starts_with(b"ID3") {
        let size = bytes[6..ID3V2_HEADER_LEN]
            .iter()
            .try_fold(0usize, |acc, b| (b & 0x80 == 0).then(|| (acc << 7) | *b as usize))?;
        // footer flag
        let footer = if bytes[5] & 0x10 != 0 { 10 } else { 0 };
        start = ID3V2_HEADER_LEN + size + footer;
    }

    let header = bytes.get(start..start + 2)?;
    // 11 sync bits, then a version id other than the reserved 01
    (header[0] == 0xFF && header[1] & 0xE0 == 0xE0 && header[1] & 0x18 != 0x08).then_some(start)
}

#[cfg(test)]
#[path = "./tag_writer_test.rs"]
mod tag_writer_test;
