use lofty::picture::MimeType;

const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ImageKind {
    #[strum(serialize = "image/jpeg")]
    Jpeg,
    #[strum(serialize = "image/png")]
    Png,
}

impl ImageKind {
    /// Detects the image type from its leading bytes. File extensions and content-type headers
    /// are never consulted since thumbnail hosts frequently mislabel images.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(JPEG_SIGNATURE) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(PNG_SIGNATURE) {
            Some(Self::Png)
        } else {
            None
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub(crate) fn to_lofty(self) -> MimeType {
        match self {
            Self::Jpeg => MimeType::Jpeg,
            Self::Png => MimeType::Png,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverImage {
    bytes: Vec<u8>,
    kind: ImageKind,
}

impl CoverImage {
    /// Returns `None` if the bytes aren't a JPEG or PNG image.
    pub fn detect(bytes: Vec<u8>) -> Option<Self> {
        let kind = ImageKind::sniff(&bytes)?;
        Some(Self { bytes, kind })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn mime_type(&self) -> &'static str {
        self.kind.mime_type()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10], Some(ImageKind::Jpeg))]
    #[case(b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR", Some(ImageKind::Png))]
    #[case(b"GIF89a", None)]
    #[case(b"<html>not found</html>", None)]
    #[case(&[], None)]
    fn sniffs_image_signature(#[case] bytes: &[u8], #[case] expected: Option<ImageKind>) {
        assert_eq!(expected, ImageKind::sniff(bytes));
    }

    #[test]
    fn mime_type_follows_signature() {
        let cover = CoverImage::detect(b"\x89PNG\r\n\x1a\nrest".to_vec()).unwrap();
        assert_eq!("image/png", cover.mime_type());
        assert_eq!("image/png", cover.kind().to_string());
    }
}
