//! JPEG frame decoding.
//!
//! Decoding is pure: it never looks at session state, so frames that
//! arrive mid-transition are still shown.

use image::RgbImage;

/// A frame that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to decode {byte_len}-byte frame: {reason}")]
pub struct DecodeError {
    /// Length of the original payload, kept for diagnostics.
    pub byte_len: usize,
    pub reason: String,
}

/// A decoded RGB raster.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}

/// Result of decoding a binary unit.
#[derive(Debug, Clone)]
pub enum DecodedFrame {
    Image(Frame),
    Failed(DecodeError),
}

impl DecodedFrame {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn into_result(self) -> Result<Frame, DecodeError> {
        match self {
            Self::Image(frame) => Ok(frame),
            Self::Failed(e) => Err(e),
        }
    }
}

/// Decodes a binary payload into an RGB frame.
pub fn decode(bytes: &[u8]) -> DecodedFrame {
    if bytes.is_empty() {
        return DecodedFrame::Failed(DecodeError {
            byte_len: 0,
            reason: "empty payload".into(),
        });
    }

    match image::load_from_memory(bytes) {
        Ok(img) => DecodedFrame::Image(Frame {
            image: img.into_rgb8(),
        }),
        Err(e) => DecodedFrame::Failed(DecodeError {
            byte_len: bytes.len(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, Rgb};

    /// Encodes a small solid-colour JPEG.
    pub(crate) fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 40]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
            .unwrap();
        bytes
    }

    #[test]
    fn decodes_valid_jpeg() {
        let jpeg = sample_jpeg(16, 8);
        let frame = decode(&jpeg).into_result().unwrap();
        assert_eq!(frame.width(), 16);
        assert_eq!(frame.height(), 8);
        assert_eq!(frame.image().dimensions(), (16, 8));
    }

    #[test]
    fn empty_payload_fails() {
        match decode(&[]) {
            DecodedFrame::Failed(e) => {
                assert_eq!(e.byte_len, 0);
                assert_eq!(e.reason, "empty payload");
            }
            DecodedFrame::Image(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn garbage_fails_with_length() {
        let garbage = vec![0x42u8; 37];
        match decode(&garbage) {
            DecodedFrame::Failed(e) => assert_eq!(e.byte_len, 37),
            DecodedFrame::Image(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn markers_without_frame_fail() {
        // SOI immediately followed by EOI: a JPEG with no image data.
        let bytes = [0xFF, 0xD8, 0xFF, 0xD9];
        assert!(decode(&bytes).is_failed());
    }

    #[test]
    fn text_bytes_fail() {
        assert!(decode(br#"{"type":"payload"}"#).is_failed());
    }
}
