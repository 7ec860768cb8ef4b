//! Image decoding and canonical content encoding.
//!
//! Duplicate detection hashes the *canonical* representation of the face
//! content being stored, not the raw upload bytes. Canonical content is the
//! cropped region when a face box is supplied (the whole image otherwise),
//! converted to RGB8 and re-encoded as PNG. PNG encoding of identical pixel
//! data is deterministic, so the same face cropped out of two different
//! photos — or the same pixels uploaded as jpeg and png — hash identically.

use crate::models::FaceBox;
use crate::{Error, Result};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;

/// A decoded image ready for cropping and canonical encoding.
pub struct DecodedImage {
    rgb: RgbImage,
}

impl DecodedImage {
    /// Decodes png or jpeg bytes into RGB8 pixel data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the bytes are not a readable image.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| Error::Decode(format!("unreadable image: {e}")))?;
        Ok(Self {
            rgb: image.into_rgb8(),
        })
    }

    /// Image width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    /// Image height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    /// Crops out the region enclosed by `face_box`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the box is empty or extends beyond the
    /// image bounds.
    pub fn crop(&self, face_box: FaceBox) -> Result<Self> {
        if face_box.is_empty() {
            return Err(Error::Decode(format!(
                "face box encloses no pixels: {face_box:?}"
            )));
        }
        if face_box.right > self.width() || face_box.bottom > self.height() {
            return Err(Error::Decode(format!(
                "face box {:?} exceeds image bounds {}x{}",
                face_box,
                self.width(),
                self.height()
            )));
        }

        let view = image::imageops::crop_imm(
            &self.rgb,
            face_box.left,
            face_box.top,
            face_box.width(),
            face_box.height(),
        );
        Ok(Self {
            rgb: view.to_image(),
        })
    }

    /// Encodes the pixel data as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if encoding fails.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(self.rgb.clone())
            .write_to(&mut out, ImageFormat::Png)
            .map_err(|e| Error::Decode(format!("png encode failed: {e}")))?;
        Ok(out.into_inner())
    }
}

/// Produces the canonical bytes of the face content being stored.
///
/// With a box: the cropped region, re-encoded as PNG. Without: the whole
/// image, re-encoded as PNG. The result is what gets hashed for duplicate
/// detection and what gets written to the content store.
///
/// # Errors
///
/// Returns [`Error::Decode`] on unreadable input or an out-of-bounds box.
pub fn canonical_content(image_bytes: &[u8], face_box: Option<FaceBox>) -> Result<Vec<u8>> {
    let decoded = DecodedImage::from_bytes(image_bytes)?;
    match face_box {
        Some(b) => decoded.crop(b)?.to_png(),
        None => decoded.to_png(),
    }
}
