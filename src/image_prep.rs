use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;
use image::imageops::FilterType;
use log::info;
use std::fs;
use std::path::Path;

use crate::config::constants;
use crate::error::ImageError;

/// A user-supplied plant photo.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageUpload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Read an image from disk, detecting its MIME type from the contents.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The contents are not a recognised image format
    pub fn from_path(path: &Path) -> Result<Self, ImageError> {
        let bytes = fs::read(path).map_err(|e| ImageError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let format = image::guess_format(&bytes).map_err(|e| ImageError::DecodeFailed {
            reason: e.to_string(),
        })?;
        Ok(Self::new(bytes, mime_for_format(format)))
    }

    /// Base64 payload for inline transmission.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Shrinks oversized uploads before they are sent for identification.
///
/// Uploads within `max_bytes` pass through unchanged. Larger ones are decoded,
/// scaled so the longest side fits `max_dimension` (aspect ratio kept) and
/// re-encoded as JPEG.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePreparer {
    pub max_bytes: usize,
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for ImagePreparer {
    fn default() -> Self {
        Self {
            max_bytes: constants::MAX_IMAGE_BYTES,
            max_dimension: constants::MAX_IMAGE_DIMENSION,
            jpeg_quality: constants::JPEG_QUALITY,
        }
    }
}

impl ImagePreparer {
    /// Validate and, if needed, compress an upload.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The MIME type is not `image/*`
    /// - An oversized image cannot be decoded or re-encoded
    pub fn prepare(&self, upload: ImageUpload) -> Result<ImageUpload, ImageError> {
        if !upload.mime_type.starts_with("image/") {
            return Err(ImageError::UnsupportedMimeType {
                mime_type: upload.mime_type,
            });
        }

        if upload.bytes.len() <= self.max_bytes {
            return Ok(upload);
        }

        let dynamic_image =
            image::load_from_memory(&upload.bytes).map_err(|e| ImageError::DecodeFailed {
                reason: e.to_string(),
            })?;

        let (width, height) = scaled_dimensions(
            dynamic_image.width(),
            dynamic_image.height(),
            self.max_dimension,
        );
        let resized = if (width, height) == (dynamic_image.width(), dynamic_image.height()) {
            dynamic_image
        } else {
            dynamic_image.resize_exact(width, height, FilterType::Triangle)
        };

        // JPEG has no alpha channel
        let rgb_image = resized.to_rgb8();
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality)
            .encode(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                image::ColorType::Rgb8,
            )
            .map_err(|e| ImageError::EncodeFailed {
                reason: e.to_string(),
            })?;

        info!(
            "Compressed image from {} to {} bytes ({}x{})",
            upload.bytes.len(),
            buffer.len(),
            width,
            height
        );

        Ok(ImageUpload::new(buffer, "image/jpeg"))
    }
}

fn mime_for_format(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::Gif => "image/gif",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        ImageFormat::Ico => "image/x-icon",
        _ => "image/unknown",
    }
}

/// Fit `width` x `height` inside a `max_dimension` square, keeping the aspect ratio.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }
    if width > height {
        let scaled = (height as f64 * max_dimension as f64 / width as f64).round() as u32;
        (max_dimension, scaled.max(1))
    } else {
        let scaled = (width as f64 * max_dimension as f64 / height as f64).round() as u32;
        (scaled.max(1), max_dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) % 256) as u8, 255])
        });
        let mut buffer = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_scaled_dimensions() {
        assert_eq!(scaled_dimensions(4096, 2048, 2048), (2048, 1024));
        assert_eq!(scaled_dimensions(1000, 3000, 2048), (683, 2048));
        assert_eq!(scaled_dimensions(800, 600, 2048), (800, 600));
        assert_eq!(scaled_dimensions(2048, 2048, 2048), (2048, 2048));
    }

    #[test]
    fn test_small_image_passes_through() {
        let bytes = png_bytes(20, 10);
        let upload = ImageUpload::new(bytes.clone(), "image/png");
        let prepared = ImagePreparer::default().prepare(upload.clone()).unwrap();
        assert_eq!(prepared, upload);
    }

    #[test]
    fn test_oversized_image_is_downscaled_to_jpeg() {
        let preparer = ImagePreparer {
            max_bytes: 100,
            max_dimension: 50,
            jpeg_quality: 80,
        };
        let upload = ImageUpload::new(png_bytes(200, 100), "image/png");

        let prepared = preparer.prepare(upload).unwrap();
        assert_eq!(prepared.mime_type, "image/jpeg");

        let decoded = image::load_from_memory(&prepared.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (50, 25));
    }

    #[test]
    fn test_rejects_non_image_uploads() {
        let upload = ImageUpload::new(b"%PDF-1.4".to_vec(), "application/pdf");
        let err = ImagePreparer::default().prepare(upload).unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedMimeType { .. }));
    }

    #[test]
    fn test_from_path_guesses_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fern");
        fs::write(&path, png_bytes(4, 4)).unwrap();

        let upload = ImageUpload::from_path(&path).unwrap();
        assert_eq!(upload.mime_type, "image/png");

        let missing = ImageUpload::from_path(&dir.path().join("missing.jpg")).unwrap_err();
        assert!(matches!(missing, ImageError::ReadFailed { .. }));
    }

    #[test]
    fn test_base64_payload() {
        let upload = ImageUpload::new(b"abc".to_vec(), "image/png");
        assert_eq!(upload.to_base64(), "YWJj");
    }
}
