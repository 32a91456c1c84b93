//! Image inspection and thumbnailing for story photos.

use std::io::Cursor;

use image::{DynamicImage, ImageReader};
use serde::Serialize;

use habitgrid_common::{AppError, AppResult};

/// Largest accepted photo: 10 MiB.
pub const MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

/// Longest edge of a generated thumbnail.
pub const THUMBNAIL_EDGE: u32 = 320;

/// Accepted photo formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
}

impl ImageFormat {
    /// Get MIME type for this format.
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    /// Get file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::WebP => "webp",
        }
    }

    /// Detect the format from magic bytes.
    #[must_use]
    pub fn sniff(data: &[u8]) -> Option<Self> {
        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }
        // WebP: RIFF....WEBP
        if data.len() >= 12 && data[0..4] == *b"RIFF" && data[8..12] == *b"WEBP" {
            return Some(Self::WebP);
        }
        None
    }

    const fn codec(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
            Self::WebP => image::ImageFormat::WebP,
        }
    }
}

/// A decoded photo ready to be stored.
#[derive(Debug, Clone)]
pub struct ProcessedPhoto {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    /// JPEG thumbnail bytes
    pub thumbnail: Vec<u8>,
}

/// Validate and thumbnail an uploaded photo.
///
/// The format is taken from the bytes, never from the client's content type.
pub fn process_photo(data: &[u8]) -> AppResult<ProcessedPhoto> {
    if data.len() > MAX_PHOTO_BYTES {
        return Err(AppError::PayloadTooLarge(format!(
            "Photo exceeds {MAX_PHOTO_BYTES} bytes"
        )));
    }
    let format = ImageFormat::sniff(data).ok_or_else(|| {
        AppError::Validation("Photo must be a JPEG, PNG or WebP image".to_string())
    })?;

    let image = ImageReader::with_format(Cursor::new(data), format.codec())
        .decode()
        .map_err(|e| AppError::Validation(format!("Photo could not be decoded: {e}")))?;

    let thumbnail = encode_thumbnail(&image)?;
    tracing::debug!(
        format = ?format,
        width = image.width(),
        height = image.height(),
        thumbnail_bytes = thumbnail.len(),
        "Processed photo"
    );

    Ok(ProcessedPhoto {
        format,
        width: image.width(),
        height: image.height(),
        thumbnail,
    })
}

fn encode_thumbnail(image: &DynamicImage) -> AppResult<Vec<u8>> {
    let scaled = if image.width() > THUMBNAIL_EDGE || image.height() > THUMBNAIL_EDGE {
        image.thumbnail(THUMBNAIL_EDGE, THUMBNAIL_EDGE)
    } else {
        image.clone()
    };
    // JPEG has no alpha channel
    let thumb = DynamicImage::ImageRgb8(scaled.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    thumb
        .write_to(&mut out, image::ImageFormat::Jpeg)
        .map_err(|e| AppError::Internal(format!("Failed to encode thumbnail: {e}")))?;
    Ok(out.into_inner())
}
