//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::load_from_memory` |
//! | Dimensions | `image::ImageReader::into_dimensions` (header only) |
//! | Camera metadata | `kamadak-exif` via [`ExifReader`] |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::calculate_bounded_dimensions;
use super::exif_reader::ExifReader;
use super::params::ThumbnailParams;
use crate::metadata::{ImageProperties, Orientation};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use std::io::Cursor;
use std::sync::LazyLock;

const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn dimensions_of(bytes: &[u8]) -> Result<Dimensions, BackendError> {
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()
        .map_err(|e| BackendError::ProcessingFailed(format!("Failed to read dimensions: {e}")))?;
    Ok(Dimensions { width, height })
}

fn encode_jpeg(img: &DynamicImage, quality: u32) -> Result<Vec<u8>, BackendError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100) as u8);
    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {e}")))?;
    Ok(buf)
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        image::load_from_memory(bytes)
            .map_err(|e| BackendError::ProcessingFailed(format!("Failed to decode image: {e}")))
    }

    fn read_properties(&self, bytes: &[u8]) -> Result<ImageProperties, BackendError> {
        let mut properties = ImageProperties {
            dimensions: dimensions_of(bytes)?,
            ..ImageProperties::default()
        };
        if let Some(reader) = ExifReader::from_slice(bytes) {
            reader.fill(&mut properties);
        }
        Ok(properties)
    }

    fn thumbnail(
        &self,
        image: &DynamicImage,
        orientation: Orientation,
        params: &ThumbnailParams,
    ) -> Result<Vec<u8>, BackendError> {
        let (width, height) =
            calculate_bounded_dimensions(image.dimensions(), params.max_side_length);
        let resized = if (width, height) == image.dimensions() {
            image.clone()
        } else {
            image.resize_exact(width, height, FilterType::Lanczos3)
        };
        encode_jpeg(&orientation.apply(resized), params.quality.value())
    }
}
