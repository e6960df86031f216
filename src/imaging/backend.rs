//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the seam between the import pipeline and
//! the codecs. It covers the three collaborators the pipeline needs:
//!
//! | Operation | Collaborator |
//! |---|---|
//! | `decode` | verifies the source is a usable image, feeds the histogram |
//! | `read_properties` | metadata extractor (dimensions, orientation, EXIF) |
//! | `thumbnail` | thumbnail generator (bounded, re-encoded JPEG) |
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::ThumbnailParams;
use crate::metadata::{ImageProperties, Orientation};
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel dimensions as stored in the file (before orientation is applied).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// `Sync` so a single backend can be shared across the rayon pool used by
/// batch import.
pub trait ImageBackend: Sync {
    /// Decode the source bytes into pixels.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError>;

    /// Read dimensions, orientation and camera metadata from the source
    /// bytes. Missing EXIF is not an error: absent fields come back `None`.
    fn read_properties(&self, bytes: &[u8]) -> Result<ImageProperties, BackendError>;

    /// Produce the encoded thumbnail for an already decoded image.
    fn thumbnail(
        &self,
        image: &DynamicImage,
        orientation: Orientation,
        params: &ThumbnailParams,
    ) -> Result<Vec<u8>, BackendError>;
}
