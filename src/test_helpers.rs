//! Shared test utilities.
//!
//! Synthetic images are encoded in memory with the `image` crate so tests
//! never depend on fixture files. Project helpers hand back the `TempDir`
//! alongside the value so the directory outlives the test body.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let (_tmp, project) = temp_project();
//! let jpeg = jpeg_bytes(100, 100);
//! ```

use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use tempfile::TempDir;

use crate::project::Project;

// =========================================================================
// Synthetic images
// =========================================================================

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// An all-black JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(
        DynamicImage::ImageRgb8(RgbImage::new(width, height)),
        ImageFormat::Jpeg,
    )
}

/// A PNG with a horizontal red gradient, so distinct sizes hash differently.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, _| {
        image::Rgb([(x * 255 / width.max(1)) as u8, 0, 0])
    });
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

// =========================================================================
// Projects
// =========================================================================

/// A fresh project in a temp directory named `Shoot`.
pub fn temp_project() -> (TempDir, Project) {
    let tmp = TempDir::new().unwrap();
    let project = Project::create(tmp.path().join("Shoot")).unwrap();
    (tmp, project)
}
