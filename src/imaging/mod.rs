//! Image processing: decoding, metadata, histograms and thumbnails.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory` |
//! | **EXIF metadata** | `kamadak-exif` |
//! | **Histogram** | per-pixel counting over the decoded image |
//! | **Thumbnail** | Lanczos3 resize + orientation + JPEG encode |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Histogram**: [`NormalizedHistogram`] and its fixed binary layout

pub mod backend;
mod calculations;
pub mod exif_reader;
pub mod histogram;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::calculate_bounded_dimensions;
pub use histogram::NormalizedHistogram;
pub use params::{Quality, ThumbnailParams};
pub use rust_backend::{RustBackend, supported_input_extensions};
