//! Descriptive metadata attached to an imported asset.
//!
//! A [`Metadata`] record is computed once at import time from the decoded
//! source image and never changes afterwards. It bundles:
//!
//! - **Geometry**: pixel dimensions and the EXIF orientation flag.
//! - **Camera records**: optional TIFF, EXIF and EXIF-aux sub-records. Each
//!   field inside them is optional too: cameras disagree wildly on which
//!   tags they write, so absence is the normal case, not an error.
//! - **Location**: GPS coordinate in signed decimal degrees.
//! - **Histogram**: the [`NormalizedHistogram`] of the full-resolution image.
//!
//! Extraction from raw EXIF lives in [`crate::imaging::exif_reader`]; this module is
//! only the typed shape of the result.

use crate::imaging::{Dimensions, NormalizedHistogram};
use chrono::NaiveDateTime;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// The eight EXIF orientation values.
///
/// Each variant names the transform needed to display the stored pixels
/// upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Normal,
    MirroredHorizontal,
    Rotated180,
    MirroredVertical,
    MirroredHorizontalRotated270,
    Rotated90,
    MirroredHorizontalRotated90,
    Rotated270,
}

impl Orientation {
    /// Map an EXIF `Orientation` tag value (1–8).
    pub fn from_exif(value: u32) -> Option<Self> {
        Some(match value {
            1 => Self::Normal,
            2 => Self::MirroredHorizontal,
            3 => Self::Rotated180,
            4 => Self::MirroredVertical,
            5 => Self::MirroredHorizontalRotated270,
            6 => Self::Rotated90,
            7 => Self::MirroredHorizontalRotated90,
            8 => Self::Rotated270,
            _ => return None,
        })
    }

    pub fn exif_value(self) -> u32 {
        match self {
            Self::Normal => 1,
            Self::MirroredHorizontal => 2,
            Self::Rotated180 => 3,
            Self::MirroredVertical => 4,
            Self::MirroredHorizontalRotated270 => 5,
            Self::Rotated90 => 6,
            Self::MirroredHorizontalRotated90 => 7,
            Self::Rotated270 => 8,
        }
    }

    /// Rotate/flip `image` so it displays upright.
    #[must_use]
    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        match self {
            Self::Normal => image,
            Self::MirroredHorizontal => image.fliph(),
            Self::Rotated180 => image.rotate180(),
            Self::MirroredVertical => image.flipv(),
            Self::MirroredHorizontalRotated270 => image.fliph().rotate270(),
            Self::Rotated90 => image.rotate90(),
            Self::MirroredHorizontalRotated90 => image.fliph().rotate90(),
            Self::Rotated270 => image.rotate270(),
        }
    }
}

/// Fields from the TIFF IFD0 directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiffMetadata {
    pub copyright: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    /// The `Software` tag, which cameras fill with their firmware version.
    pub firmware_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorSpace {
    Srgb,
    AdobeRgb,
    Uncalibrated,
}

impl ColorSpace {
    pub fn from_exif(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Srgb),
            2 => Some(Self::AdobeRgb),
            65535 => Some(Self::Uncalibrated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExposureProgram {
    Manual,
    AutoNormal,
    AperturePriority,
    ShutterPriority,
    AutoCreative,
    AutoAction,
    AutoPortrait,
    AutoLandscape,
}

impl ExposureProgram {
    pub fn from_exif(value: u32) -> Option<Self> {
        Some(match value {
            1 => Self::Manual,
            2 => Self::AutoNormal,
            3 => Self::AperturePriority,
            4 => Self::ShutterPriority,
            5 => Self::AutoCreative,
            6 => Self::AutoAction,
            7 => Self::AutoPortrait,
            8 => Self::AutoLandscape,
            _ => return None,
        })
    }
}

/// Fields from the EXIF sub-IFD.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExifMetadata {
    pub capture_time: Option<NaiveDateTime>,
    pub digitization_time: Option<NaiveDateTime>,
    pub color_space: Option<ColorSpace>,
    /// Exposure bias in EV.
    pub exposure_bias: Option<f64>,
    pub exposure_program: Option<ExposureProgram>,
    /// APEX shutter speed value. Prefer `exposure_time`.
    pub shutter_speed: Option<f64>,
    /// Exposure time in seconds.
    pub exposure_time: Option<f64>,
    pub f_number: Option<f64>,
    /// APEX aperture value; F-number is `sqrt(2)^aperture_value`.
    pub aperture_value: Option<f64>,
    /// Focal length in millimeters.
    pub focal_length: Option<f64>,
    pub iso: Option<u32>,
}

/// Lens information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExifAuxMetadata {
    pub lens_model: Option<String>,
    pub lens_serial_number: Option<String>,
    pub stabilized: bool,
}

/// GPS coordinate in signed decimal degrees (south and west are negative).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Everything the metadata extractor could read, before the histogram is
/// attached.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageProperties {
    pub dimensions: Dimensions,
    pub orientation: Orientation,
    pub tiff: Option<TiffMetadata>,
    pub exif: Option<ExifMetadata>,
    pub aux: Option<ExifAuxMetadata>,
    pub location: Option<Location>,
}

/// Metadata record owned by exactly one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub dimensions: Dimensions,
    pub orientation: Orientation,
    pub tiff: Option<TiffMetadata>,
    pub exif: Option<ExifMetadata>,
    pub aux: Option<ExifAuxMetadata>,
    pub location: Option<Location>,
    pub histogram: NormalizedHistogram,
}

impl Metadata {
    pub fn new(properties: ImageProperties, histogram: NormalizedHistogram) -> Self {
        Self {
            dimensions: properties.dimensions,
            orientation: properties.orientation,
            tiff: properties.tiff,
            exif: properties.exif,
            aux: properties.aux,
            location: properties.location,
            histogram,
        }
    }
}
