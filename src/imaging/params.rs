//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. They sit between the
//! import pipeline (which decides what renditions an asset needs) and the
//! [`backend`](super::backend) (which does the pixel work), so a mock backend
//! can stand in during tests without changing pipeline logic.

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Parameters for a thumbnail: scale down so the longer edge fits
/// `max_side_length`, then JPEG-encode at `quality`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailParams {
    pub max_side_length: u32,
    pub quality: Quality,
}

impl Default for ThumbnailParams {
    fn default() -> Self {
        Self {
            max_side_length: 1280,
            quality: Quality::default(),
        }
    }
}
