//! Normalized per-channel histogram.
//!
//! ## Algorithm
//!
//! 1. Count 256 bins per RGBA channel over every pixel of the full-resolution
//!    image (8 bits per channel; wider images are down-converted per pixel).
//! 2. Derive luminance per bin index with the ITU-R BT.601 weights:
//!    `L[i] = 0.299·R[i] + 0.587·G[i] + 0.114·B[i]`.
//! 3. Normalize red, green, blue and luminance **independently**, dividing
//!    every bin by that channel's own maximum, so each channel peaks at 1.0.
//!    A channel whose bins are all zero stays all zero.
//!
//! Alpha is counted but not kept in the normalized result.
//!
//! ## Wire format
//!
//! [`NormalizedHistogram::encode`] produces exactly
//! [`ENCODED_LEN`] bytes: 4 × 256 little-endian `f64`, channels in fixed
//! R, G, B, L order.

use image::{DynamicImage, GenericImageView};

pub const BIN_COUNT: usize = 256;
const CHANNELS: usize = 4;
pub const ENCODED_LEN: usize = BIN_COUNT * CHANNELS * size_of::<f64>();

/// Luminance weights (ITU-R BT.601).
const LUMA_R: f64 = 0.299;
const LUMA_G: f64 = 0.587;
const LUMA_B: f64 = 0.114;

/// Raw per-channel pixel counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistogramCounts {
    pub red: [u64; BIN_COUNT],
    pub green: [u64; BIN_COUNT],
    pub blue: [u64; BIN_COUNT],
    pub alpha: [u64; BIN_COUNT],
}

impl HistogramCounts {
    pub fn of(image: &DynamicImage) -> Self {
        let mut counts = Self {
            red: [0; BIN_COUNT],
            green: [0; BIN_COUNT],
            blue: [0; BIN_COUNT],
            alpha: [0; BIN_COUNT],
        };
        for (_, _, pixel) in image.pixels() {
            let [r, g, b, a] = pixel.0;
            counts.red[r as usize] += 1;
            counts.green[g as usize] += 1;
            counts.blue[b as usize] += 1;
            counts.alpha[a as usize] += 1;
        }
        counts
    }
}

/// Histogram with every channel scaled into `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedHistogram {
    pub red: [f64; BIN_COUNT],
    pub green: [f64; BIN_COUNT],
    pub blue: [f64; BIN_COUNT],
    pub luminance: [f64; BIN_COUNT],
}

impl Default for NormalizedHistogram {
    fn default() -> Self {
        Self {
            red: [0.0; BIN_COUNT],
            green: [0.0; BIN_COUNT],
            blue: [0.0; BIN_COUNT],
            luminance: [0.0; BIN_COUNT],
        }
    }
}

impl NormalizedHistogram {
    /// Compute the histogram of a decoded image.
    pub fn compute(image: &DynamicImage) -> Self {
        Self::from_counts(&HistogramCounts::of(image))
    }

    pub fn from_counts(counts: &HistogramCounts) -> Self {
        let to_f64 = |bins: &[u64; BIN_COUNT]| bins.map(|c| c as f64);
        let red = to_f64(&counts.red);
        let green = to_f64(&counts.green);
        let blue = to_f64(&counts.blue);

        let mut luminance = [0.0; BIN_COUNT];
        for i in 0..BIN_COUNT {
            luminance[i] = LUMA_R * red[i] + LUMA_G * green[i] + LUMA_B * blue[i];
        }

        Self {
            red: normalize(red),
            green: normalize(green),
            blue: normalize(blue),
            luminance: normalize(luminance),
        }
    }

    /// Serialize to the fixed-length R, G, B, L byte layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ENCODED_LEN);
        for channel in [&self.red, &self.green, &self.blue, &self.luminance] {
            for value in channel {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        bytes
    }

    /// Inverse of [`encode`](Self::encode). Returns `None` unless `bytes` is
    /// exactly [`ENCODED_LEN`] long.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != ENCODED_LEN {
            return None;
        }
        let mut values = bytes
            .chunks_exact(size_of::<f64>())
            .map(|chunk| f64::from_le_bytes(chunk.try_into().expect("chunks_exact yields 8 bytes")));

        let mut next_channel = || {
            let mut channel = [0.0; BIN_COUNT];
            for slot in channel.iter_mut() {
                *slot = values.next().unwrap_or_default();
            }
            channel
        };

        Some(Self {
            red: next_channel(),
            green: next_channel(),
            blue: next_channel(),
            luminance: next_channel(),
        })
    }
}

fn normalize(bins: [f64; BIN_COUNT]) -> [f64; BIN_COUNT] {
    let max = bins.iter().copied().fold(0.0, f64::max);
    if max <= 0.0 {
        return [0.0; BIN_COUNT];
    }
    bins.map(|v| v / max)
}
