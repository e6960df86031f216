//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate the size of an image scaled to fit inside a square of
/// `max_side` pixels, preserving aspect ratio.
///
/// Images already within bounds are returned unchanged: thumbnails are never
/// upscaled. Neither output edge drops below 1 pixel.
///
/// # Examples
/// ```
/// # use photoflow::imaging::calculate_bounded_dimensions;
/// assert_eq!(calculate_bounded_dimensions((4000, 3000), 1280), (1280, 960));
/// assert_eq!(calculate_bounded_dimensions((100, 100), 1280), (100, 100));
/// ```
pub fn calculate_bounded_dimensions(original: (u32, u32), max_side: u32) -> (u32, u32) {
    let (w, h) = original;
    let longer = w.max(h);
    if longer <= max_side || longer == 0 {
        return original;
    }

    let ratio = max_side as f64 / longer as f64;
    if w >= h {
        (max_side, ((h as f64 * ratio).round() as u32).max(1))
    } else {
        (((w as f64 * ratio).round() as u32).max(1), max_side)
    }
}
