//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Fit `source` inside `bounds`, preserving aspect ratio, shrinking only.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `bounds` - Bounding box (max width, max height)
///
/// # Returns
/// * `(width, height)` - Output dimensions; both `<=` the box and `<=` the
///   source, each at least 1
///
/// # Examples
/// ```
/// # use photoshelf::imaging::calculate_fit_dimensions;
/// // 4000x3000 into 1024x768 → exact 4:3 fit
/// assert_eq!(calculate_fit_dimensions((4000, 3000), (1024, 768)), (1024, 768));
///
/// // Already small enough → unchanged
/// assert_eq!(calculate_fit_dimensions((640, 480), (1024, 768)), (640, 480));
/// ```
pub fn calculate_fit_dimensions(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;

    if src_w == 0 || src_h == 0 {
        return (src_w, src_h);
    }
    if src_w <= max_w && src_h <= max_h {
        return (src_w, src_h);
    }

    let scale = f64::min(max_w as f64 / src_w as f64, max_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, max_w.max(1));
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, max_h.max(1));
    (w, h)
}
