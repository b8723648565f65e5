//! Post-filters for Hough detections.

use crate::types::DetectedCircle;

/// True when the centre lies within `margin` pixels of any frame edge.
///
/// The margin is the same on all four sides: on a 256 px frame with a
/// 10 px margin, centres in `[10, 246]` survive on both axes. A tighter
/// right/bottom bound of 240 would also drop centres in `(240, 246]`.
#[inline]
pub fn is_near_border(c: &DetectedCircle, width: usize, height: usize, margin: u32) -> bool {
    let m = margin as f32;
    c.center.x < m
        || c.center.y < m
        || c.center.x > width as f32 - m
        || c.center.y > height as f32 - m
}

/// Split circles into `(kept, rejected)` by the border margin.
pub fn reject_border_circles(
    circles: Vec<DetectedCircle>,
    width: usize,
    height: usize,
    margin: u32,
) -> (Vec<DetectedCircle>, Vec<DetectedCircle>) {
    let (rejected, kept): (Vec<_>, Vec<_>) = circles
        .into_iter()
        .partition(|c| is_near_border(c, width, height, margin));
    for c in &rejected {
        log::info!(
            "on edge: ({:.0}, {:.0}) r={:.1}",
            c.center.x,
            c.center.y,
            c.radius
        );
    }
    (kept, rejected)
}

fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f32::total_cmp);
    let n = values.len();
    Some(if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    })
}

/// Split circles into `(kept, rejected)` by deviation from the median radius.
///
/// A circle is rejected when `|r - median| > tolerance_frac * median`.
pub fn reject_implausible_radii(
    circles: Vec<DetectedCircle>,
    tolerance_frac: f32,
) -> (Vec<DetectedCircle>, Vec<DetectedCircle>) {
    let mut radii: Vec<f32> = circles.iter().map(|c| c.radius).collect();
    let Some(med) = median(&mut radii) else {
        return (circles, Vec::new());
    };
    let limit = tolerance_frac * med;
    let (kept, rejected): (Vec<_>, Vec<_>) = circles
        .into_iter()
        .partition(|c| (c.radius - med).abs() <= limit);
    for c in &rejected {
        log::info!(
            "implausible radius {:.1} (median {med:.1}) at ({:.0}, {:.0})",
            c.radius,
            c.center.x,
            c.center.y
        );
    }
    (kept, rejected)
}
