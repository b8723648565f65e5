//! Square-region statistics on the full-precision working image.

use nalgebra::Point2;
use phantom_qa_core::{IntensityImage, PhantomAssumptions};

use crate::types::{Tube, TubeMeasurement};

/// Mean over the square `[cx-d, cx+d) x [cy-d, cy+d)`, clipped to the image.
///
/// The centre is truncated to integer pixels first. Returns `(mean, count)`;
/// an empty region yields `(0.0, 0)`.
pub fn square_region_mean(
    img: &IntensityImage,
    center: Point2<f32>,
    half_width: i32,
) -> (f64, usize) {
    let cx = center.x as i64;
    let cy = center.y as i64;
    let d = i64::from(half_width.max(0));

    let x0 = (cx - d).clamp(0, img.width as i64) as usize;
    let x1 = (cx + d).clamp(0, img.width as i64) as usize;
    let y0 = (cy - d).clamp(0, img.height as i64) as usize;
    let y1 = (cy + d).clamp(0, img.height as i64) as usize;
    if x0 >= x1 || y0 >= y1 {
        return (0.0, 0);
    }

    let mut sum = 0.0f64;
    for y in y0..y1 {
        let row = &img.data[y * img.width + x0..y * img.width + x1];
        sum += row.iter().map(|&v| f64::from(v)).sum::<f64>();
    }
    let count = (x1 - x0) * (y1 - y0);
    (sum / count as f64, count)
}

/// Render a mean the way the reports print it: width 5, no decimals.
#[inline]
pub fn format_mean(mean: f64) -> String {
    format!("{mean:5.0}")
}

/// Measure every tube with the same square half-width.
pub fn measure_tubes(
    tubes: &[Tube; PhantomAssumptions::TUBE_COUNT],
    img: &IntensityImage,
    half_width: i32,
) -> [TubeMeasurement; PhantomAssumptions::TUBE_COUNT] {
    std::array::from_fn(|i| {
        let tube = tubes[i];
        let (mean, pixel_count) = square_region_mean(img, tube.center, half_width);
        log::debug!(
            "tube {} at ({:.0}, {:.0}): mean {mean:.2} over {pixel_count} px",
            tube.index,
            tube.center.x,
            tube.center.y
        );
        TubeMeasurement {
            tube,
            mean,
            pixel_count,
            formatted: format_mean(mean),
        }
    })
}
