//! Count gate and canonical numbering of the nine tube centres.

use std::cmp::Ordering;

use nalgebra::Point2;
use phantom_qa_core::PhantomAssumptions;

use crate::types::{DetectedCircle, Tube, TubeOrdering};

const TUBES: usize = PhantomAssumptions::TUBE_COUNT;
const BANDS: usize = PhantomAssumptions::GRID_SIDE;
const MAX_KMEANS_ITERS: usize = 20;

/// The detector did not produce exactly nine tubes.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("found {found} tubes, expected {expected}")]
pub struct TubeCountMismatch {
    pub found: usize,
    pub expected: usize,
}

/// Validate the tube count and number the centres 1..=9.
///
/// The result depends only on the set of centres, not on their input order.
pub fn organize_tubes(
    circles: &[DetectedCircle],
    ordering: TubeOrdering,
) -> Result<[Tube; TUBES], TubeCountMismatch> {
    if circles.len() != TUBES {
        return Err(TubeCountMismatch {
            found: circles.len(),
            expected: TUBES,
        });
    }

    let mut sorted = circles.to_vec();
    match ordering {
        TubeOrdering::LinearKey => sorted.sort_by(|a, b| linear_key_cmp(&a.center, &b.center)),
        TubeOrdering::RowBands => sort_by_row_bands(&mut sorted),
    }

    Ok(std::array::from_fn(|i| Tube {
        index: i + 1,
        center: sorted[i].center,
        radius: sorted[i].radius,
    }))
}

fn raster_cmp(a: &Point2<f32>, b: &Point2<f32>) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}

fn linear_key_cmp(a: &Point2<f32>, b: &Point2<f32>) -> Ordering {
    let ka = a.y + 4.0 * a.x;
    let kb = b.y + 4.0 * b.x;
    ka.total_cmp(&kb).then_with(|| raster_cmp(a, b))
}

/// Three-means clustering of the vertical coordinates.
///
/// Returns the band label (0 = top) for every input value.
fn band_labels(ys: &[f32]) -> Vec<usize> {
    let mut sorted = ys.to_vec();
    sorted.sort_by(f32::total_cmp);
    let n = sorted.len();
    let mut centers: [f32; BANDS] =
        std::array::from_fn(|k| sorted[((2 * k + 1) * n / (2 * BANDS)).min(n - 1)]);

    let mut labels = vec![usize::MAX; ys.len()];
    for _ in 0..MAX_KMEANS_ITERS {
        let mut changed = false;
        for (label, &y) in labels.iter_mut().zip(ys) {
            let nearest = (0..BANDS)
                .min_by(|&a, &b| {
                    (y - centers[a])
                        .abs()
                        .total_cmp(&(y - centers[b]).abs())
                        .then(a.cmp(&b))
                })
                .unwrap_or(0);
            if *label != nearest {
                *label = nearest;
                changed = true;
            }
        }

        let mut sums = [0.0f32; BANDS];
        let mut counts = [0usize; BANDS];
        for (&label, &y) in labels.iter().zip(ys) {
            sums[label] += y;
            counts[label] += 1;
        }
        for k in 0..BANDS {
            if counts[k] > 0 {
                centers[k] = sums[k] / counts[k] as f32;
            }
        }

        if !changed {
            break;
        }
    }

    // Relabel so band 0 is the topmost centre.
    let mut rank: [usize; BANDS] = std::array::from_fn(|k| k);
    rank.sort_by(|&a, &b| centers[a].total_cmp(&centers[b]));
    let mut order = [0usize; BANDS];
    for (pos, &k) in rank.iter().enumerate() {
        order[k] = pos;
    }
    labels.into_iter().map(|l| order[l]).collect()
}

fn sort_by_row_bands(circles: &mut [DetectedCircle]) {
    // Start from a canonical order so the clustering sees the same input
    // regardless of detection order.
    circles.sort_by(|a, b| raster_cmp(&a.center, &b.center));
    let ys: Vec<f32> = circles.iter().map(|c| c.center.y).collect();
    let labels = band_labels(&ys);

    let mut keyed: Vec<(usize, DetectedCircle)> =
        labels.into_iter().zip(circles.iter().copied()).collect();
    keyed.sort_by(|(la, a), (lb, b)| {
        la.cmp(lb)
            .then_with(|| raster_cmp(&a.center, &b.center))
    });
    for (dst, (_, c)) in circles.iter_mut().zip(keyed) {
        *dst = c;
    }
}
