//! Gradient Hough transform for circles.
//!
//! Pipeline: Sobel gradients, Canny edges, votes cast along each edge
//! normal for every radius in range, centre candidates at accumulator local
//! maxima, minimum-distance suppression, and a radius estimate from the
//! histogram of edge distances around each accepted centre.
//!
//! Every step is deterministic: candidates are ordered by votes and then by
//! raster index.

use nalgebra::Point2;
use phantom_qa_core::GrayImageView;

use crate::types::{DetectedCircle, HoughParams};

#[cfg(feature = "tracing")]
use tracing::instrument;

const TAN_22_5: f32 = 0.414_213_57;
const TAN_67_5: f32 = 2.414_213_6;

/// Sobel derivatives of an 8-bit image, borders replicated.
#[derive(Clone, Debug)]
pub struct Gradients {
    pub width: usize,
    pub height: usize,
    pub dx: Vec<i32>,
    pub dy: Vec<i32>,
}

pub fn sobel(img: &GrayImageView<'_>) -> Gradients {
    let (w, h) = (img.width, img.height);
    let mut dx = vec![0i32; w * h];
    let mut dy = vec![0i32; w * h];
    if w == 0 || h == 0 {
        return Gradients {
            width: w,
            height: h,
            dx,
            dy,
        };
    }

    let px = |x: i64, y: i64| -> i32 {
        let xc = x.clamp(0, w as i64 - 1) as usize;
        let yc = y.clamp(0, h as i64 - 1) as usize;
        img.get(xc, yc) as i32
    };

    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let gx = px(x + 1, y - 1) + 2 * px(x + 1, y) + px(x + 1, y + 1)
                - px(x - 1, y - 1)
                - 2 * px(x - 1, y)
                - px(x - 1, y + 1);
            let gy = px(x - 1, y + 1) + 2 * px(x, y + 1) + px(x + 1, y + 1)
                - px(x - 1, y - 1)
                - 2 * px(x, y - 1)
                - px(x + 1, y - 1);
            let i = y as usize * w + x as usize;
            dx[i] = gx;
            dy[i] = gy;
        }
    }

    Gradients {
        width: w,
        height: h,
        dx,
        dy,
    }
}

/// Canny edge map on the L1 gradient magnitude.
///
/// Pixels on the outermost frame row/column never become edges.
pub fn canny_edges(grad: &Gradients, low: f32, high: f32) -> Vec<bool> {
    let (w, h) = (grad.width, grad.height);
    let mut edges = vec![false; w * h];
    if w < 3 || h < 3 {
        return edges;
    }

    let mag: Vec<f32> = grad
        .dx
        .iter()
        .zip(&grad.dy)
        .map(|(&gx, &gy)| (gx.abs() + gy.abs()) as f32)
        .collect();

    // 0 = suppressed, 1 = weak, 2 = edge
    let mut state = vec![0u8; w * h];
    let mut stack = Vec::new();

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let m = mag[i];
            if m <= low {
                continue;
            }
            let gx = grad.dx[i];
            let gy = grad.dy[i];
            let ax = gx.abs() as f32;
            let ay = gy.abs() as f32;

            let (n1, n2) = if ay <= ax * TAN_22_5 {
                (i - 1, i + 1)
            } else if ay >= ax * TAN_67_5 {
                (i - w, i + w)
            } else if (gx < 0) != (gy < 0) {
                (i - w + 1, i + w - 1)
            } else {
                (i - w - 1, i + w + 1)
            };

            if m > mag[n1] && m >= mag[n2] {
                if m > high {
                    state[i] = 2;
                    stack.push(i);
                } else {
                    state[i] = 1;
                }
            }
        }
    }

    while let Some(i) = stack.pop() {
        edges[i] = true;
        let (x, y) = ((i % w) as i64, (i / w) as i64);
        for ny in y - 1..=y + 1 {
            for nx in x - 1..=x + 1 {
                if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                if state[j] == 1 {
                    state[j] = 2;
                    stack.push(j);
                }
            }
        }
    }

    edges
}

/// Cast centre votes along both directions of each edge normal.
fn accumulate_centers(
    grad: &Gradients,
    edges: &[bool],
    min_radius: u32,
    max_radius: u32,
) -> Vec<u32> {
    let (w, h) = (grad.width, grad.height);
    let mut acc = vec![0u32; w * h];

    for (i, _) in edges.iter().enumerate().filter(|&(_, &e)| e) {
        let gx = grad.dx[i] as f32;
        let gy = grad.dy[i] as f32;
        let norm = gx.hypot(gy);
        if norm <= 0.0 {
            continue;
        }
        let (ux, uy) = (gx / norm, gy / norm);
        let (x, y) = ((i % w) as f32, (i / w) as f32);

        for sign in [1.0f32, -1.0] {
            for r in min_radius..=max_radius {
                let cx = (x + sign * r as f32 * ux).round();
                let cy = (y + sign * r as f32 * uy).round();
                if cx < 0.0 || cy < 0.0 || cx >= w as f32 || cy >= h as f32 {
                    break;
                }
                acc[cy as usize * w + cx as usize] += 1;
            }
        }
    }

    acc
}

/// Accumulator local maxima above `threshold`, strongest first.
fn center_candidates(acc: &[u32], w: usize, h: usize, threshold: u32) -> Vec<(usize, u32)> {
    let mut out = Vec::new();
    if w < 3 || h < 3 {
        return out;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let i = y * w + x;
            let v = acc[i];
            if v > threshold && v > acc[i - 1] && v >= acc[i + 1] && v > acc[i - w] && v >= acc[i + w]
            {
                out.push((i, v));
            }
        }
    }
    out.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    out
}

/// Best-supported radius around `center`, as `(radius, support)`.
///
/// Support for integer radius `r` counts edge points whose rounded distance
/// is within one pixel of `r`; the winner maximizes support per unit radius.
fn estimate_radius(
    center: Point2<f32>,
    edge_points: &[Point2<f32>],
    min_radius: u32,
    max_radius: u32,
    hist: &mut Vec<u32>,
) -> Option<(f32, u32)> {
    let lo = min_radius.max(1) as usize;
    let hi = max_radius as usize;
    if lo > hi {
        return None;
    }
    hist.clear();
    hist.resize(hi + 2, 0);

    for p in edge_points {
        let d = (*p - center).norm();
        let r = d.round() as usize;
        if (lo..=hi).contains(&r) {
            hist[r] += 1;
        }
    }

    let mut best: Option<(usize, u32, f32)> = None;
    for r in lo..=hi {
        let w0 = (r - 1).max(lo);
        let w1 = (r + 1).min(hi);
        let support: u32 = hist[w0..=w1].iter().sum();
        let score = support as f32 / r as f32;
        if best.map_or(true, |b| score > b.2) {
            best = Some((r, support, score));
        }
    }

    let (r, support, _) = best?;
    if support == 0 {
        return None;
    }
    let w0 = (r - 1).max(lo);
    let w1 = (r + 1).min(hi);
    let weighted: u32 = (w0..=w1).map(|k| k as u32 * hist[k]).sum();
    Some((weighted as f32 / support as f32, support))
}

/// Detect circles in a smoothed 8-bit image.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, params), fields(width = img.width, height = img.height))
)]
pub fn detect_circles(img: &GrayImageView<'_>, params: &HoughParams) -> Vec<DetectedCircle> {
    if params.min_radius > params.max_radius || img.width < 3 || img.height < 3 {
        return Vec::new();
    }

    let grad = sobel(img);
    let high = params.gradient_threshold;
    let low = (high * 0.5).max(1.0);
    let edges = canny_edges(&grad, low, high);

    let edge_points: Vec<Point2<f32>> = edges
        .iter()
        .enumerate()
        .filter(|&(_, &e)| e)
        .map(|(i, _)| Point2::new((i % img.width) as f32, (i / img.width) as f32))
        .collect();
    if edge_points.is_empty() {
        log::debug!("no edges above gradient threshold {high}");
        return Vec::new();
    }

    let acc = accumulate_centers(&grad, &edges, params.min_radius, params.max_radius);
    let candidates = center_candidates(
        &acc,
        img.width,
        img.height,
        params.accumulator_threshold,
    );
    log::debug!(
        "{} edge pixels, {} centre candidates",
        edge_points.len(),
        candidates.len()
    );

    let min_d2 = params.min_center_distance * params.min_center_distance;
    let mut hist = Vec::new();
    let mut out: Vec<DetectedCircle> = Vec::new();

    for (idx, votes) in candidates {
        let center = Point2::new((idx % img.width) as f32, (idx / img.width) as f32);
        if out
            .iter()
            .any(|c| (c.center - center).norm_squared() < min_d2)
        {
            continue;
        }
        let Some((radius, support)) = estimate_radius(
            center,
            &edge_points,
            params.min_radius,
            params.max_radius,
            &mut hist,
        ) else {
            continue;
        };
        if support <= params.accumulator_threshold {
            continue;
        }
        out.push(DetectedCircle {
            center,
            radius,
            votes,
            support,
        });
    }

    out
}
