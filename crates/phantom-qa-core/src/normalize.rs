//! Crop, resample, 8-bit rescale and smoothing of the source image.
//!
//! Each step is a pure transform; [`normalize`] chains them and carries the
//! updated pixel scale along.

use crate::geometry::{CropGeometry, PhantomAssumptions};
use crate::image::{sample_bilinear_clamped, GrayImage, GrayImageView, IntensityImage};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("crop window exceeds the {width}x{height} source image")]
    WindowOutsideImage { width: usize, height: usize },
    #[error("working size must be positive")]
    EmptyWorkingSize,
    #[error("smoothing kernel size must be odd and positive (got {0})")]
    InvalidKernel(usize),
    #[error("intensity divisor must be positive and finite (got {0})")]
    InvalidDivisor(f64),
}

/// Image prepared for detection and measurement.
#[derive(Clone, Debug)]
pub struct WorkingImage {
    /// Cropped and resampled image at native intensity depth.
    pub intensity: IntensityImage,
    /// 8-bit rescaled and smoothed copy used for detection and display.
    pub smoothed: GrayImage,
    /// Working-frame pixels per millimetre.
    pub mm2pix: f64,
}

/// Run the full normalization chain.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(width = source.width, height = source.height))
)]
pub fn normalize(
    source: &IntensityImage,
    crop: &CropGeometry,
    phantom: &PhantomAssumptions,
) -> Result<WorkingImage, NormalizeError> {
    let w = crop.window;
    if w.x1 > source.width || w.y1 > source.height {
        return Err(NormalizeError::WindowOutsideImage {
            width: source.width,
            height: source.height,
        });
    }
    let size = phantom.working_size;
    if size == 0 {
        return Err(NormalizeError::EmptyWorkingSize);
    }

    let cropped = source.crop(w.x0, w.y0, w.x1, w.y1);
    let intensity = resample_bilinear(&cropped, size, size);
    let mm2pix = crop.resampled_mm2pix(size);

    let img8 = rescale_to_u8(&intensity, phantom.intensity_divisor)?;
    let smoothed = gaussian_blur(&img8.view(), phantom.blur_kernel)?;

    log::debug!(
        "normalized {}x{} crop to {size}x{size}, mm2pix {:.4} -> {:.4}",
        w.width(),
        w.height(),
        crop.mm2pix,
        mm2pix
    );

    Ok(WorkingImage {
        intensity,
        smoothed,
        mm2pix,
    })
}

/// Bilinear resampling with pixel-centre alignment and replicated borders.
///
/// Output values are rounded so they stay on the source's integer grid.
pub fn resample_bilinear(src: &IntensityImage, out_w: usize, out_h: usize) -> IntensityImage {
    let sx = src.width as f32 / out_w as f32;
    let sy = src.height as f32 / out_h as f32;
    IntensityImage::from_fn(out_w, out_h, |x, y| {
        let px = (x as f32 + 0.5) * sx - 0.5;
        let py = (y as f32 + 0.5) * sy - 0.5;
        sample_bilinear_clamped(src, px, py).round()
    })
}

/// Map native intensities to 8 bits with a fixed divisor.
///
/// Not a min/max stretch: values outside `0..=255 * divisor` clip.
pub fn rescale_to_u8(src: &IntensityImage, divisor: f64) -> Result<GrayImage, NormalizeError> {
    if !divisor.is_finite() || divisor <= 0.0 {
        return Err(NormalizeError::InvalidDivisor(divisor));
    }
    let data = src
        .data
        .iter()
        .map(|&v| (v as f64 / divisor).clamp(0.0, 255.0) as u8)
        .collect();
    Ok(GrayImage {
        width: src.width,
        height: src.height,
        data,
    })
}

/// Normalized 1D Gaussian kernel of odd size `ksize`.
///
/// Sigma follows the usual size-derived rule `0.3 * ((k - 1) / 2 - 1) + 0.8`.
pub fn gaussian_kernel(ksize: usize) -> Result<Vec<f32>, NormalizeError> {
    if ksize == 0 || ksize % 2 == 0 {
        return Err(NormalizeError::InvalidKernel(ksize));
    }
    let sigma = 0.3 * ((ksize as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (ksize / 2) as f64;
    let mut k: Vec<f64> = (0..ksize)
        .map(|i| {
            let d = i as f64 - half;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = k.iter().sum();
    for v in &mut k {
        *v /= sum;
    }
    Ok(k.into_iter().map(|v| v as f32).collect())
}

#[inline]
fn reflect101(i: i64, n: usize) -> usize {
    let n = n as i64;
    if n == 1 {
        return 0;
    }
    let period = 2 * n - 2;
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as usize
}

/// Separable Gaussian smoothing with reflect-101 borders.
pub fn gaussian_blur(src: &GrayImageView<'_>, ksize: usize) -> Result<GrayImage, NormalizeError> {
    let kernel = gaussian_kernel(ksize)?;
    let (w, h) = (src.width, src.height);
    if w == 0 || h == 0 {
        return Ok(GrayImage::new(w, h));
    }
    let half = (ksize / 2) as i64;

    let mut tmp = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, &wk) in kernel.iter().enumerate() {
                let sx = reflect101(x as i64 + k as i64 - half, w);
                acc += wk * src.get(sx, y) as f32;
            }
            tmp[y * w + x] = acc;
        }
    }

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for (k, &wk) in kernel.iter().enumerate() {
                let sy = reflect101(y as i64 + k as i64 - half, h);
                acc += wk * tmp[sy * w + x];
            }
            out.data[y * w + x] = acc.round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::compute_crop_geometry;
    use approx::assert_relative_eq;

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(9).expect("odd");
        assert_eq!(k.len(), 9);
        assert_relative_eq!(k.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        for i in 0..4 {
            assert_relative_eq!(k[i], k[8 - i], epsilon = 1e-7);
        }
        assert!(k[4] > k[3] && k[3] > k[0]);
    }

    #[test]
    fn even_kernel_is_rejected() {
        assert_eq!(gaussian_kernel(4), Err(NormalizeError::InvalidKernel(4)));
    }

    #[test]
    fn reflect101_mirrors_without_repeating_edge() {
        assert_eq!(reflect101(-1, 5), 1);
        assert_eq!(reflect101(-2, 5), 2);
        assert_eq!(reflect101(5, 5), 3);
        assert_eq!(reflect101(6, 5), 2);
        assert_eq!(reflect101(3, 5), 3);
    }

    #[test]
    fn blur_keeps_constant_image() {
        let img = GrayImage {
            width: 12,
            height: 7,
            data: vec![77; 84],
        };
        let out = gaussian_blur(&img.view(), 9).expect("blur");
        assert!(out.data.iter().all(|&v| v == 77));
    }

    #[test]
    fn rescale_divides_and_clips() {
        let img = IntensityImage::from_vec(4, 1, vec![-50.0, 999.0, 1500.0, 4000.0]).unwrap();
        let out = rescale_to_u8(&img, 10.0).expect("rescale");
        assert_eq!(out.data, vec![0, 99, 150, 255]);
    }

    #[test]
    fn resample_identity_size_is_exact() {
        let img = IntensityImage::from_fn(8, 8, |x, y| (x * 8 + y) as f32);
        let out = resample_bilinear(&img, 8, 8);
        assert_eq!(out, img);
    }

    #[test]
    fn resample_preserves_constant_regions() {
        let img = IntensityImage::from_fn(120, 120, |x, _| if x < 60 { 1200.0 } else { 0.0 });
        let out = resample_bilinear(&img, 256, 256);
        assert_eq!(out.get(10, 100), 1200.0);
        assert_eq!(out.get(250, 5), 0.0);
    }

    #[test]
    fn normalize_updates_scale_and_sizes() {
        let phantom = PhantomAssumptions::default();
        let src = IntensityImage::from_fn(256, 256, |_, _| 1000.0);
        let crop = compute_crop_geometry(256, 256, 1.0, &phantom).expect("fits");
        let work = normalize(&src, &crop, &phantom).expect("normalize");
        assert_eq!(work.intensity.width, 256);
        assert_eq!(work.smoothed.height, 256);
        assert_relative_eq!(work.mm2pix, 256.0 / 120.0, epsilon = 1e-12);
        assert!(work.intensity.data.iter().all(|&v| v == 1000.0));
        assert!(work.smoothed.data.iter().all(|&v| v == 100));
    }
}
