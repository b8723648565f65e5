use phantom_qa_core::{mm_to_px, GrayImageView, PhantomAssumptions};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::filter::{reject_border_circles, reject_implausible_radii};
use crate::hough::detect_circles;
use crate::types::{CircleDetectorParams, HoughParams, TubeDetection};

/// Tube detector: Hough circles plus the border and radius post-filters.
#[derive(Clone, Debug, Default)]
pub struct TubeDetector {
    phantom: PhantomAssumptions,
    params: CircleDetectorParams,
}

impl TubeDetector {
    pub fn new(phantom: PhantomAssumptions, params: CircleDetectorParams) -> Self {
        Self { phantom, params }
    }

    pub fn phantom(&self) -> &PhantomAssumptions {
        &self.phantom
    }

    pub fn params(&self) -> &CircleDetectorParams {
        &self.params
    }

    /// Pixel-space search parameters for a working image with `mm2pix`
    /// pixels per millimetre. Physical sizes are truncated to whole pixels.
    pub fn hough_params(&self, mm2pix: f64) -> HoughParams {
        let px = |mm: f64| mm_to_px(mm, mm2pix).max(0) as u32;
        HoughParams {
            min_radius: px(self.phantom.tube_radius_min_mm),
            max_radius: px(self.phantom.tube_radius_max_mm),
            min_center_distance: px(self.phantom.tube_spacing_mm) as f32,
            gradient_threshold: self.params.gradient_threshold,
            accumulator_threshold: self.params.accumulator_threshold,
        }
    }

    /// Run the detector on the smoothed working image.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, image), fields(width = image.width, height = image.height))
    )]
    pub fn detect(&self, image: &GrayImageView<'_>, mm2pix: f64) -> TubeDetection {
        let hough = self.hough_params(mm2pix);
        log::debug!(
            "hough search: radius {}..={} px, min distance {} px",
            hough.min_radius,
            hough.max_radius,
            hough.min_center_distance
        );

        let raw = detect_circles(image, &hough);
        let raw_count = raw.len();
        let (circles, border_rejected) = reject_border_circles(
            raw,
            image.width,
            image.height,
            self.params.border_margin_px,
        );
        let (circles, radius_rejected) = match self.params.radius_tolerance_frac {
            Some(tol) => reject_implausible_radii(circles, tol),
            None => (circles, Vec::new()),
        };

        log::info!(
            "{} circles detected, {} on edge, {} implausible, {} kept",
            raw_count,
            border_rejected.len(),
            radius_rejected.len(),
            circles.len()
        );

        TubeDetection {
            hough: Some(hough),
            circles,
            border_rejected,
            radius_rejected,
        }
    }
}
