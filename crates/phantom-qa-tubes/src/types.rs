use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Detector sensitivity settings that are not derived from physical units.
///
/// Radius and spacing bounds come from [`phantom_qa_core::PhantomAssumptions`];
/// these knobs were tuned empirically and are exposed so they can be adjusted
/// per scanner or protocol.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircleDetectorParams {
    /// Upper Canny threshold on the L1 Sobel magnitude; the lower one is half.
    pub gradient_threshold: f32,
    /// Minimal accumulator votes for a centre candidate, and minimal edge
    /// support for its radius.
    pub accumulator_threshold: u32,
    /// Circles whose centre lies closer than this to any frame edge are
    /// treated as border artifacts.
    pub border_margin_px: u32,
    /// Maximal relative deviation from the median detected radius.
    /// `None` disables the check.
    pub radius_tolerance_frac: Option<f32>,
}

impl Default for CircleDetectorParams {
    fn default() -> Self {
        Self {
            gradient_threshold: 20.0,
            accumulator_threshold: 5,
            border_margin_px: 10,
            radius_tolerance_frac: Some(0.25),
        }
    }
}

/// Hough search parameters in working-image pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HoughParams {
    pub min_radius: u32,
    pub max_radius: u32,
    pub min_center_distance: f32,
    pub gradient_threshold: f32,
    pub accumulator_threshold: u32,
}

/// One circle reported by the Hough pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedCircle {
    pub center: Point2<f32>,
    pub radius: f32,
    /// Accumulator votes at the centre.
    pub votes: u32,
    /// Edge pixels supporting the chosen radius.
    pub support: u32,
}

/// Strategy used to number the nine tube centres.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TubeOrdering {
    /// Ascending `y + 4x`. Walks the grid column by column, which is the
    /// numbering the historical QA records use.
    #[default]
    LinearKey,
    /// Cluster centres into three horizontal bands, then order left to right
    /// inside each band.
    RowBands,
}

/// A tube slot with its position in the working frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tube {
    /// 1-based tube number.
    pub index: usize,
    pub center: Point2<f32>,
    /// Detected radius, kept for display only.
    pub radius: f32,
}

/// Mean intensity measured for one tube.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TubeMeasurement {
    pub tube: Tube,
    pub mean: f64,
    pub pixel_count: usize,
    /// `mean` rendered as `%5.0f`.
    pub formatted: String,
}

/// Output of [`crate::TubeDetector::detect`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TubeDetection {
    pub hough: Option<HoughParams>,
    /// Circles that survived every filter.
    pub circles: Vec<DetectedCircle>,
    pub border_rejected: Vec<DetectedCircle>,
    pub radius_rejected: Vec<DetectedCircle>,
}
