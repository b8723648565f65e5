//! Tube detection and measurement for nine-tube relaxometry phantoms.
//!
//! Pipeline on a normalized working image:
//! - Hough circle search on the smoothed 8-bit image, with radius and
//!   spacing bounds derived from the physical phantom model.
//! - Border and radius-plausibility post-filters.
//! - Count gate (exactly nine) and canonical numbering of the tubes.
//! - Square-region means on the full-precision image.
//!
//! ```no_run
//! use phantom_qa_core::{GrayImage, IntensityImage};
//! use phantom_qa_tubes::{measure_tubes, organize_tubes, TubeDetector, TubeOrdering};
//!
//! # let smoothed = GrayImage::new(256, 256);
//! # let intensity = IntensityImage::new(256, 256);
//! let detector = TubeDetector::default();
//! let detection = detector.detect(&smoothed.view(), 2.13);
//! if let Ok(tubes) = organize_tubes(&detection.circles, TubeOrdering::LinearKey) {
//!     let means = measure_tubes(&tubes, &intensity, 21);
//!     println!("tube 1: {}", means[0].formatted);
//! }
//! ```

mod detector;
pub mod filter;
pub mod hough;
mod organize;
mod stats;
mod types;

pub use detector::TubeDetector;
pub use organize::{organize_tubes, TubeCountMismatch};
pub use stats::{format_mean, measure_tubes, square_region_mean};
pub use types::{
    CircleDetectorParams, DetectedCircle, HoughParams, Tube, TubeDetection, TubeMeasurement,
    TubeOrdering,
};
