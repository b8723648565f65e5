//! Core types and utilities for relaxometry phantom QA.
//!
//! This crate is intentionally small and free of I/O. It holds the image
//! containers, the physical phantom model with its crop geometry, and the
//! normalization chain that produces the working image.

mod geometry;
mod image;
mod logger;
mod normalize;

pub use geometry::{
    compute_crop_geometry, mm_to_px, CropGeometry, CropWindow, GeometryError, PhantomAssumptions,
};
pub use image::{sample_bilinear_clamped, GrayImage, GrayImageView, IntensityImage};
pub use normalize::{
    gaussian_blur, gaussian_kernel, normalize, rescale_to_u8, resample_bilinear, NormalizeError,
    WorkingImage,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, init_with_verbosity, level_for_verbosity};

pub use nalgebra::Point2;
