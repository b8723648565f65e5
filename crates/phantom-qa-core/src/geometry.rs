//! Physical phantom model and the pixel-space crop it implies.
//!
//! The phantom is assumed centred in the field of view. Everything physical
//! is expressed in millimetres and converted with `mm2pix` (pixels per mm).

use serde::{Deserialize, Serialize};

/// Physical description of the nine-tube relaxometry phantom.
///
/// The defaults describe the T1MES phantom. The value is passed explicitly
/// through the pipeline so alternate geometries can be substituted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhantomAssumptions {
    /// Half of the phantom side length; the crop extends this far from the
    /// image centre in each axis.
    pub phantom_half_width_mm: f64,
    /// Smallest tube radius the detector searches for.
    pub tube_radius_min_mm: f64,
    /// Largest tube radius the detector searches for.
    pub tube_radius_max_mm: f64,
    /// Minimal centre-to-centre distance between neighbouring tubes.
    pub tube_spacing_mm: f64,
    /// Half-width of the square measurement region around each tube centre.
    pub mask_half_width_mm: f64,
    /// Side of the square working frame the crop is resampled to.
    pub working_size: usize,
    /// Fixed divisor mapping native intensities to the 8-bit working range.
    pub intensity_divisor: f64,
    /// Gaussian smoothing kernel size (odd).
    pub blur_kernel: usize,
}

impl PhantomAssumptions {
    /// Number of tubes in the phantom grid.
    pub const TUBE_COUNT: usize = 9;
    /// The tubes form a square grid of this many rows and columns.
    pub const GRID_SIDE: usize = 3;
}

impl Default for PhantomAssumptions {
    fn default() -> Self {
        Self {
            phantom_half_width_mm: 60.0,
            tube_radius_min_mm: 13.0,
            tube_radius_max_mm: 18.0,
            tube_spacing_mm: 32.0,
            mask_half_width_mm: 10.0,
            working_size: 256,
            intensity_divisor: 10.0,
            blur_kernel: 9,
        }
    }
}

/// Errors raised while deriving the crop geometry.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("invalid pixel spacing {spacing_mm} mm")]
    InvalidPixelSpacing { spacing_mm: f64 },
    #[error(
        "crop window [{x0}, {x1}) x [{y0}, {y1}) does not fit a {columns}x{rows} image; \
         the phantom is not contained in the field of view"
    )]
    WindowOutOfBounds {
        x0: i64,
        y0: i64,
        x1: i64,
        y1: i64,
        columns: usize,
        rows: usize,
    },
}

/// Half-open pixel rectangle `[x0, x1) × [y0, y1)` inside the source image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropWindow {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl CropWindow {
    #[inline]
    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }
}

/// Crop window plus the source-resolution scale it was computed with.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropGeometry {
    pub window: CropWindow,
    /// Source pixels per millimetre.
    pub mm2pix: f64,
}

impl CropGeometry {
    /// Pixels per millimetre after resampling the crop to `working_size`.
    ///
    /// The horizontal extent is used for both axes; pixels are isotropic.
    pub fn resampled_mm2pix(&self, working_size: usize) -> f64 {
        self.mm2pix * working_size as f64 / self.window.width() as f64
    }

    /// Physical size of the crop window in millimetres `(width, height)`.
    pub fn window_size_mm(&self) -> (f64, f64) {
        (
            self.window.width() as f64 / self.mm2pix,
            self.window.height() as f64 / self.mm2pix,
        )
    }
}

/// Convert a physical length to whole pixels, truncating toward zero.
#[inline]
pub fn mm_to_px(mm: f64, mm2pix: f64) -> i32 {
    (mm * mm2pix) as i32
}

/// Derive the crop window for an image of `columns × rows` pixels.
///
/// The window is centred on `(columns / 2, rows / 2)` and extends
/// `phantom_half_width_mm` in each direction. Bounds are truncated toward
/// zero and must lie inside the image.
pub fn compute_crop_geometry(
    columns: usize,
    rows: usize,
    pixel_spacing_mm: f64,
    phantom: &PhantomAssumptions,
) -> Result<CropGeometry, GeometryError> {
    if !pixel_spacing_mm.is_finite() || pixel_spacing_mm <= 0.0 {
        return Err(GeometryError::InvalidPixelSpacing {
            spacing_mm: pixel_spacing_mm,
        });
    }

    let mm2pix = 1.0 / pixel_spacing_mm;
    let pix_half = phantom.phantom_half_width_mm * mm2pix;

    let cx = columns as f64 / 2.0;
    let cy = rows as f64 / 2.0;
    let x0 = (cx - pix_half) as i64;
    let x1 = (cx + pix_half) as i64;
    let y0 = (cy - pix_half) as i64;
    let y1 = (cy + pix_half) as i64;

    let inside = x0 >= 0
        && y0 >= 0
        && x1 <= columns as i64
        && y1 <= rows as i64
        && x1 > x0
        && y1 > y0;
    if !inside {
        return Err(GeometryError::WindowOutOfBounds {
            x0,
            y0,
            x1,
            y1,
            columns,
            rows,
        });
    }

    Ok(CropGeometry {
        window: CropWindow {
            x0: x0 as usize,
            y0: y0 as usize,
            x1: x1 as usize,
            y1: y1 as usize,
        },
        mm2pix,
    })
}
