/// Borrowed 8-bit grayscale image, row-major.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

impl GrayImageView<'_> {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

/// Owned 8-bit grayscale image, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width * height],
        }
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

/// Scalar image at the acquisition's native intensity depth.
///
/// Samples are stored as `f32` so 12/16-bit unsigned and signed stored values
/// are represented exactly.
#[derive(Clone, Debug, PartialEq)]
pub struct IntensityImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl IntensityImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    /// Wrap a row-major buffer; returns `None` on a length mismatch.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Option<Self> {
        (width.checked_mul(height)? == data.len()).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        self.data[y * self.width + x] = v;
    }

    /// Copy out the half-open rectangle `[x0, x1) × [y0, y1)`.
    ///
    /// Callers must pass bounds inside the image.
    pub fn crop(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> IntensityImage {
        let w = x1 - x0;
        let h = y1 - y0;
        let mut data = Vec::with_capacity(w * h);
        for y in y0..y1 {
            let row = y * self.width;
            data.extend_from_slice(&self.data[row + x0..row + x1]);
        }
        IntensityImage {
            width: w,
            height: h,
            data,
        }
    }
}

#[inline]
fn get_clamped(src: &IntensityImage, x: i32, y: i32) -> f32 {
    let xc = x.clamp(0, src.width as i32 - 1) as usize;
    let yc = y.clamp(0, src.height as i32 - 1) as usize;
    src.data[yc * src.width + xc]
}

/// Bilinear sample with replicated borders.
///
/// `(x, y)` are pixel-index coordinates: `(0, 0)` is the centre of the first
/// pixel.
#[inline]
pub fn sample_bilinear_clamped(src: &IntensityImage, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_clamped(src, x0, y0);
    let p10 = get_clamped(src, x0 + 1, y0);
    let p01 = get_clamped(src, x0, y0 + 1);
    let p11 = get_clamped(src, x0 + 1, y0 + 1);

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}
