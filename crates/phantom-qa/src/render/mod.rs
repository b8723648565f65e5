//! Report artifacts: annotated contours image, info table, results record.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ab_glyph::{FontRef, PxScale};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_text_mut, text_size};
use phantom_qa_core::GrayImage;
use phantom_qa_tubes::TubeMeasurement;
use serde::{Deserialize, Serialize};

use crate::scan::ScanMetadata;

const OUTLINE: Rgb<u8> = Rgb([255, 255, 0]);
const LABEL: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_SCALE: f32 = 13.0;
const LABEL_FONT: &[u8] = include_bytes!("../../assets/DejaVuSansMono.ttf");
/// Grey level of the measurement squares in the mask diagnostic.
const MASK_VALUE: u8 = 100;

#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error("image buffer does not match {width}x{height}")]
    BufferSize { width: usize, height: usize },
    #[error("embedded label font could not be parsed")]
    Font,
}

fn label_font() -> Result<FontRef<'static>, RenderError> {
    FontRef::try_from_slice(LABEL_FONT).map_err(|_| RenderError::Font)
}

/// Where the three report artifacts of one scan are written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub contours: PathBuf,
    pub info: PathBuf,
    pub results: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: impl AsRef<Path>, prefix: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            contours: dir.join(format!("{prefix}contours.png")),
            info: dir.join(format!("{prefix}info.csv")),
            results: dir.join(format!("{prefix}results.json")),
        }
    }

    pub fn all(&self) -> [&Path; 3] {
        [
            self.contours.as_path(),
            self.info.as_path(),
            self.results.as_path(),
        ]
    }
}

/// Annotate the smoothed working image: each tube gets its measurement
/// outline and its trimmed mean centred on the tube.
pub fn render_contours(
    smoothed: &GrayImage,
    measurements: &[TubeMeasurement],
    outline_radius: i32,
) -> Result<RgbImage, RenderError> {
    let font = label_font()?;
    let scale = PxScale::from(LABEL_SCALE);
    let mut rgb = RgbImage::from_fn(smoothed.width as u32, smoothed.height as u32, |x, y| {
        let v = smoothed.get(x as usize, y as usize);
        Rgb([v, v, v])
    });
    for m in measurements {
        let cx = m.tube.center.x as i32;
        let cy = m.tube.center.y as i32;
        draw_hollow_circle_mut(&mut rgb, (cx, cy), outline_radius, OUTLINE);
        let label = m.formatted.trim();
        let (w, h) = text_size(scale, &font, label);
        draw_text_mut(
            &mut rgb,
            LABEL,
            cx - w as i32 / 2,
            cy - h as i32 / 2,
            scale,
            &font,
            label,
        );
    }
    Ok(rgb)
}

/// Union of the square measurement regions, for visual checks.
pub fn render_mask(
    width: usize,
    height: usize,
    measurements: &[TubeMeasurement],
    half_width: i32,
) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let d = i64::from(half_width.max(0));
    for m in measurements {
        let cx = m.tube.center.x as i64;
        let cy = m.tube.center.y as i64;
        let x0 = (cx - d).clamp(0, width as i64) as usize;
        let x1 = (cx + d).clamp(0, width as i64) as usize;
        let y0 = (cy - d).clamp(0, height as i64) as usize;
        let y1 = (cy + d).clamp(0, height as i64) as usize;
        for y in y0..y1 {
            mask.data[y * width + x0..y * width + x1].fill(MASK_VALUE);
        }
    }
    mask
}

pub fn write_rgb_png(img: &RgbImage, path: impl AsRef<Path>) -> Result<(), RenderError> {
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

pub fn write_gray_png(img: &GrayImage, path: impl AsRef<Path>) -> Result<(), RenderError> {
    let buf = image::GrayImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
        .ok_or(RenderError::BufferSize {
            width: img.width,
            height: img.height,
        })?;
    buf.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

pub const INFO_HEADER: [&str; 9] = [
    "Date",
    "PatientName",
    "Site",
    "Manufacturer",
    "Model",
    "Version",
    "SerDescr",
    "Rows",
    "Columns",
];

/// One data row of `info.csv`. `site` holds the raw institution name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InfoRecord {
    pub date: String,
    pub patient_name: String,
    pub site: String,
    pub manufacturer: String,
    pub model: String,
    pub version: String,
    pub series: String,
    pub rows: usize,
    pub columns: usize,
}

impl InfoRecord {
    pub fn from_metadata(meta: &ScanMetadata) -> Self {
        Self {
            date: meta.study_date.clone(),
            patient_name: meta.patient_name.clone(),
            site: meta.institution_name.clone(),
            manufacturer: meta.manufacturer.clone(),
            model: meta.model.clone(),
            version: meta.software_versions_joined(),
            series: meta.series_label(),
            rows: meta.rows,
            columns: meta.columns,
        }
    }

    pub fn fields(&self) -> [String; 9] {
        [
            self.date.clone(),
            self.patient_name.clone(),
            self.site.clone(),
            self.manufacturer.clone(),
            self.model.clone(),
            self.version.clone(),
            self.series.clone(),
            self.rows.to_string(),
            self.columns.to_string(),
        ]
    }
}

/// Header plus one row, CRLF terminated.
pub fn write_info_csv(record: &InfoRecord, path: impl AsRef<Path>) -> Result<(), RenderError> {
    let mut w = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_path(path)?;
    w.write_record(INFO_HEADER)?;
    w.write_record(record.fields())?;
    w.flush()?;
    Ok(())
}

/// Structured results record. Field order is the serialized key order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsRecord {
    pub subject_id: String,
    pub t1_date: String,
    pub t1_site: String,
    pub t1_vendor: String,
    pub t1_model: String,
    pub t1_sw_version: String,
    pub t1_serdescr: String,
    pub t1_tube1: String,
    pub t1_tube2: String,
    pub t1_tube3: String,
    pub t1_tube4: String,
    pub t1_tube5: String,
    pub t1_tube6: String,
    pub t1_tube7: String,
    pub t1_tube8: String,
    pub t1_tube9: String,
}

impl ResultsRecord {
    pub fn new(meta: &ScanMetadata, measurements: &[TubeMeasurement; 9]) -> Self {
        let t = |i: usize| measurements[i].formatted.clone();
        Self {
            subject_id: meta.patient_name.clone(),
            t1_date: meta.study_date.clone(),
            t1_site: meta.institution_name.clone(),
            t1_vendor: meta.manufacturer.clone(),
            t1_model: meta.model.clone(),
            t1_sw_version: meta.software_version(),
            t1_serdescr: meta.series_label(),
            t1_tube1: t(0),
            t1_tube2: t(1),
            t1_tube3: t(2),
            t1_tube4: t(3),
            t1_tube5: t(4),
            t1_tube6: t(5),
            t1_tube7: t(6),
            t1_tube8: t(7),
            t1_tube9: t(8),
        }
    }

    /// Tube values in tube order.
    pub fn tubes(&self) -> [&str; 9] {
        [
            self.t1_tube1.as_str(),
            self.t1_tube2.as_str(),
            self.t1_tube3.as_str(),
            self.t1_tube4.as_str(),
            self.t1_tube5.as_str(),
            self.t1_tube6.as_str(),
            self.t1_tube7.as_str(),
            self.t1_tube8.as_str(),
            self.t1_tube9.as_str(),
        ]
    }
}

/// Pretty JSON with a four-space indent.
pub fn write_results_json(
    record: &ResultsRecord,
    path: impl AsRef<Path>,
) -> Result<(), RenderError> {
    let mut w = BufWriter::new(File::create(path)?);
    let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut w, fmt);
    record.serialize(&mut ser)?;
    w.flush()?;
    Ok(())
}
