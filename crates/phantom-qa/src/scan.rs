//! DICOM loading: the source image plus the attributes the reports need.

use std::path::{Path, PathBuf};

use dicom_dictionary_std::tags;
use dicom_object::{open_file, DefaultDicomObject, OpenFileOptions, Tag};
use phantom_qa_core::IntensityImage;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("failed to read DICOM file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: dicom_object::ReadError,
    },
    #[error("missing required attribute {0}")]
    MissingAttribute(&'static str),
    #[error("attribute {name} has an invalid value: {value:?}")]
    InvalidAttribute { name: &'static str, value: String },
    #[error("unsupported pixel data: {0}")]
    UnsupportedPixelData(String),
}

/// Acquisition site derived from the institution name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Site {
    Wake,
    #[serde(rename = "VCU")]
    Vcu,
    Null,
}

impl Site {
    /// `Wake` matches case-insensitively, `VCU` only in upper case.
    pub fn from_institution(institution: &str) -> Self {
        if institution.to_lowercase().contains("wake") {
            Site::Wake
        } else if institution.contains("VCU") {
            Site::Vcu
        } else {
            Site::Null
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Site::Wake => "Wake",
            Site::Vcu => "VCU",
            Site::Null => "Null",
        }
    }
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Scan attributes used for cropping, naming and reporting.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanMetadata {
    pub rows: usize,
    pub columns: usize,
    /// Row spacing in millimetres; pixels are assumed square.
    pub pixel_spacing_mm: f64,
    pub institution_name: String,
    pub manufacturer: String,
    pub model: String,
    pub software_versions: Vec<String>,
    pub study_date: String,
    pub patient_name: String,
    pub patient_id: String,
    pub series_number: Option<String>,
    pub series_description: Option<String>,
    pub protocol_name: Option<String>,
    pub instance_number: Option<i32>,
}

impl ScanMetadata {
    pub fn site(&self) -> Site {
        Site::from_institution(&self.institution_name)
    }

    /// `Ser <n>:<description>`, falling back to the protocol name.
    ///
    /// Empty when neither description nor protocol is present.
    pub fn series_label(&self) -> String {
        let prefix = self
            .series_number
            .as_ref()
            .map(|n| format!("Ser {n}"))
            .unwrap_or_default();
        match (&self.series_description, &self.protocol_name) {
            (Some(descr), _) => format!("{prefix}:{descr}"),
            (None, Some(protocol)) => format!("{prefix}:{protocol}"),
            (None, None) => String::new(),
        }
    }

    /// All software versions joined with the DICOM value separator.
    pub fn software_versions_joined(&self) -> String {
        self.software_versions.join("\\")
    }

    /// Version reported in the results record: Philips scanners list the
    /// relevant release first, others report every value.
    pub fn software_version(&self) -> String {
        if self.manufacturer.to_lowercase().starts_with("ph") {
            self.software_versions.first().cloned().unwrap_or_default()
        } else {
            self.software_versions_joined()
        }
    }

    /// File name prefix shared by every artifact of this scan.
    pub fn artifact_prefix(&self) -> String {
        format!(
            "QA_T1MES_{}_{}_S{}_",
            self.site(),
            self.study_date,
            self.series_number.as_deref().unwrap_or("")
        )
    }
}

/// A loaded scan.
#[derive(Clone, Debug)]
pub struct Scan {
    pub metadata: ScanMetadata,
    pub image: IntensityImage,
}

fn open(path: &Path) -> Result<DefaultDicomObject, ScanError> {
    open_file(path).map_err(|source| ScanError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn string_attr(obj: &DefaultDicomObject, tag: Tag) -> Option<String> {
    obj.element(tag)
        .ok()
        .and_then(|e| e.to_str().ok())
        .map(|s| s.trim().trim_end_matches('\0').to_string())
}

fn required_string(
    obj: &DefaultDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<String, ScanError> {
    string_attr(obj, tag).ok_or(ScanError::MissingAttribute(name))
}

fn required_usize(
    obj: &DefaultDicomObject,
    tag: Tag,
    name: &'static str,
) -> Result<usize, ScanError> {
    let elem = obj
        .element(tag)
        .map_err(|_| ScanError::MissingAttribute(name))?;
    elem.to_int::<u32>()
        .map(|v| v as usize)
        .map_err(|_| ScanError::InvalidAttribute {
            name,
            value: elem.to_str().map(|s| s.into_owned()).unwrap_or_default(),
        })
}

/// Read the reporting attributes without touching pixel data.
pub fn metadata_from_object(obj: &DefaultDicomObject) -> Result<ScanMetadata, ScanError> {
    let spacing_raw = required_string(obj, tags::PIXEL_SPACING, "PixelSpacing")?;
    let pixel_spacing_mm = parse_pixel_spacing(&spacing_raw).ok_or_else(|| {
        ScanError::InvalidAttribute {
            name: "PixelSpacing",
            value: spacing_raw.clone(),
        }
    })?;

    let software_versions = required_string(obj, tags::SOFTWARE_VERSIONS, "SoftwareVersions")?
        .split('\\')
        .map(|s| s.trim().to_string())
        .collect();

    Ok(ScanMetadata {
        rows: required_usize(obj, tags::ROWS, "Rows")?,
        columns: required_usize(obj, tags::COLUMNS, "Columns")?,
        pixel_spacing_mm,
        institution_name: required_string(obj, tags::INSTITUTION_NAME, "InstitutionName")?,
        manufacturer: required_string(obj, tags::MANUFACTURER, "Manufacturer")?,
        model: required_string(obj, tags::MANUFACTURER_MODEL_NAME, "ManufacturerModelName")?,
        software_versions,
        study_date: required_string(obj, tags::STUDY_DATE, "StudyDate")?,
        patient_name: required_string(obj, tags::PATIENT_NAME, "PatientName")?,
        patient_id: string_attr(obj, tags::PATIENT_ID).unwrap_or_default(),
        series_number: string_attr(obj, tags::SERIES_NUMBER),
        series_description: string_attr(obj, tags::SERIES_DESCRIPTION),
        protocol_name: string_attr(obj, tags::PROTOCOL_NAME),
        instance_number: obj
            .element(tags::INSTANCE_NUMBER)
            .ok()
            .and_then(|e| e.to_int::<i32>().ok()),
    })
}

/// First value of a `row\column` spacing pair.
fn parse_pixel_spacing(raw: &str) -> Option<f64> {
    let v: f64 = raw.split('\\').next()?.trim().parse().ok()?;
    (v.is_finite() && v > 0.0).then_some(v)
}

/// Read only the reporting attributes of a DICOM file; parsing stops
/// before the pixel data.
pub fn read_metadata(path: impl AsRef<Path>) -> Result<ScanMetadata, ScanError> {
    let path = path.as_ref();
    let obj = OpenFileOptions::new()
        .read_until(tags::PIXEL_DATA)
        .open_file(path)
        .map_err(|source| ScanError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    metadata_from_object(&obj)
}

/// Load pixel data and attributes of a single-frame grayscale DICOM file.
pub fn load_scan(path: impl AsRef<Path>) -> Result<Scan, ScanError> {
    let path = path.as_ref();
    let obj = open(path)?;
    let metadata = metadata_from_object(&obj)?;

    if let Some(samples) = obj
        .element(tags::SAMPLES_PER_PIXEL)
        .ok()
        .and_then(|e| e.to_int::<u16>().ok())
    {
        if samples != 1 {
            return Err(ScanError::UnsupportedPixelData(format!(
                "{samples} samples per pixel"
            )));
        }
    }
    let bits_allocated = obj
        .element(tags::BITS_ALLOCATED)
        .map_err(|_| ScanError::MissingAttribute("BitsAllocated"))?
        .to_int::<u16>()
        .map_err(|_| ScanError::InvalidAttribute {
            name: "BitsAllocated",
            value: String::new(),
        })?;
    let pixel_representation = obj
        .element(tags::PIXEL_REPRESENTATION)
        .ok()
        .and_then(|e| e.to_int::<u16>().ok())
        .unwrap_or(0);
    let pixel_data = obj
        .element(tags::PIXEL_DATA)
        .map_err(|_| ScanError::MissingAttribute("PixelData"))?;
    let bytes = pixel_data.to_bytes().map_err(|_| {
        ScanError::UnsupportedPixelData("encapsulated (compressed) pixel data".to_string())
    })?;

    let image = decode_native_pixels(
        &bytes,
        bits_allocated,
        pixel_representation,
        metadata.rows,
        metadata.columns,
    )?;
    log::debug!(
        "loaded {}: {}x{} @ {} mm, {} bit",
        path.display(),
        metadata.columns,
        metadata.rows,
        metadata.pixel_spacing_mm,
        bits_allocated
    );
    Ok(Scan { metadata, image })
}

/// Decode the first frame of little-endian native pixel data.
///
/// `pixel_representation` is 0 for unsigned and 1 for two's complement
/// samples. Extra trailing bytes (further frames, padding) are ignored.
pub fn decode_native_pixels(
    bytes: &[u8],
    bits_allocated: u16,
    pixel_representation: u16,
    rows: usize,
    columns: usize,
) -> Result<IntensityImage, ScanError> {
    let n = rows * columns;
    let signed = pixel_representation == 1;
    let data: Vec<f32> = match bits_allocated {
        8 => {
            let frame = bytes.get(..n).ok_or_else(|| short_frame(bytes.len(), n))?;
            frame
                .iter()
                .map(|&b| if signed { f32::from(b as i8) } else { f32::from(b) })
                .collect()
        }
        16 => {
            let frame = bytes
                .get(..n * 2)
                .ok_or_else(|| short_frame(bytes.len(), n * 2))?;
            frame
                .chunks_exact(2)
                .map(|c| {
                    let raw = [c[0], c[1]];
                    if signed {
                        f32::from(i16::from_le_bytes(raw))
                    } else {
                        f32::from(u16::from_le_bytes(raw))
                    }
                })
                .collect()
        }
        other => {
            return Err(ScanError::UnsupportedPixelData(format!(
                "{other} bits allocated"
            )))
        }
    };
    IntensityImage::from_vec(columns, rows, data)
        .ok_or_else(|| ScanError::UnsupportedPixelData("empty image".to_string()))
}

fn short_frame(have: usize, need: usize) -> ScanError {
    ScanError::UnsupportedPixelData(format!("{have} bytes of pixel data, need {need}"))
}
