//! Single-scan analysis: geometry, normalization, detection, ordering,
//! statistics and report artifacts.

use std::path::Path;

use phantom_qa_core::{compute_crop_geometry, mm_to_px, normalize, GeometryError, NormalizeError};
use phantom_qa_tubes::{measure_tubes, organize_tubes, TubeDetection, TubeDetector, TubeMeasurement};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::config::AnalysisConfig;
use crate::render::{
    render_contours, render_mask, write_gray_png, write_info_csv, write_results_json,
    write_rgb_png, ArtifactPaths, InfoRecord, RenderError, ResultsRecord,
};
use crate::scan::{load_scan, Scan, ScanError};
use crate::upload::{LoggingUploader, ResultUploader};

#[derive(thiserror::Error, Debug)]
pub enum AnalyzeError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("failed to write report artifact: {0}")]
    Render(#[from] RenderError),
}

/// Everything produced by a successful analysis.
#[derive(Clone, Debug)]
pub struct AnalysisReport {
    pub prefix: String,
    pub measurements: [TubeMeasurement; 9],
    pub record: ResultsRecord,
    pub artifacts: ArtifactPaths,
    pub detection: TubeDetection,
    /// False when `results.json` could not be written; upload is skipped then.
    pub results_written: bool,
    pub uploaded: bool,
}

/// Outcome of one analysis. Failure means the count gate rejected the scan.
#[derive(Clone, Debug)]
pub enum AnalysisStatus {
    Success(Box<AnalysisReport>),
    Failure { found: usize },
}

impl AnalysisStatus {
    /// Process exit code: 0 on success, 1 on failure.
    pub fn code(&self) -> i32 {
        match self {
            AnalysisStatus::Success(_) => 0,
            AnalysisStatus::Failure { .. } => 1,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisStatus::Success(_))
    }

    pub fn report(&self) -> Option<&AnalysisReport> {
        match self {
            AnalysisStatus::Success(r) => Some(r.as_ref()),
            AnalysisStatus::Failure { .. } => None,
        }
    }
}

/// Runs the analysis with a fixed configuration.
pub struct PhantomAnalyzer {
    config: AnalysisConfig,
    detector: TubeDetector,
    uploader: Box<dyn ResultUploader>,
}

impl PhantomAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        let detector = TubeDetector::new(config.phantom.clone(), config.detector.clone());
        Self {
            config,
            detector,
            uploader: Box::new(LoggingUploader),
        }
    }

    pub fn with_uploader(mut self, uploader: impl ResultUploader + 'static) -> Self {
        self.uploader = Box::new(uploader);
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze one DICOM file; artifacts land next to it.
    pub fn analyze(
        &self,
        image_path: impl AsRef<Path>,
        display: bool,
    ) -> Result<AnalysisStatus, AnalyzeError> {
        let image_path = image_path.as_ref();
        log::info!("analyzing {}", image_path.display());
        let scan = load_scan(image_path)?;
        let out_dir = match image_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        self.analyze_scan(&scan, out_dir, display)
    }

    /// Analyze an already loaded scan, writing artifacts into `out_dir`.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip_all,
            fields(rows = scan.metadata.rows, columns = scan.metadata.columns)
        )
    )]
    pub fn analyze_scan(
        &self,
        scan: &Scan,
        out_dir: &Path,
        display: bool,
    ) -> Result<AnalysisStatus, AnalyzeError> {
        let meta = &scan.metadata;
        let phantom = &self.config.phantom;
        let prefix = meta.artifact_prefix();

        let geometry =
            compute_crop_geometry(meta.columns, meta.rows, meta.pixel_spacing_mm, phantom)?;
        log::debug!(
            "crop window x {}..{} y {}..{}",
            geometry.window.x0,
            geometry.window.x1,
            geometry.window.y0,
            geometry.window.y1
        );
        let working = normalize(&scan.image, &geometry, phantom)?;

        if display {
            let path = out_dir.join(format!("{prefix}smoothed.png"));
            if let Err(e) = write_gray_png(&working.smoothed, &path) {
                log::warn!("unable to save {}: {e}", path.display());
            }
        }

        let detection = self.detector.detect(&working.smoothed.view(), working.mm2pix);
        let tubes = match organize_tubes(&detection.circles, self.config.ordering) {
            Ok(tubes) => tubes,
            Err(mismatch) => {
                log::warn!("{mismatch}; aborting");
                return Ok(AnalysisStatus::Failure {
                    found: mismatch.found,
                });
            }
        };

        let half_width = mm_to_px(phantom.mask_half_width_mm, working.mm2pix);
        let measurements = measure_tubes(&tubes, &working.intensity, half_width);
        let means: Vec<&str> = measurements.iter().map(|m| m.formatted.as_str()).collect();
        log::info!("tube means: {means:?}");

        if display {
            let mask = render_mask(
                working.smoothed.width,
                working.smoothed.height,
                &measurements,
                half_width,
            );
            let path = out_dir.join(format!("{prefix}mask.png"));
            if let Err(e) = write_gray_png(&mask, &path) {
                log::warn!("unable to save {}: {e}", path.display());
            }
        }

        let artifacts = ArtifactPaths::new(out_dir, &prefix);
        log::info!("saving contours image to {}", artifacts.contours.display());
        let contours = render_contours(&working.smoothed, &measurements, half_width)?;
        write_rgb_png(&contours, &artifacts.contours)?;
        write_info_csv(&InfoRecord::from_metadata(meta), &artifacts.info)?;

        let record = ResultsRecord::new(meta, &measurements);
        let results_written = match write_results_json(&record, &artifacts.results) {
            Ok(()) => true,
            Err(e) => {
                log::error!(
                    "unable to save results file {}: {e}",
                    artifacts.results.display()
                );
                false
            }
        };

        let uploaded = results_written
            && match self
                .uploader
                .upload(&self.config.upload_project, &artifacts.results)
            {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("upload to {} failed: {e}", self.config.upload_project);
                    false
                }
            };
        log::info!("results written with prefix {prefix}");

        Ok(AnalysisStatus::Success(Box::new(AnalysisReport {
            prefix,
            measurements,
            record,
            artifacts,
            detection,
            results_written,
            uploaded,
        })))
    }
}

impl Default for PhantomAnalyzer {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(AnalysisStatus::Failure { found: 4 }.code(), 1);
        assert!(!AnalysisStatus::Failure { found: 4 }.is_success());
        assert!(AnalysisStatus::Failure { found: 0 }.report().is_none());
    }

    #[test]
    fn missing_file_is_a_scan_error() {
        let err = PhantomAnalyzer::default()
            .analyze("/nonexistent/IM0001.dcm", false)
            .expect_err("missing");
        assert!(matches!(err, AnalyzeError::Scan(ScanError::Read { .. })));
    }
}
