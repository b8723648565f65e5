mod common;

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use approx::assert_abs_diff_eq;
use common::{all_slots, expected_value, phantom_pixels, write_scan, ScanFixture};
use phantom_qa::render::ResultsRecord;
use phantom_qa::{
    load_scan, AnalysisConfig, AnalysisStatus, PhantomAnalyzer, ResultUploader, TubeOrdering,
    UploadError,
};

const PREFIX: &str = "QA_T1MES_Wake_20170412_S14_";

#[derive(Clone, Default)]
struct RecordingUploader(Rc<RefCell<Vec<(String, PathBuf)>>>);

impl ResultUploader for RecordingUploader {
    fn upload(&self, project: &str, record: &Path) -> Result<(), UploadError> {
        self.0
            .borrow_mut()
            .push((project.to_string(), record.to_path_buf()));
        Ok(())
    }
}

fn scan_in(dir: &Path, fixture: &ScanFixture<'_>) -> PathBuf {
    let path = dir.join("IM0001.dcm");
    write_scan(&path, fixture);
    path
}

#[test]
fn synthetic_phantom_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = scan_in(dir.path(), &ScanFixture::default());
    let uploads = RecordingUploader::default();

    let analyzer = PhantomAnalyzer::default().with_uploader(uploads.clone());
    let status = analyzer.analyze(&path, false).expect("analyze");
    assert_eq!(status.code(), 0);
    let report = status.report().expect("report");
    assert_eq!(report.prefix, PREFIX);

    for m in &report.measurements {
        let expected = f64::from(expected_value(m.tube.index));
        assert_abs_diff_eq!(m.mean, expected, epsilon = 0.5);
        assert_eq!(m.formatted, format!("{expected:5.0}"));
    }

    for artifact in report.artifacts.all() {
        assert!(artifact.is_file(), "{} missing", artifact.display());
        assert!(artifact.starts_with(dir.path()));
    }
    assert!(report.results_written && report.uploaded);
    assert_eq!(
        uploads.0.borrow().as_slice(),
        &[("UPBEAT_QA".to_string(), report.artifacts.results.clone())]
    );

    let text = fs::read_to_string(&report.artifacts.results).expect("read");
    let record: ResultsRecord = serde_json::from_str(&text).expect("parse");
    for (i, v) in record.tubes().iter().enumerate() {
        assert_eq!(*v, format!("{:5.0}", expected_value(i + 1)));
    }
    assert_eq!(record.t1_serdescr, "Ser 14:MOCO_T1_MAP");
    assert_eq!(record.t1_site, "Wake Forest Baptist");

    let img = image::open(&report.artifacts.contours).expect("png").to_rgb8();
    assert_eq!(img.dimensions(), (256, 256));

    assert!(!dir.path().join(format!("{PREFIX}smoothed.png")).exists());
}

#[test]
fn row_bands_number_rows_first() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = scan_in(dir.path(), &ScanFixture::default());
    let config = AnalysisConfig {
        ordering: TubeOrdering::RowBands,
        ..AnalysisConfig::default()
    };
    let status = PhantomAnalyzer::new(config).analyze(&path, false).expect("analyze");
    let report = status.report().expect("report");
    let formatted: Vec<&str> = report.measurements.iter().map(|m| m.formatted.trim()).collect();
    assert_eq!(
        formatted,
        vec!["300", "400", "500", "600", "700", "800", "900", "1000", "1100"]
    );
}

#[test]
fn count_gate_fails_without_artifacts() {
    for slots in [Vec::new(), all_slots()[..5].to_vec()] {
        let dir = tempfile::tempdir().expect("tempdir");
        let fixture = ScanFixture {
            pixels: phantom_pixels(&slots),
            ..ScanFixture::default()
        };
        let path = scan_in(dir.path(), &fixture);

        let status = PhantomAnalyzer::default().analyze(&path, false).expect("analyze");
        assert_eq!(status.code(), 1);
        assert!(matches!(status, AnalysisStatus::Failure { found } if found != 9));

        let produced: Vec<_> = fs::read_dir(dir.path())
            .expect("list")
            .filter_map(Result::ok)
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("QA_T1MES_"))
            .collect();
        assert!(produced.is_empty(), "{produced:?}");
    }
}

#[test]
fn display_writes_diagnostics_even_on_failure() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fixture = ScanFixture {
        pixels: phantom_pixels(&all_slots()[..4]),
        ..ScanFixture::default()
    };
    let path = scan_in(dir.path(), &fixture);
    let status = PhantomAnalyzer::default().analyze(&path, true).expect("analyze");
    assert!(!status.is_success());
    assert!(dir.path().join(format!("{PREFIX}smoothed.png")).is_file());
    assert!(!dir.path().join(format!("{PREFIX}mask.png")).exists());

    let ok_dir = tempfile::tempdir().expect("tempdir");
    let ok_path = scan_in(ok_dir.path(), &ScanFixture::default());
    let status = PhantomAnalyzer::default().analyze(&ok_path, true).expect("analyze");
    assert!(status.is_success());
    assert!(ok_dir.path().join(format!("{PREFIX}smoothed.png")).is_file());
    assert!(ok_dir.path().join(format!("{PREFIX}mask.png")).is_file());
}

#[test]
fn rerunning_produces_identical_tables() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = scan_in(dir.path(), &ScanFixture::default());
    let analyzer = PhantomAnalyzer::default();

    let first = analyzer.analyze(&path, false).expect("analyze");
    let artifacts = first.report().expect("report").artifacts.clone();
    let info = fs::read(&artifacts.info).expect("info");
    let results = fs::read(&artifacts.results).expect("results");

    analyzer.analyze(&path, false).expect("analyze again");
    assert_eq!(fs::read(&artifacts.info).expect("info"), info);
    assert_eq!(fs::read(&artifacts.results).expect("results"), results);
}

#[test]
fn results_write_failure_skips_upload() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = scan_in(dir.path(), &ScanFixture::default());
    // A directory in place of the results file makes the write fail.
    fs::create_dir(dir.path().join(format!("{PREFIX}results.json"))).expect("mkdir");
    let uploads = RecordingUploader::default();

    let status = PhantomAnalyzer::default()
        .with_uploader(uploads.clone())
        .analyze(&path, false)
        .expect("analyze");
    let report = status.report().expect("report");
    assert!(!report.results_written);
    assert!(!report.uploaded);
    assert!(uploads.0.borrow().is_empty());
    assert!(report.artifacts.info.is_file());
}

#[test]
fn loaded_scan_matches_written_pixels() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = scan_in(dir.path(), &ScanFixture::default());
    let scan = load_scan(&path).expect("load");
    assert_eq!((scan.image.width, scan.image.height), (240, 240));
    assert_eq!(scan.metadata.pixel_spacing_mm, 0.5);
    assert_eq!(scan.metadata.series_number.as_deref(), Some("14"));
    assert_eq!(scan.metadata.instance_number, Some(1));
    assert_eq!(scan.image.get(120, 120), f32::from(common::tube_value(1, 1)));
    assert_eq!(scan.image.get(0, 0), 0.0);
}

#[cfg(feature = "tracing")]
#[test]
fn analysis_runs_under_a_tracing_subscriber() {
    phantom_qa::core::init_tracing(false, log::LevelFilter::Debug);
    let dir = tempfile::tempdir().expect("tempdir");
    let path = scan_in(dir.path(), &ScanFixture::default());
    let status = PhantomAnalyzer::default()
        .analyze(&path, true)
        .expect("analyze");
    assert_eq!(status.code(), 0);
}
