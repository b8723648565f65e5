mod common;

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use common::{all_slots, phantom_pixels, write_scan, ScanFixture};
use phantom_qa::{DailyRun, DailyRunConfig, Notifier, PhantomAnalyzer};

#[derive(Clone, Default)]
struct RecordingNotifier(Rc<RefCell<Vec<(PathBuf, bool)>>>);

impl Notifier for RecordingNotifier {
    fn notify(&self, study_dir: &Path, success: bool) {
        self.0.borrow_mut().push((study_dir.to_path_buf(), success));
    }
}

fn series_dir(volume: &Path, patient: &str, series: &str) -> PathBuf {
    let dir = volume.join("incoming").join(patient).join("20170412").join(series);
    fs::create_dir_all(&dir).expect("mkdir");
    dir
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("list")
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn successful_map_is_logged_copied_and_moved() {
    let volume = tempfile::tempdir().expect("tempdir");
    let map_dir = series_dir(volume.path(), "QA152E", "S14");
    write_scan(&map_dir.join("IM0001.dcm"), &ScanFixture::default());
    let other = series_dir(volume.path(), "QA152E", "S02");
    fs::write(other.join("notes.txt"), "not dicom").expect("write");

    let notes = RecordingNotifier::default();
    let cfg = DailyRunConfig::new(volume.path());
    let summary = DailyRun::new(cfg.clone(), PhantomAnalyzer::default())
        .with_notifier(notes.clone())
        .run()
        .expect("run");

    assert_eq!(summary.analyzed.len(), 1);
    assert!(summary.analyzed[0].success);
    assert_eq!(notes.0.borrow().as_slice(), &[(map_dir.clone(), true)]);

    let log = fs::read_to_string(cfg.log_path()).expect("log");
    assert_eq!(log, "20170412  Wake   14       Success\n");

    assert_eq!(
        file_names(&cfg.results_dir()),
        vec![
            "QA_T1MES_Wake_20170412_S14_contours.png",
            "QA_T1MES_Wake_20170412_S14_info.csv",
            "QA_T1MES_Wake_20170412_S14_results.json",
        ]
    );

    assert_eq!(summary.moved, vec![cfg.completed_dir().join("QA152E")]);
    assert!(!volume.path().join("incoming/QA152E").exists());
    assert!(cfg
        .completed_dir()
        .join("QA152E/20170412/S14/IM0001.dcm")
        .is_file());
}

#[test]
fn failed_map_keeps_study_in_incoming() {
    let volume = tempfile::tempdir().expect("tempdir");
    let map_dir = series_dir(volume.path(), "QA302E", "S9");
    let fixture = ScanFixture {
        patient_id: "QA302E",
        series_number: "9",
        pixels: phantom_pixels(&all_slots()[..4]),
        ..ScanFixture::default()
    };
    write_scan(&map_dir.join("IM0001.dcm"), &fixture);

    let cfg = DailyRunConfig::new(volume.path());
    let summary = DailyRun::new(cfg.clone(), PhantomAnalyzer::default())
        .run()
        .expect("run");

    assert_eq!(summary.analyzed.len(), 1);
    assert!(!summary.analyzed[0].success);
    assert!(summary.moved.is_empty());
    assert!(map_dir.join("IM0001.dcm").is_file());
    let log = fs::read_to_string(cfg.log_path()).expect("log");
    assert_eq!(log, "20170412  Wake    9       Fail\n");
    assert!(!cfg.results_dir().exists());
}

#[test]
fn non_map_series_stops_its_directory() {
    let volume = tempfile::tempdir().expect("tempdir");
    let dir = series_dir(volume.path(), "QA152E", "S3");
    let localizer = ScanFixture {
        series_number: "3",
        series_description: "localizer",
        ..ScanFixture::default()
    };
    write_scan(&dir.join("IM0001.dcm"), &localizer);
    // Never reached: the localizer ends the scan of this directory.
    write_scan(&dir.join("IM0002.dcm"), &ScanFixture::default());

    let cfg = DailyRunConfig::new(volume.path());
    let summary = DailyRun::new(cfg.clone(), PhantomAnalyzer::default())
        .run()
        .expect("run");
    assert!(summary.analyzed.is_empty());
    assert!(!cfg.log_path().exists());
    assert_eq!(summary.moved, vec![cfg.completed_dir().join("QA152E")]);
}

#[test]
fn non_qa_patients_are_ignored() {
    let volume = tempfile::tempdir().expect("tempdir");
    let dir = series_dir(volume.path(), "SUBJ001", "S14");
    let fixture = ScanFixture {
        patient_id: "SUBJ001",
        ..ScanFixture::default()
    };
    write_scan(&dir.join("IM0001.DCM"), &fixture);

    let cfg = DailyRunConfig::new(volume.path());
    let summary = DailyRun::new(cfg.clone(), PhantomAnalyzer::default())
        .run()
        .expect("run");
    assert!(summary.analyzed.is_empty());
    assert!(!dir.join("QA_T1MES_Wake_20170412_S14_results.json").exists());
}
