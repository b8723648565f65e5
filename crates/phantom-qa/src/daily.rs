//! Unattended daily run over an `incoming` volume.
//!
//! Studies arrive as `PATIENT/DATE/SERIES` folders. QA scans are recognised
//! by patient id, the T1 map series is picked per vendor, analyzed, logged
//! and, when the run ends well, moved to `completed`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::pipeline::PhantomAnalyzer;
use crate::scan::{read_metadata, ScanMetadata};

const ARTIFACT_SUFFIXES: [&str; 3] = ["contours.png", "info.csv", "results.json"];

#[derive(thiserror::Error, Debug)]
pub enum DailyRunError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_at(path: &Path) -> impl FnOnce(std::io::Error) -> DailyRunError + '_ {
    move |source| DailyRunError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn default_markers() -> Vec<String> {
    vec!["152E".to_string(), "302E".to_string()]
}

/// Layout of the QA volume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyRunConfig {
    pub volume: PathBuf,
    /// A scan is a QA scan when its patient id contains one of these.
    #[serde(default = "default_markers")]
    pub qa_patient_markers: Vec<String>,
}

impl DailyRunConfig {
    pub fn new(volume: impl Into<PathBuf>) -> Self {
        Self {
            volume: volume.into(),
            qa_patient_markers: default_markers(),
        }
    }

    pub fn incoming_dir(&self) -> PathBuf {
        self.volume.join("incoming")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.volume.join("results")
    }

    pub fn completed_dir(&self) -> PathBuf {
        self.volume.join("completed")
    }

    pub fn log_path(&self) -> PathBuf {
        self.volume.join("QA.log")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vendor {
    Siemens,
    Philips,
    Ge,
    Other,
}

impl Vendor {
    pub fn from_manufacturer(manufacturer: &str) -> Self {
        let m = manufacturer.to_lowercase();
        if m.starts_with("si") {
            Vendor::Siemens
        } else if m.starts_with("ph") {
            Vendor::Philips
        } else if m.starts_with("ge") {
            Vendor::Ge
        } else {
            Vendor::Other
        }
    }
}

/// What to do with one file found during the walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeriesDecision {
    Analyze,
    Skip,
    /// A QA series that is not the T1 map; the rest of the directory holds
    /// the same series and is not inspected.
    StopDirectory,
}

pub fn classify_series(meta: &ScanMetadata, markers: &[String]) -> SeriesDecision {
    if !markers.iter().any(|m| meta.patient_id.contains(m.as_str())) {
        return SeriesDecision::Skip;
    }
    let label = meta.series_label();
    let is_map = match Vendor::from_manufacturer(&meta.manufacturer) {
        Vendor::Siemens => label.contains("MOCO_T1"),
        Vendor::Philips => {
            if !label.contains("MID_SAX_T1_Map") {
                false
            } else if meta.instance_number == Some(11) {
                true
            } else {
                return SeriesDecision::Skip;
            }
        }
        Vendor::Ge => label.contains("GET1"),
        Vendor::Other => return SeriesDecision::Skip,
    };
    if is_map {
        SeriesDecision::Analyze
    } else {
        SeriesDecision::StopDirectory
    }
}

/// One `QA.log` line, newline included.
pub fn log_line(meta: &ScanMetadata, success: bool) -> String {
    format!(
        "{:>8}  {:>4} {:>4}       {}\n",
        meta.study_date,
        meta.site(),
        meta.series_number.as_deref().unwrap_or(""),
        if success { "Success" } else { "Fail" }
    )
}

pub fn notification_subject(success: bool) -> &'static str {
    if success {
        "T1MES Phantom QA analysis complete: Success."
    } else {
        "T1MES Phantom QA analysis complete: Failure."
    }
}

/// Told about every analysis the daily run performs.
pub trait Notifier {
    fn notify(&self, study_dir: &Path, success: bool);
}

/// Notifier that writes the message to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, study_dir: &Path, success: bool) {
        log::info!(
            "{} It was analyzed in {}",
            notification_subject(success),
            study_dir.display()
        );
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalyzedSeries {
    pub path: PathBuf,
    pub success: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DailyRunSummary {
    pub analyzed: Vec<AnalyzedSeries>,
    /// Study directories moved to `completed`, at their new location.
    pub moved: Vec<PathBuf>,
}

fn sorted_entries(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), DailyRunError> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_at(dir))? {
        let path = entry.map_err(io_at(dir))?.path();
        if path.is_dir() {
            dirs.push(path);
        } else {
            files.push(path);
        }
    }
    dirs.sort();
    files.sort();
    Ok((dirs, files))
}

fn is_dicom_name(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
}

fn copy_artifacts(from: &Path, to: &Path) -> Result<(), DailyRunError> {
    fs::create_dir_all(to).map_err(io_at(to))?;
    let (_, files) = sorted_entries(from)?;
    for file in files {
        let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if ARTIFACT_SUFFIXES.iter().any(|s| name.ends_with(s)) {
            let dest = to.join(name);
            log::info!("copying {} to {}", file.display(), to.display());
            fs::copy(&file, &dest).map_err(io_at(&dest))?;
        }
    }
    Ok(())
}

/// Sequential daily run over one volume.
pub struct DailyRun {
    config: DailyRunConfig,
    analyzer: PhantomAnalyzer,
    notifier: Box<dyn Notifier>,
}

impl DailyRun {
    pub fn new(config: DailyRunConfig, analyzer: PhantomAnalyzer) -> Self {
        Self {
            config,
            analyzer,
            notifier: Box::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn config(&self) -> &DailyRunConfig {
        &self.config
    }

    /// Walk `incoming`, analyze every selected map, then move the studies
    /// to `completed` unless the last directory visited had a failed
    /// analysis.
    pub fn run(&self) -> Result<DailyRunSummary, DailyRunError> {
        let incoming = self.config.incoming_dir();
        log::info!("checking in {}", incoming.display());
        let (studies, _) = sorted_entries(&incoming)?;

        let mut summary = DailyRunSummary::default();
        let mut last_ok = true;
        self.visit(&incoming, &mut summary, &mut last_ok)?;

        if last_ok {
            let completed = self.config.completed_dir();
            fs::create_dir_all(&completed).map_err(io_at(&completed))?;
            for study in studies {
                let Some(name) = study.file_name() else {
                    continue;
                };
                let dest = completed.join(name);
                fs::rename(&study, &dest).map_err(io_at(&study))?;
                log::info!("moved completed study to {}", dest.display());
                summary.moved.push(dest);
            }
        }
        Ok(summary)
    }

    fn visit(
        &self,
        dir: &Path,
        summary: &mut DailyRunSummary,
        last_ok: &mut bool,
    ) -> Result<(), DailyRunError> {
        let (subdirs, files) = sorted_entries(dir)?;
        *last_ok = true;

        for file in files.iter().filter(|f| is_dicom_name(f)) {
            log::debug!("checking {}", file.display());
            let meta = match read_metadata(file) {
                Ok(meta) => meta,
                Err(e) => {
                    log::warn!("skipping {}: {e}", file.display());
                    continue;
                }
            };
            match classify_series(&meta, &self.config.qa_patient_markers) {
                SeriesDecision::Skip => continue,
                SeriesDecision::StopDirectory => {
                    log::debug!("{} is not a T1 map", meta.series_label());
                    break;
                }
                SeriesDecision::Analyze => {}
            }

            log::info!("found map: {}", file.display());
            let success = match self.analyzer.analyze(file, false) {
                Ok(status) => status.is_success(),
                Err(e) => {
                    log::error!("analysis of {} failed: {e}", file.display());
                    false
                }
            };
            self.notifier.notify(dir, success);
            self.append_log(&meta, success)?;
            if success {
                copy_artifacts(dir, &self.config.results_dir())?;
            }
            summary.analyzed.push(AnalyzedSeries {
                path: file.clone(),
                success,
            });
            *last_ok = success;
        }

        for sub in subdirs {
            self.visit(&sub, summary, last_ok)?;
        }
        Ok(())
    }

    fn append_log(&self, meta: &ScanMetadata, success: bool) -> Result<(), DailyRunError> {
        let path = self.config.log_path();
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_at(&path))?;
        f.write_all(log_line(meta, success).as_bytes())
            .map_err(io_at(&path))
    }
}
