//! Quality assurance for nine-tube relaxometry phantoms.
//!
//! This crate provides:
//! - DICOM loading of a single phantom slice and its reporting attributes
//! - the end-to-end analysis ([`PhantomAnalyzer`]) from file to nine
//!   ordered tube means, with `contours.png`, `info.csv` and `results.json`
//! - the unattended daily run over an `incoming` volume ([`DailyRun`])
//! - the `phantom-qa` command line tool (feature `cli`)
//!
//! ## Quickstart
//!
//! ```no_run
//! use phantom_qa::{AnalysisConfig, PhantomAnalyzer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let analyzer = PhantomAnalyzer::new(AnalysisConfig::default());
//! let status = analyzer.analyze("study/IM0001.dcm", false)?;
//! if let Some(report) = status.report() {
//!     for m in &report.measurements {
//!         println!("tube {}: {}", m.tube.index, m.formatted);
//!     }
//! }
//! std::process::exit(status.code());
//! # }
//! ```
//!
//! ## API map
//! - `phantom_qa::core`: image containers, phantom geometry, normalization.
//! - `phantom_qa::tubes`: Hough detection, ordering and region statistics.
//! - [`scan`], [`render`], [`pipeline`], [`daily`]: the I/O around them.

pub use phantom_qa_core as core;
pub use phantom_qa_tubes as tubes;

pub mod config;
pub mod daily;
pub mod pipeline;
pub mod render;
pub mod scan;
pub mod upload;

pub use config::{AnalysisConfig, ConfigError};
pub use daily::{DailyRun, DailyRunConfig, DailyRunError, DailyRunSummary, LogNotifier, Notifier};
pub use phantom_qa_core::PhantomAssumptions;
pub use phantom_qa_tubes::{CircleDetectorParams, TubeOrdering};
pub use pipeline::{AnalysisReport, AnalysisStatus, AnalyzeError, PhantomAnalyzer};
pub use scan::{load_scan, read_metadata, Scan, ScanError, ScanMetadata, Site};
pub use upload::{LoggingUploader, ResultUploader, UploadError};
