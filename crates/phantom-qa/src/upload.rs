//! Hand-off of the results record to an external data-capture system.

use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("upload rejected by {project}: {reason}")]
    Rejected { project: String, reason: String },
}

/// Receives `results.json` after a successful analysis.
///
/// The pipeline logs the outcome and never fails because of it.
pub trait ResultUploader {
    fn upload(&self, project: &str, record: &Path) -> Result<(), UploadError>;
}

/// Uploader that only records the hand-off in the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingUploader;

impl ResultUploader for LoggingUploader {
    fn upload(&self, project: &str, record: &Path) -> Result<(), UploadError> {
        if !record.is_file() {
            return Err(UploadError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", record.display()),
            )));
        }
        log::info!(
            "results record {} ready for project {project}",
            record.display()
        );
        Ok(())
    }
}
