//! JSON configuration for the analysis pipeline.

use std::{fs, path::Path};

use phantom_qa_core::PhantomAssumptions;
use phantom_qa_tubes::{CircleDetectorParams, TubeOrdering};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn default_upload_project() -> String {
    "UPBEAT_QA".to_string()
}

/// Everything that tunes a single-scan analysis.
///
/// Every field is optional in JSON; missing fields take the T1MES defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub phantom: PhantomAssumptions,
    #[serde(default)]
    pub detector: CircleDetectorParams,
    #[serde(default)]
    pub ordering: TubeOrdering,
    /// Project the results record is uploaded to.
    #[serde(default = "default_upload_project")]
    pub upload_project: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            phantom: PhantomAssumptions::default(),
            detector: CircleDetectorParams::default(),
            ordering: TubeOrdering::default(),
            upload_project: default_upload_project(),
        }
    }
}

impl AnalysisConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
