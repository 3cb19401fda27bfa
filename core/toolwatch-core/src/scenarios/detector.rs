//! Active-configuration → scenario id detection.
//!
//! Equality is structural (`serde_json::Value`): object key order is ignored,
//! array order is significant, and an absent field differs from an empty one.

use fs_err as fs;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::registry::scenarios;
use super::{CUSTOM_SCENARIO_ID, UNKNOWN_SCENARIO_ID};
use crate::config::PathsConfig;
use crate::error::{Result, ToolwatchError};

#[derive(Debug, Clone)]
pub struct ScenarioDetector {
    active_config: PathBuf,
    scenarios_dir: PathBuf,
}

impl ScenarioDetector {
    pub fn new(paths: &PathsConfig) -> Self {
        Self {
            active_config: paths.active_config.clone(),
            scenarios_dir: paths.scenarios_dir.clone(),
        }
    }

    pub fn reference_path(&self, scenario_id: &str) -> PathBuf {
        self.scenarios_dir.join(format!("{}.json", scenario_id))
    }

    /// Returns the id of the first registered scenario whose reference file
    /// equals the active configuration, `custom` if none does, or `unknown`
    /// if the active configuration is missing or unreadable.
    pub fn detect(&self) -> String {
        let active = match read_json(&self.active_config) {
            Ok(value) => value,
            Err(ToolwatchError::ConfigMissing(_)) => return UNKNOWN_SCENARIO_ID.to_string(),
            Err(err) => {
                tracing::warn!(error = %err, "Active configuration unreadable");
                return UNKNOWN_SCENARIO_ID.to_string();
            }
        };

        for scenario in scenarios() {
            let path = self.reference_path(&scenario.id);
            match read_json(&path) {
                Ok(reference) if reference == active => return scenario.id.clone(),
                Ok(_) | Err(ToolwatchError::ConfigMissing(_)) => {}
                Err(err) => {
                    tracing::warn!(
                        scenario = %scenario.id,
                        error = %err,
                        "Skipping unreadable scenario reference"
                    );
                }
            }
        }

        CUSTOM_SCENARIO_ID.to_string()
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ToolwatchError::ConfigMissing(path.to_path_buf()))
        }
        Err(source) => {
            return Err(ToolwatchError::Io {
                context: format!("reading {}", path.display()),
                source,
            })
        }
    };

    serde_json::from_str(&content).map_err(|err| ToolwatchError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}
