//! Configuration loading and well-known paths.
//!
//! Handles paths and settings for:
//! - the active MCP configuration and per-scenario reference files
//! - poller cadence and backoff
//! - sampler marker substrings
//! - the external scenario switch command
//!
//! Settings come from an optional TOML file (`~/.toolwatch/config.toml`, or
//! the path in `TOOLWATCH_CONFIG`). Every section and field has a default, so
//! a missing file and a partial file are both valid.

use fs_err as fs;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ToolwatchError};

pub const CONFIG_ENV: &str = "TOOLWATCH_CONFIG";

const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
const DEFAULT_BACKOFF_MS: u64 = 10_000;
const DEFAULT_SWITCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MARKERS: [&str; 3] = ["mcp", "playwright", "github"];

/// Returns the user's home directory, falling back to the working directory.
fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the path to the toolwatch state directory (~/.toolwatch).
pub fn get_toolwatch_dir() -> PathBuf {
    home_dir().join(".toolwatch")
}

/// Returns the path of the engine config file, honoring `TOOLWATCH_CONFIG`.
pub fn get_config_path() -> PathBuf {
    match env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => get_toolwatch_dir().join("config.toml"),
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub paths: PathsConfig,
    pub poller: PollerConfig,
    pub sampler: SamplerConfig,
    pub switcher: SwitcherConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// The configuration file the MCP client actually loads.
    pub active_config: PathBuf,
    /// Directory holding one `<scenario-id>.json` reference file per scenario.
    pub scenarios_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let cursor_dir = home_dir().join(".cursor");
        Self {
            active_config: cursor_dir.join("mcp.json"),
            scenarios_dir: cursor_dir.join("mcp-configs"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    pub interval_ms: u64,
    pub backoff_ms: u64,
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            backoff_ms: DEFAULT_BACKOFF_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Case-insensitive substrings; a process is sampled if its command line
    /// contains any of them.
    pub markers: Vec<String>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            markers: DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SwitcherConfig {
    pub program: String,
    /// Leading arguments; the scenario id is appended as the last argument.
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl SwitcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SwitcherConfig {
    fn default() -> Self {
        let script = get_toolwatch_dir().join("mcp-switcher.sh");
        Self {
            program: "bash".to_string(),
            args: vec![script.to_string_lossy().to_string()],
            working_dir: None,
            timeout_secs: DEFAULT_SWITCH_TIMEOUT_SECS,
        }
    }
}

impl EngineConfig {
    /// Loads the engine config, returning defaults if the file doesn't exist
    /// or can't be parsed.
    pub fn load() -> Self {
        let path = get_config_path();
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load engine config; using defaults");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ToolwatchError::Io {
            context: format!("reading {}", path.display()),
            source,
        })?;
        toml::from_str::<EngineConfig>(&content).map_err(|err| ToolwatchError::Config {
            path: path.to_path_buf(),
            details: err.to_string(),
        })
    }
}
