//! Tools declared in the active MCP configuration file.
//!
//! Independent of running-process data: each configured server is classified
//! from its `command` and `args` with the same rule table as live processes.
//!
//! # File Format
//!
//! ```json
//! {
//!   "toolServers": {
//!     "github": { "command": "npx", "args": ["-y", "mcp-server-github"] }
//!   }
//! }
//! ```
//!
//! `mcpServers` is accepted as an alias for `toolServers`.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use crate::classify::{classify, UNKNOWN_TOOL_ID};
use crate::error::{Result, ToolwatchError};
use crate::taxonomy::{self, ToolFunction, ToolPlatform};

const CUSTOM_CATEGORY: &str = "Custom";
const CUSTOM_DESCRIPTION: &str = "Configured tool server";

#[derive(Debug, Deserialize)]
struct ActiveConfigFile {
    #[serde(default, rename = "toolServers", alias = "mcpServers")]
    tool_servers: BTreeMap<String, ServerEntry>,
}

#[derive(Debug, Deserialize)]
struct ServerEntry {
    #[serde(default)]
    command: String,
    #[serde(default, alias = "arguments")]
    args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfiguredTool {
    pub server_name: String,
    pub tool_id: String,
    pub display_name: String,
    pub category: String,
    pub description: String,
    pub command: String,
    pub args: Vec<String>,
    pub functions: Vec<ToolFunction>,
    pub total_function_count: usize,
    pub platforms: Vec<ToolPlatform>,
}

impl ConfiguredTool {
    fn from_entry(server_name: String, entry: ServerEntry) -> Self {
        let command_line = format!("{} {}", entry.command, entry.args.join(" "));
        let tool_id = classify(&command_line);

        match taxonomy::lookup(tool_id) {
            Some(descriptor) => Self {
                display_name: descriptor.display_name.clone(),
                category: descriptor.category.clone(),
                description: descriptor.description.clone(),
                functions: descriptor.functions.clone(),
                total_function_count: descriptor.total_function_count,
                platforms: descriptor.platforms.clone(),
                tool_id: tool_id.to_string(),
                server_name,
                command: entry.command,
                args: entry.args,
            },
            None => Self {
                display_name: title_case(&server_name),
                category: CUSTOM_CATEGORY.to_string(),
                description: CUSTOM_DESCRIPTION.to_string(),
                functions: Vec::new(),
                total_function_count: 0,
                platforms: Vec::new(),
                tool_id: UNKNOWN_TOOL_ID.to_string(),
                server_name,
                command: entry.command,
                args: entry.args,
            },
        }
    }
}

/// Reads the configured tools, ordered by server name.
///
/// Fails with [`ToolwatchError::ConfigMissing`] when the file doesn't exist.
pub fn load_configured_tools(path: &Path) -> Result<Vec<ConfiguredTool>> {
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

    let file: ActiveConfigFile =
        serde_json::from_str(&content).map_err(|err| ToolwatchError::ConfigMalformed {
            path: path.to_path_buf(),
            details: err.to_string(),
        })?;

    Ok(file
        .tool_servers
        .into_iter()
        .map(|(name, entry)| ConfiguredTool::from_entry(name, entry))
        .collect())
}

/// Like [`load_configured_tools`], but a missing or broken file yields an
/// empty list.
pub fn configured_tools(path: &Path) -> Vec<ConfiguredTool> {
    match load_configured_tools(path) {
        Ok(tools) => tools,
        Err(ToolwatchError::ConfigMissing(_)) => Vec::new(),
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read configured tools");
            Vec::new()
        }
    }
}

/// Upper-cases the first letter of every alphabetic run, lower-cases the rest.
fn title_case(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut previous_alphabetic = false;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            if previous_alphabetic {
                result.extend(ch.to_lowercase());
            } else {
                result.extend(ch.to_uppercase());
            }
            previous_alphabetic = true;
        } else {
            result.push(ch);
            previous_alphabetic = false;
        }
    }
    result
}
