//! # toolwatch-core
//!
//! Engine for observing MCP tool server processes and the scenario
//! configuration that launched them.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. The poller owns one thread.
//! - **Single writer**: Only the poller publishes snapshots; readers get `Arc`s.
//! - **Graceful degradation**: Missing or corrupt files degrade to `unknown`,
//!   `custom` or empty views instead of errors.
//! - **Data-driven matching**: Classification is an ordered rule table.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use toolwatch_core::{EngineConfig, ToolwatchEngine};
//!
//! let engine = ToolwatchEngine::start(EngineConfig::load())?;
//! let running = engine.running_tools();
//! let scenario = engine.current_scenario();
//! engine.shutdown();
//! ```

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod configured;
pub mod engine;
pub mod error;
pub mod poller;
pub mod process;
pub mod sampler;
pub mod scenarios;
pub mod snapshot;
pub mod taxonomy;
pub mod types;

pub use aggregate::{aggregate, AggregateReport, ToolAggregate};
pub use classify::{classify, ClassificationRule, UNKNOWN_TOOL_ID};
pub use config::EngineConfig;
pub use configured::{configured_tools, ConfiguredTool};
pub use engine::ToolwatchEngine;
pub use error::{Result, ToolwatchError};
pub use poller::{Poller, PollerHandle, PollerPhase};
pub use sampler::{ProcessRecord, ProcessSource, SysinfoProcessSource};
pub use scenarios::{
    ScenarioDescriptor, ScenarioDetector, ScenarioSwitcher, SwitchRecord, CUSTOM_SCENARIO_ID,
    UNKNOWN_SCENARIO_ID,
};
pub use snapshot::{SnapshotStore, SystemSnapshot};
pub use taxonomy::{ToolDescriptor, ToolFunction, ToolPlatform};
pub use types::*;
