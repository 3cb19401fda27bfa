//! Named MCP configuration scenarios: registry, detection and switching.
//!
//! Detection runs inside every poll cycle; switching runs only on explicit
//! request and shares no lock with the poller.

mod detector;
mod registry;
mod switcher;

pub use detector::ScenarioDetector;
pub use registry::{lookup, scenarios, ScenarioDescriptor};
pub use switcher::{
    CommandOutput, CommandRunner, CommandSpec, CommandStatus, ProcessCommandRunner,
    ScenarioSwitcher, SwitchRecord,
};

#[cfg(test)]
pub(crate) use switcher::test_utils;

/// No active configuration file (or it couldn't be read).
pub const UNKNOWN_SCENARIO_ID: &str = "unknown";
/// An active configuration exists but matches no registered scenario.
pub const CUSTOM_SCENARIO_ID: &str = "custom";
