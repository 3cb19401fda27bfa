//! toolctl: command-line client for the toolwatch daemon.
//!
//! Every subcommand maps to one daemon method and prints the response data as
//! pretty JSON. An error response exits 1.

mod daemon_client;

use clap::{Parser, Subcommand};
use serde_json::json;
use std::time::Duration;
use toolwatch_daemon_protocol::Method;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "toolctl")]
#[command(about = "Inspect and control MCP tool servers via the toolwatch daemon")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daemon and poller health
    Health,

    /// Running tool servers grouped by tool
    Running,

    /// Tool servers declared in the active configuration
    Configured,

    /// Counts, memory and health summary
    Overview,

    /// Registered scenarios in detection order
    Scenarios,

    /// The currently active scenario
    Current,

    /// Switch the active configuration to a registered scenario
    Switch {
        #[arg(value_name = "SCENARIO")]
        scenario: String,

        /// Seconds to wait for the daemon's reply; keep above the daemon's
        /// switcher timeout
        #[arg(long, value_name = "SECS", default_value_t = daemon_client::DEFAULT_SWITCH_TIMEOUT_SECS)]
        timeout: u64,
    },

    /// Send SIGTERM to a process
    Kill {
        #[arg(value_name = "PID")]
        pid: u32,
    },
}

impl Commands {
    fn read_timeout(&self) -> Option<Duration> {
        match self {
            Commands::Switch { timeout, .. } => Some(Duration::from_secs(*timeout)),
            _ => None,
        }
    }

    fn into_call(self) -> (Method, Option<serde_json::Value>) {
        match self {
            Commands::Health => (Method::GetHealth, None),
            Commands::Running => (Method::GetRunningTools, None),
            Commands::Configured => (Method::GetConfiguredTools, None),
            Commands::Overview => (Method::GetOverview, None),
            Commands::Scenarios => (Method::GetScenarios, None),
            Commands::Current => (Method::GetCurrentScenario, None),
            Commands::Switch { scenario, .. } => {
                (Method::SwitchScenario, Some(json!({ "scenario": scenario })))
            }
            Commands::Kill { pid } => (Method::KillProcess, Some(json!({ "pid": pid }))),
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let read_timeout = cli.command.read_timeout();
    let (method, params) = cli.command.into_call();

    match daemon_client::call(method, params, read_timeout) {
        Ok(data) => match serde_json::to_string_pretty(&data) {
            Ok(text) => println!("{}", text),
            Err(err) => {
                tracing::error!(error = %err, "Failed to format response");
                std::process::exit(1);
            }
        },
        Err(err) => {
            tracing::debug!(method = ?method, "Request failed");
            eprintln!("toolctl: {}", err);
            std::process::exit(1);
        }
    }
}
