//! ToolwatchEngine - the entry point for daemon and embedding clients.
//!
//! The engine owns the snapshot store, the background poller and the
//! scenario switcher. It is:
//! - **Synchronous**: No async runtime required
//! - **Thread-safe**: `&self` methods may be called from any thread
//! - **Snapshot-consistent**: Each read view is built from one snapshot
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use toolwatch_core::{EngineConfig, ToolwatchEngine};
//!
//! let engine = ToolwatchEngine::start(EngineConfig::load())?;
//! let overview = engine.overview();
//! engine.switch_scenario("minimal")?;
//! engine.shutdown();
//! ```

use chrono::Utc;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::{Result, ToolwatchError};
use crate::poller::{Poller, PollerHandle};
use crate::process;
use crate::sampler::{ProcessSource, SysinfoProcessSource};
use crate::scenarios::{
    self, CommandRunner, ProcessCommandRunner, ScenarioDescriptor, ScenarioSwitcher, SwitchRecord,
};
use crate::snapshot::{SnapshotStore, SystemSnapshot};
use crate::types::{
    ConfiguredToolsView, CurrentScenario, HealthReport, Overview, RunningToolsView,
};

pub struct ToolwatchEngine {
    store: Arc<SnapshotStore>,
    switcher: ScenarioSwitcher,
    poller: PollerHandle,
}

impl ToolwatchEngine {
    /// Starts an engine against the live process table and the configured
    /// switch command.
    pub fn start(config: EngineConfig) -> Result<Self> {
        Self::with_parts(
            config,
            Box::new(SysinfoProcessSource::new()),
            Arc::new(ProcessCommandRunner),
        )
    }

    /// Starts an engine with explicit process and command backends.
    ///
    /// Used by tests to substitute fake process tables and switch commands.
    pub fn with_parts(
        config: EngineConfig,
        source: Box<dyn ProcessSource>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        let store = Arc::new(SnapshotStore::new());
        let poller = Poller::new(source, &config, Arc::clone(&store))
            .spawn()
            .map_err(|source| ToolwatchError::Io {
                context: "spawning poller thread".to_string(),
                source,
            })?;
        let switcher = ScenarioSwitcher::new(runner, config.switcher.clone());

        tracing::info!(
            active_config = %config.paths.active_config.display(),
            scenarios_dir = %config.paths.scenarios_dir.display(),
            "Engine started"
        );

        Ok(Self {
            store,
            switcher,
            poller,
        })
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<SystemSnapshot> {
        self.store.current()
    }

    pub fn running_tools(&self) -> RunningToolsView {
        RunningToolsView::from_snapshot(&self.store.current(), Utc::now())
    }

    pub fn configured_tools(&self) -> ConfiguredToolsView {
        ConfiguredToolsView::from_snapshot(&self.store.current())
    }

    pub fn overview(&self) -> Overview {
        Overview::from_snapshot(&self.store.current())
    }

    pub fn health(&self) -> HealthReport {
        HealthReport::from_snapshot(&self.store.current(), Some(self.poller.phase()))
    }

    pub fn scenarios(&self) -> Vec<ScenarioDescriptor> {
        scenarios::scenarios().to_vec()
    }

    /// The scenario the user most plausibly has active.
    ///
    /// A successful switch newer than the last capture wins over detection,
    /// which only catches up on the next cycle.
    pub fn current_scenario(&self) -> CurrentScenario {
        let snapshot = self.store.current();
        let last_switch = self.switcher.last_switch();

        let scenario_id = match &last_switch {
            Some(record)
                if snapshot
                    .captured_at
                    .map_or(true, |captured| record.switched_at > captured) =>
            {
                record.scenario_id.clone()
            }
            _ => snapshot.active_scenario_id.clone(),
        };

        CurrentScenario::new(scenario_id, last_switch.map(|record| record.switched_at))
    }

    /// Runs the switch command; on success asks the poller for a fresh cycle.
    pub fn switch_scenario(&self, scenario_id: &str) -> Result<SwitchRecord> {
        let record = self.switcher.switch_to(scenario_id)?;
        self.poller.nudge();
        Ok(record)
    }

    pub fn kill_process(&self, pid: u32) -> Result<()> {
        process::kill_process(pid)?;
        self.poller.nudge();
        Ok(())
    }

    /// Stops the poller after its in-flight cycle. Idempotent.
    pub fn shutdown(&self) {
        self.poller.shutdown();
    }
}

impl Drop for ToolwatchEngine {
    fn drop(&mut self) {
        self.poller.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PathsConfig, PollerConfig};
    use crate::sampler::test_utils::{record, FixedProcessSource};
    use crate::scenarios::test_utils::ScriptedRunner;
    use crate::scenarios::CommandStatus;
    use crate::sampler::ProcessRecord;
    use std::fs;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::thread;
    use std::time::{Duration, Instant};

    const MINIMAL: &str = r#"{"toolServers":{"fs":{"command":"mcp-server-filesystem"}}}"#;

    /// Process source that parks every read until the test releases it.
    struct GatedSource {
        entered: Sender<()>,
        release: Receiver<()>,
    }

    impl GatedSource {
        fn new() -> (Self, Receiver<()>, Sender<()>) {
            let (entered_tx, entered_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            let source = Self {
                entered: entered_tx,
                release: release_rx,
            };
            (source, entered_rx, release_tx)
        }
    }

    impl ProcessSource for GatedSource {
        fn read_table(&mut self) -> Vec<ProcessRecord> {
            let _ = self.entered.send(());
            // A dropped sender releases every later read.
            let _ = self.release.recv();
            Vec::new()
        }
    }

    fn config_in(dir: &tempfile::TempDir) -> EngineConfig {
        EngineConfig {
            paths: PathsConfig {
                active_config: dir.path().join("mcp.json"),
                scenarios_dir: dir.path().join("mcp-configs"),
            },
            poller: PollerConfig {
                interval_ms: 60_000,
                backoff_ms: 60_000,
            },
            ..EngineConfig::default()
        }
    }

    fn wait_for_generation(engine: &ToolwatchEngine, generation: u64) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while engine.snapshot().generation < generation {
            assert!(Instant::now() < deadline, "poller never published");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn successful_switch_overrides_detection_until_next_capture() {
        let dir = tempfile::tempdir().expect("temp dir");
        let runner = Arc::new(ScriptedRunner::new(CommandStatus::Exited(0), "ok", ""));
        let (source, entered, release) = GatedSource::new();
        let engine =
            ToolwatchEngine::with_parts(config_in(&dir), Box::new(source), runner.clone())
                .expect("engine");
        let step = Duration::from_secs(3);

        entered.recv_timeout(step).expect("first cycle");
        release.send(()).expect("release first cycle");
        wait_for_generation(&engine, 1);
        assert_eq!(engine.current_scenario().scenario_id, "unknown");

        let record = engine.switch_scenario("web").expect("switch");
        // The nudged cycle has started but not published.
        entered.recv_timeout(step).expect("nudged cycle");
        let current = engine.current_scenario();
        assert_eq!(current.scenario_id, "web");
        assert_eq!(current.expected_tool_count, 44);
        assert_eq!(current.last_switch_timestamp, Some(record.switched_at));
        assert_eq!(runner.calls(), 1);

        // The nudged capture started after the switch; detection wins again.
        release.send(()).expect("release nudged cycle");
        wait_for_generation(&engine, 2);
        assert_eq!(engine.current_scenario().scenario_id, "unknown");

        drop(release);
        engine.shutdown();
    }

    #[test]
    fn switch_during_cycle_is_not_hidden_by_that_cycles_detection() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut config = config_in(&dir);
        config.poller.interval_ms = 50;
        fs::create_dir_all(&config.paths.scenarios_dir).expect("scenarios dir");
        fs::write(&config.paths.active_config, MINIMAL).expect("active config");
        fs::write(config.paths.scenarios_dir.join("minimal.json"), MINIMAL).expect("reference");

        let (source, entered, release) = GatedSource::new();
        let engine = ToolwatchEngine::with_parts(
            config,
            Box::new(source),
            Arc::new(ScriptedRunner::new(CommandStatus::Exited(0), "", "")),
        )
        .expect("engine");
        let step = Duration::from_secs(3);

        entered.recv_timeout(step).expect("first cycle");
        release.send(()).expect("release first cycle");
        wait_for_generation(&engine, 1);
        assert_eq!(engine.current_scenario().scenario_id, "minimal");

        // Cycle 2 is sampling when the switch lands; its detection still
        // sees the old file because the fake command does not touch it.
        entered.recv_timeout(step).expect("second cycle");
        let record = engine.switch_scenario("web").expect("switch");
        release.send(()).expect("release second cycle");
        wait_for_generation(&engine, 2);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.active_scenario_id, "minimal");
        assert!(snapshot.captured_at.expect("captured") < record.switched_at);
        assert_eq!(engine.current_scenario().scenario_id, "web");

        drop(release);
        engine.shutdown();
    }

    #[test]
    fn failed_switch_leaves_current_scenario_unchanged() {
        let dir = tempfile::tempdir().expect("temp dir");
        let runner = Arc::new(ScriptedRunner::new(CommandStatus::Exited(1), "", "not found"));
        let engine = ToolwatchEngine::with_parts(
            config_in(&dir),
            Box::new(FixedProcessSource::default()),
            runner,
        )
        .expect("engine");
        wait_for_generation(&engine, 1);
        let before = engine.current_scenario();

        let err = engine.switch_scenario("web").expect_err("switch fails");
        assert_eq!(err.code(), "switch_failed");
        assert_eq!(engine.current_scenario(), before);
    }

    #[test]
    fn views_reflect_the_published_snapshot() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = FixedProcessSource::with(vec![
            record(10, "npx mcp-server-github", 100, 50),
            record(11, "npx mcp-server-github", 200, 30),
        ]);
        let engine = ToolwatchEngine::with_parts(
            config_in(&dir),
            Box::new(source),
            Arc::new(ScriptedRunner::new(CommandStatus::Exited(0), "", "")),
        )
        .expect("engine");
        wait_for_generation(&engine, 1);

        let running = engine.running_tools();
        assert_eq!(running.count, 1);
        assert_eq!(running.tools[0].pid, 10);

        let overview = engine.overview();
        assert_eq!(overview.total_memory_bytes, 80);
        assert_eq!(overview.configured_count, 0);

        let health = engine.health();
        assert_eq!(health.status, "ok");
        assert_eq!(health.generation, 1);
        assert!(health.poller_phase.is_some());

        assert_eq!(engine.scenarios().len(), 8);
        assert!(engine.configured_tools().tools.is_empty());
    }

    #[test]
    fn kill_rejects_invalid_pid() {
        let dir = tempfile::tempdir().expect("temp dir");
        let engine = ToolwatchEngine::with_parts(
            config_in(&dir),
            Box::new(FixedProcessSource::default()),
            Arc::new(ScriptedRunner::new(CommandStatus::Exited(0), "", "")),
        )
        .expect("engine");
        assert!(matches!(
            engine.kill_process(0),
            Err(ToolwatchError::InvalidPid(_))
        ));
    }
}
