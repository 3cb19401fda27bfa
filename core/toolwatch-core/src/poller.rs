//! Background sampling loop.
//!
//! One cycle walks `Idle → Sampling → Classifying → Aggregating →
//! DetectingScenario → Publishing → Sleeping`. A panic anywhere in the cycle
//! moves the poller to `Backoff` for the longer backoff interval; the loop
//! itself never stops and the store keeps its last good snapshot.
//!
//! The sleep doubles as the control point: [`PollerHandle::nudge`] cuts it
//! short for an immediate cycle, [`PollerHandle::shutdown`] ends the loop
//! once the in-flight cycle has finished.

use chrono::Utc;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::aggregate::{aggregate_classified, classify_records};
use crate::config::EngineConfig;
use crate::configured::configured_tools;
use crate::sampler::{ProcessSampler, ProcessSource};
use crate::scenarios::ScenarioDetector;
use crate::snapshot::{SnapshotStore, SystemSnapshot};

const THREAD_NAME: &str = "toolwatch-poller";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollerPhase {
    Idle,
    Sampling,
    Classifying,
    Aggregating,
    DetectingScenario,
    Publishing,
    Sleeping,
    Backoff,
    Stopped,
}

impl std::fmt::Display for PollerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PollerPhase::Idle => "idle",
            PollerPhase::Sampling => "sampling",
            PollerPhase::Classifying => "classifying",
            PollerPhase::Aggregating => "aggregating",
            PollerPhase::DetectingScenario => "detecting_scenario",
            PollerPhase::Publishing => "publishing",
            PollerPhase::Sleeping => "sleeping",
            PollerPhase::Backoff => "backoff",
            PollerPhase::Stopped => "stopped",
        };
        write!(f, "{}", name)
    }
}

enum Control {
    Nudge,
    Shutdown,
}

pub struct Poller {
    sampler: ProcessSampler,
    detector: ScenarioDetector,
    active_config: PathBuf,
    store: Arc<SnapshotStore>,
    interval: Duration,
    backoff: Duration,
    generation: u64,
    phase: Arc<Mutex<PollerPhase>>,
}

impl Poller {
    pub fn new(
        source: Box<dyn ProcessSource>,
        config: &EngineConfig,
        store: Arc<SnapshotStore>,
    ) -> Self {
        let generation = store.current().generation;
        Self {
            sampler: ProcessSampler::new(source, &config.sampler),
            detector: ScenarioDetector::new(&config.paths),
            active_config: config.paths.active_config.clone(),
            store,
            interval: config.poller.interval(),
            backoff: config.poller.backoff(),
            generation,
            phase: Arc::new(Mutex::new(PollerPhase::Idle)),
        }
    }

    /// Runs one full cycle and publishes its snapshot.
    ///
    /// `captured_at` is taken before sampling: anything that changes while
    /// the cycle runs is newer than the snapshot that may have missed it.
    pub fn poll_once(&mut self) {
        let captured_at = Utc::now();
        self.set_phase(PollerPhase::Sampling);
        let records = self.sampler.sample();

        self.set_phase(PollerPhase::Classifying);
        let classified = classify_records(records);

        self.set_phase(PollerPhase::Aggregating);
        let report = aggregate_classified(classified);
        let configured = configured_tools(&self.active_config);

        self.set_phase(PollerPhase::DetectingScenario);
        let scenario_id = self.detector.detect();

        self.set_phase(PollerPhase::Publishing);
        self.generation += 1;
        let snapshot = SystemSnapshot {
            generation: self.generation,
            running: report.aggregates,
            unclassified_count: report.unclassified_count,
            configured_tools: configured,
            active_scenario_id: scenario_id,
            captured_at: Some(captured_at),
        };
        tracing::debug!(
            generation = snapshot.generation,
            running = snapshot.running.len(),
            unclassified = snapshot.unclassified_count,
            configured = snapshot.configured_tools.len(),
            scenario = %snapshot.active_scenario_id,
            "Publishing snapshot"
        );
        self.store.publish(snapshot);
    }

    /// Starts the loop on a dedicated thread.
    pub fn spawn(self) -> std::io::Result<PollerHandle> {
        let (tx, rx) = mpsc::channel();
        let phase = Arc::clone(&self.phase);
        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || self.run(rx))?;
        Ok(PollerHandle {
            control: tx,
            thread: Mutex::new(Some(thread)),
            phase,
        })
    }

    fn run(mut self, control: Receiver<Control>) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            backoff_ms = self.backoff.as_millis() as u64,
            "Poller started"
        );

        loop {
            self.set_phase(PollerPhase::Idle);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.poll_once()));

            let wait = match outcome {
                Ok(()) => {
                    self.set_phase(PollerPhase::Sleeping);
                    self.interval
                }
                Err(payload) => {
                    tracing::warn!(
                        error = %panic_message(payload.as_ref()),
                        backoff_ms = self.backoff.as_millis() as u64,
                        "Poll cycle failed; backing off"
                    );
                    self.set_phase(PollerPhase::Backoff);
                    self.backoff
                }
            };

            if !wait_for_next_cycle(&control, wait) {
                break;
            }
        }

        self.set_phase(PollerPhase::Stopped);
        tracing::info!(generation = self.generation, "Poller stopped");
    }

    fn set_phase(&self, next: PollerPhase) {
        let mut phase = self
            .phase
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if *phase != next {
            tracing::debug!(from = %*phase, to = %next, "Poller phase");
            *phase = next;
        }
    }
}

/// Sleeps up to `wait`. Returns false when the poller should stop.
fn wait_for_next_cycle(control: &Receiver<Control>, wait: Duration) -> bool {
    match control.recv_timeout(wait) {
        Ok(Control::Nudge) => {
            // Coalesce queued nudges into one cycle.
            loop {
                match control.try_recv() {
                    Ok(Control::Nudge) => continue,
                    Ok(Control::Shutdown) | Err(TryRecvError::Disconnected) => return false,
                    Err(TryRecvError::Empty) => return true,
                }
            }
        }
        Ok(Control::Shutdown) | Err(RecvTimeoutError::Disconnected) => false,
        Err(RecvTimeoutError::Timeout) => true,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Control surface for a running poller thread.
pub struct PollerHandle {
    control: Sender<Control>,
    thread: Mutex<Option<JoinHandle<()>>>,
    phase: Arc<Mutex<PollerPhase>>,
}

impl PollerHandle {
    /// Requests an immediate cycle instead of waiting out the current sleep.
    pub fn nudge(&self) {
        let _ = self.control.send(Control::Nudge);
    }

    /// Stops the loop after the in-flight cycle and waits for the thread.
    pub fn shutdown(&self) {
        let _ = self.control.send(Control::Shutdown);
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                tracing::warn!("Poller thread panicked during shutdown");
            }
        }
    }

    pub fn phase(&self) -> PollerPhase {
        *self
            .phase
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PathsConfig, PollerConfig};
    use crate::sampler::test_utils::{record, FixedProcessSource};
    use crate::sampler::ProcessRecord;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn test_config(dir: &tempfile::TempDir, interval_ms: u64, backoff_ms: u64) -> EngineConfig {
        EngineConfig {
            paths: PathsConfig {
                active_config: dir.path().join("mcp.json"),
                scenarios_dir: dir.path().join("mcp-configs"),
            },
            poller: PollerConfig {
                interval_ms,
                backoff_ms,
            },
            ..EngineConfig::default()
        }
    }

    fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        check()
    }

    /// Panics on the listed (1-based) calls, otherwise returns a fixed table.
    struct FlakySource {
        calls: Arc<AtomicUsize>,
        panic_on: Vec<usize>,
        table: Vec<ProcessRecord>,
    }

    impl ProcessSource for FlakySource {
        fn read_table(&mut self) -> Vec<ProcessRecord> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.panic_on.contains(&call) {
                panic!("process table unavailable");
            }
            self.table.clone()
        }
    }

    #[test]
    fn poll_once_publishes_complete_snapshot() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = test_config(&dir, 3_000, 10_000);
        fs_err::write(
            &config.paths.active_config,
            r#"{"toolServers":{"gh":{"command":"npx","args":["mcp-server-github"]}}}"#,
        )
        .expect("write active");

        let store = Arc::new(SnapshotStore::new());
        let source = FixedProcessSource::with(vec![
            record(11, "npx mcp-server-github", 100, 5),
            record(12, "node unknown-mcp.js", 100, 5),
            record(13, "bash", 100, 5),
        ]);
        let mut poller = Poller::new(Box::new(source), &config, Arc::clone(&store));
        poller.poll_once();

        let snapshot = store.current();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.running.len(), 1);
        assert!(snapshot.running.contains_key("mcp-server-github"));
        assert_eq!(snapshot.unclassified_count, 1);
        assert_eq!(snapshot.configured_tools.len(), 1);
        assert_eq!(snapshot.active_scenario_id, "custom");
        assert!(snapshot.captured_at.is_some());
    }

    #[test]
    fn failed_cycle_backs_off_and_keeps_last_good_snapshot() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = test_config(&dir, 20, 150);
        let store = Arc::new(SnapshotStore::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let source = FlakySource {
            calls: Arc::clone(&calls),
            panic_on: vec![2],
            table: vec![record(1, "npx mcp-server-github", 1, 1)],
        };

        let handle = Poller::new(Box::new(source), &config, Arc::clone(&store))
            .spawn()
            .expect("spawn");

        assert!(wait_until(Duration::from_secs(2), || {
            handle.phase() == PollerPhase::Backoff
        }));
        // The failed second cycle must not replace the first snapshot.
        assert_eq!(store.current().generation, 1);
        assert!(store.current().running.contains_key("mcp-server-github"));

        // After backoff the loop resumes.
        assert!(wait_until(Duration::from_secs(3), || {
            store.current().generation >= 2
        }));
        assert!(calls.load(Ordering::SeqCst) >= 3);

        handle.shutdown();
        assert_eq!(handle.phase(), PollerPhase::Stopped);
    }

    #[test]
    fn nudge_triggers_immediate_cycle() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = test_config(&dir, 60_000, 60_000);
        let store = Arc::new(SnapshotStore::new());
        let source = FixedProcessSource::default();

        let handle = Poller::new(Box::new(source.clone()), &config, Arc::clone(&store))
            .spawn()
            .expect("spawn");
        assert!(wait_until(Duration::from_secs(2), || {
            store.current().generation == 1
        }));

        source.replace(vec![record(5, "uvx mcp-server-hotnews", 1, 1)]);
        handle.nudge();
        handle.nudge();
        assert!(wait_until(Duration::from_secs(2), || {
            store.current().running.contains_key("mcp-server-hotnews")
        }));

        handle.shutdown();
    }

    #[test]
    fn shutdown_interrupts_sleep() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = test_config(&dir, 60_000, 60_000);
        let store = Arc::new(SnapshotStore::new());
        let handle = Poller::new(
            Box::new(FixedProcessSource::default()),
            &config,
            Arc::clone(&store),
        )
        .spawn()
        .expect("spawn");

        assert!(wait_until(Duration::from_secs(2), || {
            handle.phase() == PollerPhase::Sleeping
        }));
        let started = Instant::now();
        handle.shutdown();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(handle.phase(), PollerPhase::Stopped);
        assert_eq!(store.current().generation, 1);
    }

    #[test]
    fn phase_display_is_snake_case() {
        assert_eq!(PollerPhase::DetectingScenario.to_string(), "detecting_scenario");
        assert_eq!(PollerPhase::Backoff.to_string(), "backoff");
    }
}
