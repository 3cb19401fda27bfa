//! External-command scenario switching.
//!
//! The runner reports how the command ended instead of failing on a non-zero
//! exit; [`ScenarioSwitcher`] decides what counts as success. A failed switch
//! leaves the advisory record untouched and is never retried.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::registry;
use crate::config::SwitcherConfig;
use crate::error::{Result, SwitchFailureReason, ToolwatchError};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(25);
// Grandchildren can keep the pipes open after the child exits.
const PIPE_DRAIN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Exited(i32),
    Signaled,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: CommandStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Runs one external command to completion or timeout.
///
/// Errors only when the command can't be started.
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

#[derive(Debug, Clone, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|err| ToolwatchError::CommandFailed {
            command: spec.display(),
            details: err.to_string(),
        })?;

        let stdout_rx = drain_pipe(child.stdout.take());
        let stderr_rx = drain_pipe(child.stderr.take());

        let status = wait_with_deadline(&mut child, spec.timeout).map_err(|err| {
            ToolwatchError::CommandFailed {
                command: spec.display(),
                details: format!("failed waiting for command: {}", err),
            }
        })?;

        Ok(CommandOutput {
            status,
            stdout: stdout_rx.recv_timeout(PIPE_DRAIN_GRACE).unwrap_or_default(),
            stderr: stderr_rx.recv_timeout(PIPE_DRAIN_GRACE).unwrap_or_default(),
        })
    }
}

fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buffer);
        }
        let _ = tx.send(String::from_utf8_lossy(&buffer).to_string());
    });
    rx
}

/// The parts of a spawned child the deadline wait needs.
trait WaitableChild {
    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>>;
    fn kill(&mut self) -> std::io::Result<()>;
    fn wait(&mut self) -> std::io::Result<ExitStatus>;
}

impl WaitableChild for Child {
    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        Child::try_wait(self)
    }

    fn kill(&mut self) -> std::io::Result<()> {
        Child::kill(self)
    }

    fn wait(&mut self) -> std::io::Result<ExitStatus> {
        Child::wait(self)
    }
}

/// Waits for exit until `timeout`. The child is killed and reaped on every
/// path that gives up on it.
fn wait_with_deadline(
    child: &mut impl WaitableChild,
    timeout: Duration,
) -> std::io::Result<CommandStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                return Ok(match status.code() {
                    Some(code) => CommandStatus::Exited(code),
                    None => CommandStatus::Signaled,
                });
            }
            Ok(None) => {}
            Err(err) => {
                reap(child);
                return Err(err);
            }
        }
        if Instant::now() >= deadline {
            reap(child);
            return Ok(CommandStatus::TimedOut);
        }
        thread::sleep(WAIT_POLL_INTERVAL);
    }
}

fn reap(child: &mut impl WaitableChild) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Advisory record of the last successful switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchRecord {
    pub scenario_id: String,
    pub switched_at: DateTime<Utc>,
}

pub struct ScenarioSwitcher {
    runner: Arc<dyn CommandRunner>,
    config: SwitcherConfig,
    last_switch: Mutex<Option<SwitchRecord>>,
}

impl ScenarioSwitcher {
    pub fn new(runner: Arc<dyn CommandRunner>, config: SwitcherConfig) -> Self {
        Self {
            runner,
            config,
            last_switch: Mutex::new(None),
        }
    }

    pub fn command_for(&self, scenario_id: &str) -> CommandSpec {
        let mut args = self.config.args.clone();
        args.push(scenario_id.to_string());
        CommandSpec {
            program: self.config.program.clone(),
            args,
            working_dir: self.config.working_dir.clone(),
            timeout: self.config.timeout(),
        }
    }

    /// Materializes `scenario_id` as the active configuration.
    pub fn switch_to(&self, scenario_id: &str) -> Result<SwitchRecord> {
        if registry::lookup(scenario_id).is_none() {
            return Err(ToolwatchError::UnknownScenario(scenario_id.to_string()));
        }

        let spec = self.command_for(scenario_id);
        tracing::info!(scenario = scenario_id, command = %spec.display(), "Switching scenario");
        let output = self.runner.run(&spec)?;

        let reason = match output.status {
            CommandStatus::Exited(0) => None,
            CommandStatus::Exited(code) => Some(SwitchFailureReason::ExitCode(code)),
            CommandStatus::Signaled => Some(SwitchFailureReason::Signaled),
            CommandStatus::TimedOut => Some(SwitchFailureReason::TimedOut {
                after_secs: spec.timeout.as_secs(),
            }),
        };
        if let Some(reason) = reason {
            tracing::warn!(
                scenario = scenario_id,
                reason = %reason,
                stderr = %output.stderr.trim(),
                "Scenario switch failed"
            );
            return Err(ToolwatchError::SwitchFailed {
                reason,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        let record = SwitchRecord {
            scenario_id: scenario_id.to_string(),
            switched_at: Utc::now(),
        };
        // Recover from poisoning - the record is replaced wholesale anyway
        *self
            .last_switch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(record.clone());
        tracing::info!(scenario = scenario_id, "Scenario switch succeeded");
        Ok(record)
    }

    pub fn last_switch(&self) -> Option<SwitchRecord> {
        self.last_switch
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Runner that returns a canned output and counts invocations.
    pub struct ScriptedRunner {
        pub output: CommandOutput,
        pub calls: AtomicUsize,
        pub last_spec: Mutex<Option<CommandSpec>>,
    }

    impl ScriptedRunner {
        pub fn new(status: CommandStatus, stdout: &str, stderr: &str) -> Self {
            Self {
                output: CommandOutput {
                    status,
                    stdout: stdout.to_string(),
                    stderr: stderr.to_string(),
                },
                calls: AtomicUsize::new(0),
                last_spec: Mutex::new(None),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_spec.lock().unwrap() = Some(spec.clone());
            Ok(self.output.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::ScriptedRunner;
    use super::*;

    fn switcher_with(runner: Arc<ScriptedRunner>) -> ScenarioSwitcher {
        let config = SwitcherConfig {
            program: "bash".to_string(),
            args: vec!["/opt/mcp-switcher.sh".to_string()],
            working_dir: None,
            timeout_secs: 30,
        };
        ScenarioSwitcher::new(runner, config)
    }

    #[test]
    fn unknown_scenario_is_rejected_without_invocation() {
        let runner = Arc::new(ScriptedRunner::new(CommandStatus::Exited(0), "", ""));
        let switcher = switcher_with(Arc::clone(&runner));

        let err = switcher.switch_to("does-not-exist").expect_err("unknown");
        assert!(matches!(err, ToolwatchError::UnknownScenario(ref id) if id == "does-not-exist"));
        assert_eq!(runner.calls(), 0);
        assert!(switcher.last_switch().is_none());
    }

    #[test]
    fn successful_switch_records_advisory_state() {
        let runner = Arc::new(ScriptedRunner::new(CommandStatus::Exited(0), "ok", ""));
        let switcher = switcher_with(Arc::clone(&runner));

        let record = switcher.switch_to("minimal").expect("switch");
        assert_eq!(record.scenario_id, "minimal");
        assert_eq!(switcher.last_switch(), Some(record));
        assert_eq!(runner.calls(), 1);

        let spec = runner.last_spec.lock().unwrap().clone().expect("spec");
        assert_eq!(spec.program, "bash");
        assert_eq!(spec.args, vec!["/opt/mcp-switcher.sh", "minimal"]);
        assert_eq!(spec.timeout, Duration::from_secs(30));
    }

    #[test]
    fn non_zero_exit_fails_with_captured_output() {
        let runner = Arc::new(ScriptedRunner::new(
            CommandStatus::Exited(1),
            "partial",
            "not found",
        ));
        let switcher = switcher_with(Arc::clone(&runner));

        match switcher.switch_to("web") {
            Err(ToolwatchError::SwitchFailed {
                reason,
                stdout,
                stderr,
            }) => {
                assert_eq!(reason, SwitchFailureReason::ExitCode(1));
                assert_eq!(stdout, "partial");
                assert_eq!(stderr, "not found");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(switcher.last_switch().is_none());
        assert_eq!(runner.calls(), 1);
    }

    #[test]
    fn timeout_fails_and_keeps_previous_record() {
        let ok = Arc::new(ScriptedRunner::new(CommandStatus::Exited(0), "", ""));
        let switcher = switcher_with(ok);
        let first = switcher.switch_to("testing").expect("switch");

        let slow = Arc::new(ScriptedRunner::new(CommandStatus::TimedOut, "", ""));
        let switcher = ScenarioSwitcher {
            runner: slow,
            config: switcher.config.clone(),
            last_switch: Mutex::new(Some(first.clone())),
        };
        let err = switcher.switch_to("web").expect_err("timeout");
        assert!(matches!(
            err,
            ToolwatchError::SwitchFailed {
                reason: SwitchFailureReason::TimedOut { after_secs: 30 },
                ..
            }
        ));
        assert_eq!(switcher.last_switch(), Some(first));
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_captures_exit_code_and_streams() {
        let spec = CommandSpec {
            program: "sh".to_string(),
            args: vec![
                "-c".to_string(),
                "echo switched $0; echo not found >&2; exit 3".to_string(),
                "web".to_string(),
            ],
            working_dir: None,
            timeout: Duration::from_secs(10),
        };
        let output = ProcessCommandRunner.run(&spec).expect("run");
        assert_eq!(output.status, CommandStatus::Exited(3));
        assert_eq!(output.stdout.trim(), "switched web");
        assert_eq!(output.stderr.trim(), "not found");
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_kills_command_past_timeout() {
        let spec = CommandSpec {
            program: "sleep".to_string(),
            args: vec!["5".to_string()],
            working_dir: None,
            timeout: Duration::from_millis(200),
        };
        let started = Instant::now();
        let output = ProcessCommandRunner.run(&spec).expect("run");
        assert_eq!(output.status, CommandStatus::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn process_runner_reports_spawn_failure() {
        let spec = CommandSpec {
            program: "/definitely/not/a/real/switcher".to_string(),
            args: vec![],
            working_dir: None,
            timeout: Duration::from_secs(1),
        };
        let err = ProcessCommandRunner.run(&spec).expect_err("spawn failure");
        assert!(matches!(err, ToolwatchError::CommandFailed { .. }));
    }

    /// Child whose status can never be read.
    #[derive(Default)]
    struct UnreadableChild {
        killed: bool,
        reaped: bool,
    }

    impl WaitableChild for UnreadableChild {
        fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
            Err(std::io::Error::other("wait status unavailable"))
        }

        fn kill(&mut self) -> std::io::Result<()> {
            self.killed = true;
            Ok(())
        }

        fn wait(&mut self) -> std::io::Result<ExitStatus> {
            self.reaped = true;
            Err(std::io::Error::other("wait status unavailable"))
        }
    }

    #[test]
    fn wait_error_kills_and_reaps_child() {
        let mut child = UnreadableChild::default();
        let err = wait_with_deadline(&mut child, Duration::from_secs(10)).expect_err("wait error");
        assert_eq!(err.to_string(), "wait status unavailable");
        assert!(child.killed);
        assert!(child.reaped);
    }
}
