//! toolwatch daemon entrypoint.
//!
//! Owns one `ToolwatchEngine` (and with it the only poller thread) and serves
//! its read views and control operations over a Unix socket. One request per
//! connection: a single line of JSON in, a single line of JSON out.

use fs_err as fs;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use serde::Serialize;
use toolwatch_core::config::get_toolwatch_dir;
use toolwatch_core::{EngineConfig, ToolwatchEngine, ToolwatchError};
use toolwatch_daemon_protocol::{
    parse_kill_process, parse_switch_scenario, ErrorInfo, Method, Request, Response,
    MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};

const SOCKET_NAME: &str = "daemon.sock";
const SOCKET_ENV: &str = "TOOLWATCH_DAEMON_SOCKET";
const DEBUG_LOG_ENV: &str = "TOOLWATCH_DEBUG_LOG";
const READ_TIMEOUT_SECS: u64 = 2;
const READ_CHUNK_SIZE: usize = 4096;

fn main() {
    init_logging();

    let socket_path = daemon_socket_path();

    if let Err(err) = prepare_socket_dir(&socket_path) {
        error!(error = %err, "Failed to prepare daemon socket directory");
        std::process::exit(1);
    }

    if let Err(err) = remove_existing_socket(&socket_path) {
        error!(error = %err, path = %socket_path.display(), "Failed to remove existing socket");
        std::process::exit(1);
    }

    let engine = match ToolwatchEngine::start(EngineConfig::load()) {
        Ok(engine) => Arc::new(engine),
        Err(err) => {
            error!(error = %err, "Failed to start toolwatch engine");
            std::process::exit(1);
        }
    };

    let listener = match UnixListener::bind(&socket_path) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, path = %socket_path.display(), "Failed to bind daemon socket");
            std::process::exit(1);
        }
    };

    info!(path = %socket_path.display(), "toolwatch daemon started");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let engine = Arc::clone(&engine);
                thread::spawn(move || handle_connection(stream, engine));
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept daemon connection");
            }
        }
    }

    engine.shutdown();
}

fn init_logging() {
    let debug_enabled = env::var(DEBUG_LOG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn daemon_socket_path() -> PathBuf {
    match env::var_os(SOCKET_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => get_toolwatch_dir().join(SOCKET_NAME),
    }
}

fn prepare_socket_dir(socket_path: &Path) -> Result<(), String> {
    let parent = socket_path
        .parent()
        .ok_or_else(|| "Socket path has no parent".to_string())?;
    fs::create_dir_all(parent).map_err(|err| format!("Failed to create socket directory: {}", err))
}

fn remove_existing_socket(socket_path: &Path) -> Result<(), String> {
    if socket_path.exists() {
        fs::remove_file(socket_path)
            .map_err(|err| format!("Failed to remove existing socket: {}", err))?;
    }
    Ok(())
}

fn handle_connection(mut stream: UnixStream, engine: Arc<ToolwatchEngine>) {
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Failed to read request");
            let response = Response::error_with_info(None, err);
            let _ = write_response(&mut stream, response);
            return;
        }
    };

    tracing::debug!(method = ?request.method, id = ?request.id, "Daemon request received");
    let response = handle_request(request, &engine);
    let _ = write_response(&mut stream, response);
}

fn read_request(stream: &mut UnixStream) -> Result<Request, ErrorInfo> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));

    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ErrorInfo::new(
                        "request_too_large",
                        "request exceeded maximum size",
                    ));
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                return Err(ErrorInfo::new("read_timeout", "request timed out"));
            }
            Err(err) => {
                return Err(ErrorInfo::new(
                    "read_error",
                    format!("failed to read request: {}", err),
                ));
            }
        }
    }

    let request_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if request_bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    serde_json::from_slice(request_bytes).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("request was not valid JSON: {}", err),
        )
    })
}

fn handle_request(request: Request, engine: &ToolwatchEngine) -> Response {
    if request.protocol_version != PROTOCOL_VERSION {
        return Response::error(
            request.id,
            "protocol_mismatch",
            "unsupported protocol version",
        );
    }

    let id = request.id;
    match request.method {
        Method::GetHealth => {
            let mut data = to_data(engine.health());
            data["pid"] = serde_json::json!(std::process::id());
            data["version"] = serde_json::json!(env!("CARGO_PKG_VERSION"));
            data["protocol_version"] = serde_json::json!(PROTOCOL_VERSION);
            Response::ok(id, data)
        }
        Method::GetRunningTools => {
            let view = engine.running_tools();
            tracing::debug!(tools = view.count, "Running tools snapshot");
            serialize_response(id, &view, "running tools")
        }
        Method::GetConfiguredTools => {
            serialize_response(id, &engine.configured_tools(), "configured tools")
        }
        Method::GetOverview => serialize_response(id, &engine.overview(), "overview"),
        Method::GetScenarios => serialize_response(id, &engine.scenarios(), "scenarios"),
        Method::GetCurrentScenario => {
            serialize_response(id, &engine.current_scenario(), "current scenario")
        }
        Method::SwitchScenario => {
            let scenario = match parse_switch_scenario(request.params) {
                Ok(scenario) => scenario,
                Err(err) => return Response::error_with_info(id, err),
            };
            match engine.switch_scenario(&scenario) {
                Ok(record) => serialize_response(id, &record, "switch record"),
                Err(err) => engine_error(id, err),
            }
        }
        Method::KillProcess => {
            let pid = match parse_kill_process(request.params) {
                Ok(pid) => pid,
                Err(err) => return Response::error_with_info(id, err),
            };
            match engine.kill_process(pid) {
                Ok(()) => Response::ok(id, serde_json::json!({ "pid": pid, "signaled": true })),
                Err(err) => engine_error(id, err),
            }
        }
    }
}

fn serialize_response<T: Serialize>(id: Option<String>, value: &T, what: &str) -> Response {
    match serde_json::to_value(value) {
        Ok(value) => Response::ok(id, value),
        Err(err) => Response::error(
            id,
            "serialization_error",
            format!("Failed to serialize {}: {}", what, err),
        ),
    }
}

fn to_data<T: Serialize>(value: T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_else(|_| serde_json::json!({}))
}

fn engine_error(id: Option<String>, err: ToolwatchError) -> Response {
    let message = match &err {
        ToolwatchError::SwitchFailed { stderr, .. } if !stderr.trim().is_empty() => {
            format!("{}: {}", err, stderr.trim())
        }
        _ => err.to_string(),
    };
    warn!(code = err.code(), error = %message, "Request failed");
    Response::error(id, err.code(), message)
}

fn write_response(stream: &mut UnixStream, response: Response) -> std::io::Result<()> {
    serde_json::to_writer(&mut *stream, &response)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(())
}
