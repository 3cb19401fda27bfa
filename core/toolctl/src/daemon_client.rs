//! Client helper for talking to the toolwatch daemon.
//!
//! One request per connection. Daemon-side errors come back as
//! [`ClientError::Daemon`] with the wire code intact.

use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use toolwatch_daemon_protocol::{ErrorInfo, Method, Request, Response, MAX_REQUEST_BYTES};

const SOCKET_ENV: &str = "TOOLWATCH_DAEMON_SOCKET";
const SOCKET_NAME: &str = "daemon.sock";
const READ_TIMEOUT_MS: u64 = 2_000;
/// Must exceed the daemon's `[switcher] timeout_secs` (default 30 s), or the
/// client gives up while the switch command is still running.
pub const DEFAULT_SWITCH_TIMEOUT_SECS: u64 = 35;
const WRITE_TIMEOUT_MS: u64 = 600;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Transport(String),

    #[error("{}: {}", .0.code, .0.message)]
    Daemon(ErrorInfo),
}

/// Sends one request and returns the response `data`.
///
/// `read_timeout` overrides the per-method default.
pub fn call(
    method: Method,
    params: Option<Value>,
    read_timeout: Option<Duration>,
) -> Result<Value, ClientError> {
    let request = Request::new(method, params);
    let timeout = read_timeout.unwrap_or_else(|| read_timeout_for(method));
    let response = send_request(&request, timeout)?;
    if response.ok {
        return Ok(response.data.unwrap_or(Value::Null));
    }
    Err(ClientError::Daemon(response.error.unwrap_or_else(|| {
        ErrorInfo::new("unknown_error", "Unknown daemon error")
    })))
}

fn read_timeout_for(method: Method) -> Duration {
    match method {
        Method::SwitchScenario => Duration::from_secs(DEFAULT_SWITCH_TIMEOUT_SECS),
        _ => Duration::from_millis(READ_TIMEOUT_MS),
    }
}

pub fn socket_path() -> Result<PathBuf, String> {
    if let Some(path) = env::var_os(SOCKET_ENV).filter(|path| !path.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(".toolwatch").join(SOCKET_NAME))
}

fn send_request(request: &Request, read_timeout: Duration) -> Result<Response, ClientError> {
    let socket = socket_path().map_err(ClientError::Transport)?;
    let mut stream = UnixStream::connect(&socket).map_err(|err| {
        ClientError::Transport(format!(
            "Failed to connect to daemon socket {}: {}",
            socket.display(),
            err
        ))
    })?;
    let _ = stream.set_read_timeout(Some(read_timeout));
    let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

    serde_json::to_writer(&mut stream, request)
        .map_err(|err| ClientError::Transport(format!("Failed to write request: {}", err)))?;
    stream
        .write_all(b"\n")
        .map_err(|err| ClientError::Transport(format!("Failed to flush request: {}", err)))?;
    stream.flush().ok();

    read_response(&mut stream).map_err(ClientError::Transport)
}

fn read_response(stream: &mut UnixStream) -> Result<Response, String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES * 8 {
                    return Err("Response exceeded maximum size".to_string());
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
                return Err("Timed out waiting for daemon response".to_string());
            }
            Err(err) => return Err(format!("Failed to read response: {}", err)),
        }
    }

    parse_response(&buffer)
}

fn parse_response(buffer: &[u8]) -> Result<Response, String> {
    let response_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => &buffer[..index],
        None => buffer,
    };

    if response_bytes.is_empty() {
        return Err("Daemon response was empty".to_string());
    }

    serde_json::from_slice(response_bytes)
        .map_err(|err| format!("Failed to parse response JSON: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_response_stops_at_newline() {
        let response =
            parse_response(b"{\"ok\":true,\"data\":{\"status\":\"ok\"}}\ntrailing").unwrap();
        assert!(response.ok);
        assert_eq!(response.data.unwrap()["status"], "ok");
    }

    #[test]
    fn parse_response_rejects_empty_body() {
        assert!(parse_response(b"\n").is_err());
        assert!(parse_response(b"").is_err());
    }

    #[test]
    fn switch_gets_a_longer_read_timeout() {
        assert!(read_timeout_for(Method::SwitchScenario) > read_timeout_for(Method::GetHealth));
    }

    #[test]
    fn daemon_error_display_includes_code() {
        let err = ClientError::Daemon(ErrorInfo::new("unknown_scenario", "Unknown scenario: x"));
        assert_eq!(err.to_string(), "unknown_scenario: Unknown scenario: x");

        let err = ClientError::Transport("Daemon response was empty".to_string());
        assert_eq!(err.to_string(), "Daemon response was empty");
    }
}
