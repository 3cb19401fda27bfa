//! IPC protocol types and validation for toolwatch-daemon.
//!
//! This crate is shared by the daemon and its clients to prevent schema drift.
//! The daemon remains the authority on validation, but clients can reuse the
//! same types to construct valid requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024; // 1MB
pub const MAX_SCENARIO_ID_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Method {
    GetHealth,
    GetRunningTools,
    GetConfiguredTools,
    GetOverview,
    GetScenarios,
    GetCurrentScenario,
    SwitchScenario,
    KillProcess,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Request {
    pub protocol_version: u32,
    pub method: Method,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(method: Method, params: Option<Value>) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            method,
            id: None,
            params,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl Response {
    pub fn ok(id: Option<String>, data: Value) -> Self {
        Self {
            ok: true,
            id,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: Option<String>, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(ErrorInfo::new(code, message)),
        }
    }

    pub fn error_with_info(id: Option<String>, error: ErrorInfo) -> Self {
        Self {
            ok: false,
            id,
            data: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SwitchScenarioParams {
    pub scenario: String,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct KillProcessParams {
    #[serde(default)]
    pub pid: Option<u32>,
}

/// Parses `switch_scenario` params. Registry membership is checked by the
/// engine, not here.
pub fn parse_switch_scenario(params: Option<Value>) -> Result<String, ErrorInfo> {
    let params: SwitchScenarioParams = parse_params(params, "switch_scenario")?;
    let scenario = params.scenario.trim();
    if scenario.is_empty() {
        return Err(ErrorInfo::new("missing_field", "scenario is required"));
    }
    if scenario.len() > MAX_SCENARIO_ID_LEN {
        return Err(ErrorInfo::new(
            "invalid_params",
            format!("scenario must be {} characters or fewer", MAX_SCENARIO_ID_LEN),
        ));
    }
    Ok(scenario.to_string())
}

pub fn parse_kill_process(params: Option<Value>) -> Result<u32, ErrorInfo> {
    let params: KillProcessParams = parse_params(params, "kill_process")?;
    require_pid(params.pid)
}

fn parse_params<T: serde::de::DeserializeOwned>(
    params: Option<Value>,
    method: &str,
) -> Result<T, ErrorInfo> {
    let params = params.ok_or_else(|| {
        ErrorInfo::new("invalid_params", format!("{} requires params", method))
    })?;
    serde_json::from_value(params).map_err(|err| {
        ErrorInfo::new(
            "invalid_params",
            format!("{} params are invalid: {}", method, err),
        )
    })
}

fn require_pid(pid: Option<u32>) -> Result<u32, ErrorInfo> {
    match pid {
        Some(0) | None => Err(ErrorInfo::new("invalid_pid", "pid is required")),
        Some(pid) => Ok(pid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_names_are_snake_case() {
        let request: Request = serde_json::from_value(json!({
            "protocol_version": 1,
            "method": "get_current_scenario"
        }))
        .expect("parse request");
        assert_eq!(request.method, Method::GetCurrentScenario);
        assert!(request.params.is_none());
    }

    #[test]
    fn rejects_unknown_request_fields() {
        let result = serde_json::from_value::<Request>(json!({
            "protocol_version": 1,
            "method": "get_health",
            "extra": true
        }));
        assert!(result.is_err());
    }

    #[test]
    fn parses_switch_scenario() {
        let scenario = parse_switch_scenario(Some(json!({"scenario": " web "}))).unwrap();
        assert_eq!(scenario, "web");
    }

    #[test]
    fn switch_scenario_requires_params() {
        let err = parse_switch_scenario(None).unwrap_err();
        assert_eq!(err.code, "invalid_params");

        let err = parse_switch_scenario(Some(json!({"scenario": ""}))).unwrap_err();
        assert_eq!(err.code, "missing_field");

        let err =
            parse_switch_scenario(Some(json!({"scenario": "x".repeat(65)}))).unwrap_err();
        assert_eq!(err.code, "invalid_params");
    }

    #[test]
    fn kill_process_requires_nonzero_pid() {
        assert_eq!(parse_kill_process(Some(json!({"pid": 4242}))).unwrap(), 4242);

        let err = parse_kill_process(Some(json!({"pid": 0}))).unwrap_err();
        assert_eq!(err.code, "invalid_pid");

        let err = parse_kill_process(Some(json!({}))).unwrap_err();
        assert_eq!(err.code, "invalid_pid");

        let err = parse_kill_process(Some(json!({"pid": "abc"}))).unwrap_err();
        assert_eq!(err.code, "invalid_params");
    }

    #[test]
    fn error_response_omits_data() {
        let response = Response::error(Some("1".into()), "unknown_scenario", "nope");
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["ok"], json!(false));
        assert!(value.get("data").is_none());
        assert_eq!(value["error"]["code"], json!("unknown_scenario"));
    }
}
