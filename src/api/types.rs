//! Wire types shared with the test management backend
//!
//! Field names follow the backend's JSON exactly; a few of them contain
//! spaces, so most structs carry explicit `rename`s.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::common::ordered;

/// Automation engine a script targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    #[default]
    Playwright,
    Selenium,
}

impl ScriptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptKind::Playwright => "playwright",
            ScriptKind::Selenium => "selenium",
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Test-data value attached to a step
///
/// The backend sends strings, but `null` and bare scalars show up in older
/// plans; `null` becomes the empty string and scalars keep their JSON text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepData(pub String);

impl<'de> Deserialize<'de> for StepData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(StepData(match value {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        }))
    }
}

impl StepData {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Plan for one test case: ordered step phrases with their test data
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestPlan {
    /// Identifier of the test case the steps belong to
    #[serde(rename = "current testid", alias = "current_testid", default)]
    pub test_case_id: Option<String>,

    /// Step phrase -> test data, in execution order (repeats allowed)
    #[serde(
        rename = "current - bdd steps",
        alias = "current_bdd_steps",
        default,
        deserialize_with = "ordered::entries"
    )]
    pub steps: Vec<(String, StepData)>,
}

impl TestPlan {
    /// Build a plan from phrase/data pairs
    pub fn new<I, P, D>(test_case_id: impl Into<String>, steps: I) -> Self
    where
        I: IntoIterator<Item = (P, D)>,
        P: Into<String>,
        D: Into<String>,
    {
        Self {
            test_case_id: Some(test_case_id.into()),
            steps: steps
                .into_iter()
                .map(|(p, d)| (p.into(), StepData(d.into())))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Severity of a run log entry
///
/// Known levels compare case-insensitively; anything else (for example a
/// terminal `COMPLETED`) is carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogStatus {
    #[default]
    Info,
    Debug,
    Success,
    Error,
    Other(String),
}

impl LogStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "INFO" => LogStatus::Info,
            "DEBUG" => LogStatus::Debug,
            "SUCCESS" => LogStatus::Success,
            "ERROR" => LogStatus::Error,
            _ => LogStatus::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LogStatus::Info => "INFO",
            LogStatus::Debug => "DEBUG",
            LogStatus::Success => "SUCCESS",
            LogStatus::Error => "ERROR",
            LogStatus::Other(raw) => raw,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LogStatus::Error)
    }
}

impl fmt::Display for LogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LogStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(|s| LogStatus::parse(&s)).unwrap_or_default())
    }
}

/// One line of a run's log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default, deserialize_with = "ordered::nullable")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "ordered::nullable")]
    pub message: String,
    #[serde(default)]
    pub status: LogStatus,
}

impl LogEntry {
    /// Create an entry stamped with the current local time
    pub fn now(status: LogStatus, message: impl Into<String>) -> Self {
        Self {
            timestamp: crate::common::timestamp(),
            message: message.into(),
            status,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::now(LogStatus::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::now(LogStatus::Error, message)
    }
}

/// A message streamed by the runner during execution
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionResponse {
    #[serde(default)]
    pub testcaseid: Option<String>,
    #[serde(default)]
    pub script_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "ordered::nullable")]
    pub logs: Vec<LogEntry>,
}

/// First frame sent on the streaming connection
#[derive(Debug, Serialize)]
pub struct AuthFrame<'a> {
    pub token: &'a str,
}

/// Structured error body returned by the backend
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub detail: Option<String>,
}
