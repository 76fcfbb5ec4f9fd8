//! Per-message classification
//!
//! Decides, for each inbound text frame, which log entries it contributes
//! and whether the session keeps streaming.

use crate::api::types::{ExecutionResponse, LogEntry, LogStatus};
use crate::common::Error;

/// What the session does after a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next {
    /// Keep receiving
    Continue,
    /// A log entry reported ERROR; stop without waiting for more messages
    FailedByLog,
    /// The runner reported a terminal status (`COMPLETED` or `FAILED`)
    Terminal(TerminalStatus),
    /// The message was `null`
    ProtocolViolation,
    /// The frame was not a valid execution response
    Malformed(String),
}

/// Terminal overall status reported by the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Completed,
    Failed,
}

impl TerminalStatus {
    fn parse(status: &str) -> Option<Self> {
        if status.eq_ignore_ascii_case("COMPLETED") {
            Some(TerminalStatus::Completed)
        } else if status.eq_ignore_ascii_case("FAILED") {
            Some(TerminalStatus::Failed)
        } else {
            None
        }
    }
}

/// Entries to append, in order, and the decision that follows them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub entries: Vec<LogEntry>,
    pub next: Next,
}

/// Classify a raw text frame
pub fn classify_frame(text: &str) -> Classification {
    match serde_json::from_str::<Option<ExecutionResponse>>(text) {
        Ok(response) => classify(response),
        Err(e) => Classification {
            entries: vec![LogEntry::error(
                Error::MalformedResponse(e.to_string()).to_string(),
            )],
            next: Next::Malformed(e.to_string()),
        },
    }
}

/// Classify a parsed message
pub fn classify(response: Option<ExecutionResponse>) -> Classification {
    let response = match response {
        Some(response) => response,
        None => {
            return Classification {
                entries: vec![LogEntry::error(
                    "Received empty or invalid execution response",
                )],
                next: Next::ProtocolViolation,
            }
        }
    };

    let failed_by_log = response.logs.iter().any(|entry| entry.status.is_error());
    let mut entries = response.logs;

    if failed_by_log {
        return Classification {
            entries,
            next: Next::FailedByLog,
        };
    }

    let terminal = response.status.as_deref().and_then(|raw| {
        TerminalStatus::parse(raw).map(|terminal| (raw.to_string(), terminal))
    });

    match terminal {
        Some((raw, terminal)) => {
            entries.push(LogEntry::now(
                LogStatus::Other(raw.clone()),
                format!("Execution {}", raw.to_lowercase()),
            ));
            Classification {
                entries,
                next: Next::Terminal(terminal),
            }
        }
        None => Classification {
            entries,
            next: Next::Continue,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_log_stops_even_while_running() {
        let result = classify_frame(
            r#"{"testcaseid": "TC1", "status": "RUNNING", "logs": [
                {"timestamp": "t1", "message": "Step 1 ok", "status": "INFO"},
                {"timestamp": "t2", "message": "Step 2 broke", "status": "error"}
            ]}"#,
        );
        assert_eq!(result.next, Next::FailedByLog);
        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.entries[1].message, "Step 2 broke");
    }

    #[test]
    fn test_error_log_wins_over_completed() {
        let result = classify_frame(
            r#"{"status": "COMPLETED", "logs": [{"message": "x", "status": "ERROR"}]}"#,
        );
        assert_eq!(result.next, Next::FailedByLog);
        assert_eq!(result.entries.len(), 1);
    }

    #[test]
    fn test_completed_appends_one_summary_entry() {
        let result = classify_frame(
            r#"{"status": "completed", "logs": [{"message": "done", "status": "SUCCESS"}]}"#,
        );
        assert_eq!(result.next, Next::Terminal(TerminalStatus::Completed));
        assert_eq!(result.entries.len(), 2);
        let summary = &result.entries[1];
        assert_eq!(summary.message, "Execution completed");
        assert_eq!(summary.status, LogStatus::Other("completed".to_string()));
    }

    #[test]
    fn test_failed_status_is_terminal() {
        let result = classify_frame(r#"{"status": "FAILED", "logs": []}"#);
        assert_eq!(result.next, Next::Terminal(TerminalStatus::Failed));
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].message, "Execution failed");
    }

    #[test]
    fn test_running_continues_and_keeps_order() {
        let result = classify_frame(
            r#"{"status": "RUNNING", "logs": [
                {"message": "a", "status": "INFO"},
                {"message": "b", "status": "DEBUG"},
                {"message": "c", "status": "INFO"}
            ]}"#,
        );
        assert_eq!(result.next, Next::Continue);
        let messages: Vec<_> = result.entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_null_message_violates_protocol() {
        let result = classify_frame("null");
        assert_eq!(result.next, Next::ProtocolViolation);
        assert_eq!(result.entries.len(), 1);
        assert!(result.entries[0].status.is_error());
    }

    #[test]
    fn test_fieldless_messages_keep_streaming() {
        for text in ["{}", r#"{"logs": []}"#, r#"{"logs": null, "status": null}"#] {
            let result = classify_frame(text);
            assert_eq!(result.next, Next::Continue, "for {text}");
            assert!(result.entries.is_empty(), "for {text}");
        }
    }

    #[test]
    fn test_malformed_frame() {
        let result = classify_frame("{not json");
        assert!(matches!(result.next, Next::Malformed(_)));
        assert_eq!(result.entries.len(), 1);
        assert!(result.entries[0].message.starts_with("JSON parsing error"));
        assert!(result.entries[0].status.is_error());
    }
}
