//! Execution session state machine
//!
//! One session drives one streaming run: connect, send the credential,
//! consume execution responses until a terminal outcome, then close. The
//! session runs as its own task and owns the transport and the run log
//! outright; observers only see immutable [`SessionEvent`]s through a
//! channel, so log appends never race with reads.
//!
//! A single deadline covers the whole run. When it elapses, or the caller
//! aborts, the transport is dropped without a close handshake. An abort
//! that arrives during the close handshake cuts it short and still fails
//! the session. Resource
//! release (and the `Released` event) happens exactly once per session on
//! every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::api::types::{AuthFrame, LogEntry, LogStatus};
use crate::common::{Error, Result};

use super::classify::{classify_frame, Next, TerminalStatus};
use super::transport::{Connector, Frame, Transport, POLICY_VIOLATION};

/// Execution session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not started
    Idle,
    /// Opening the transport
    Connecting,
    /// Sending the credential
    Authenticating,
    /// Receiving execution responses
    Streaming,
    /// Running the close handshake
    Closing,
    /// Ended in an orderly way
    Closed,
    /// Ended by a transport, authentication, timeout or cancellation failure
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Authenticating => write!(f, "authenticating"),
            Self::Streaming => write!(f, "streaming"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The runner reported `COMPLETED`
    Completed,
    /// The runner reported `FAILED` or sent an ERROR log entry
    Failed,
    /// The runner closed the connection before a terminal status
    ClosedByServer,
    /// An inbound message was malformed or empty
    ProtocolError,
    ConnectionFailed,
    AuthRejected,
    /// The connection broke mid-run
    TransportError,
    TimedOut,
    Cancelled,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    /// State the session settles in after this outcome
    pub fn terminal_state(&self) -> SessionState {
        match self {
            Outcome::Completed
            | Outcome::Failed
            | Outcome::ClosedByServer
            | Outcome::ProtocolError => SessionState::Closed,
            Outcome::ConnectionFailed
            | Outcome::AuthRejected
            | Outcome::TransportError
            | Outcome::TimedOut
            | Outcome::Cancelled => SessionState::Failed,
        }
    }

    fn from_error(e: &Error) -> Self {
        match e {
            Error::ConnectionFailed(_) | Error::InvalidUrl { .. } => Outcome::ConnectionFailed,
            Error::AuthRejected(_) => Outcome::AuthRejected,
            Error::Timeout(_) => Outcome::TimedOut,
            Error::Cancelled => Outcome::Cancelled,
            _ => Outcome::TransportError,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Outcome::Completed => "completed",
            Outcome::Failed => "failed",
            Outcome::ClosedByServer => "closed by server",
            Outcome::ProtocolError => "protocol error",
            Outcome::ConnectionFailed => "connection failed",
            Outcome::AuthRejected => "authentication rejected",
            Outcome::TransportError => "connection error",
            Outcome::TimedOut => "timed out",
            Outcome::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// Something an observer of the session can see, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    State(SessionState),
    Log(LogEntry),
    /// Resources are released; another run may start
    Released,
}

/// Timing limits for one session
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Budget for the whole run, connect through terminal status
    pub run_timeout: Duration,
    /// Bounded wait for the close handshake
    pub close_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            run_timeout: Duration::from_secs(30),
            close_timeout: Duration::from_secs(5),
        }
    }
}

/// Final summary of a session
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: SessionState,
    pub outcome: Outcome,
    pub logs: Vec<LogEntry>,
}

/// Caller's side of a running session
pub struct SessionHandle {
    events: mpsc::UnboundedReceiver<SessionEvent>,
    cancel: CancellationToken,
    task: JoinHandle<RunReport>,
}

impl SessionHandle {
    /// Next event, or `None` once the session has released its resources
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Abort the run; safe to call any number of times
    pub fn abort(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!("Abort requested");
        }
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to end and return its report
    pub async fn wait(self) -> Result<RunReport> {
        self.task
            .await
            .map_err(|e| Error::Internal(format!("session task failed: {e}")))
    }
}

/// Clears the active-session gate and announces release, exactly once
struct ReleaseGuard {
    gate: Option<Arc<AtomicBool>>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl ReleaseGuard {
    fn release(&mut self) {
        if let Some(gate) = self.gate.take() {
            gate.store(false, Ordering::Release);
            let _ = self.events.send(SessionEvent::Released);
            tracing::debug!("Session resources released");
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Where phase one of a run left the transport
struct Streamed {
    outcome: Outcome,
    transport: Option<Box<dyn Transport>>,
    peer_closed: bool,
}

impl Streamed {
    fn broken(outcome: Outcome) -> Self {
        Self {
            outcome,
            transport: None,
            peer_closed: false,
        }
    }
}

/// Session task state
struct Session {
    url: Url,
    token: String,
    settings: SessionSettings,
    state: SessionState,
    logs: Vec<LogEntry>,
    events: mpsc::UnboundedSender<SessionEvent>,
    release: ReleaseGuard,
}

/// Spawn a session task
///
/// `gate` is cleared when the session releases its resources.
pub(crate) fn spawn(
    url: Url,
    token: String,
    settings: SessionSettings,
    connector: Arc<dyn Connector>,
    gate: Arc<AtomicBool>,
) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let session = Session {
        url,
        token,
        settings,
        state: SessionState::Idle,
        logs: Vec::new(),
        events: tx.clone(),
        release: ReleaseGuard {
            gate: Some(gate),
            events: tx,
        },
    };

    let task = tokio::spawn(session.run(connector, cancel.clone()));

    SessionHandle {
        events: rx,
        cancel,
        task,
    }
}

impl Session {
    #[tracing::instrument(name = "session", skip_all, fields(url = %self.url))]
    async fn run(mut self, connector: Arc<dyn Connector>, cancel: CancellationToken) -> RunReport {
        let deadline = Instant::now() + self.settings.run_timeout;

        let streamed = tokio::select! {
            streamed = self.stream(connector.as_ref()) => streamed,
            () = cancel.cancelled() => self.interrupted(Error::Cancelled),
            () = tokio::time::sleep_until(deadline) => {
                self.interrupted(Error::Timeout(self.settings.run_timeout.as_secs()))
            }
        };

        let outcome = streamed.outcome;
        let final_state = self.close(streamed, &cancel).await;
        self.transition(final_state);
        self.release.release();

        tracing::info!(%outcome, state = %final_state, entries = self.logs.len(), "Session finished");
        RunReport {
            state: self.state,
            outcome,
            logs: std::mem::take(&mut self.logs),
        }
    }

    /// Connect, authenticate and consume messages until a terminal outcome
    async fn stream(&mut self, connector: &dyn Connector) -> Streamed {
        self.transition(SessionState::Connecting);
        self.log(LogEntry::info(format!("Connecting to {}", self.url)));

        let mut transport = match connector.connect(&self.url, &self.token).await {
            Ok(transport) => transport,
            Err(e) => return Streamed::broken(self.fail(e)),
        };

        self.transition(SessionState::Authenticating);
        let auth = match serde_json::to_string(&AuthFrame { token: &self.token }) {
            Ok(auth) => auth,
            Err(e) => return Streamed::broken(self.fail(Error::Json(e))),
        };
        if let Err(e) = transport.send_text(auth).await {
            return Streamed::broken(self.fail(e));
        }
        self.log(LogEntry::info("Connected and token sent"));

        self.transition(SessionState::Streaming);
        loop {
            let frame = match transport.recv().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    let e = Error::Transport("connection ended without a close frame".into());
                    return Streamed::broken(self.fail(e));
                }
                Err(e) => return Streamed::broken(self.fail(e)),
            };

            let outcome = match frame {
                Frame::Text(text) => {
                    self.log(LogEntry::now(
                        LogStatus::Debug,
                        format!("Raw message received: {text}"),
                    ));
                    let classification = classify_frame(&text);
                    for entry in classification.entries {
                        self.log(entry);
                    }
                    match classification.next {
                        Next::Continue => continue,
                        Next::FailedByLog | Next::Terminal(TerminalStatus::Failed) => Outcome::Failed,
                        Next::Terminal(TerminalStatus::Completed) => Outcome::Completed,
                        Next::ProtocolViolation | Next::Malformed(_) => Outcome::ProtocolError,
                    }
                }
                Frame::Malformed(reason) => {
                    self.log(LogEntry::error(Error::MalformedResponse(reason).to_string()));
                    Outcome::ProtocolError
                }
                Frame::Close { code, reason } if code == Some(POLICY_VIOLATION) => {
                    let reason = if reason.is_empty() {
                        "credential refused by server".to_string()
                    } else {
                        reason
                    };
                    let outcome = self.fail(Error::AuthRejected(reason));
                    return Streamed {
                        outcome,
                        transport: Some(transport),
                        peer_closed: true,
                    };
                }
                Frame::Close { code, reason } => {
                    tracing::debug!(?code, %reason, "Close frame received");
                    self.log(LogEntry::info("Connection closed by server"));
                    return Streamed {
                        outcome: Outcome::ClosedByServer,
                        transport: Some(transport),
                        peer_closed: true,
                    };
                }
            };

            return Streamed {
                outcome,
                transport: Some(transport),
                peer_closed: false,
            };
        }
    }

    /// Record a timeout or cancellation; the transport was already dropped
    /// together with the `stream` future
    fn interrupted(&mut self, e: Error) -> Streamed {
        tracing::warn!("Session interrupted: {}", e);
        Streamed::broken(self.fail(e))
    }

    /// Run the close handshake if the transport is still usable
    ///
    /// Returns the terminal state for the session.
    async fn close(&mut self, streamed: Streamed, cancel: &CancellationToken) -> SessionState {
        let Streamed {
            outcome,
            transport,
            peer_closed,
        } = streamed;

        let Some(mut transport) = transport else {
            return outcome.terminal_state();
        };

        self.transition(SessionState::Closing);
        let result = tokio::select! {
            result = tokio::time::timeout(self.settings.close_timeout, transport.close()) => Some(result),
            () = cancel.cancelled() => None,
        };
        drop(transport);

        let error = match result {
            Some(Ok(Ok(()))) => None,
            Some(Ok(Err(e))) => Some(e),
            Some(Err(_)) => Some(Error::CloseFailed(format!(
                "no close acknowledgement within {} seconds",
                self.settings.close_timeout.as_secs()
            ))),
            None => {
                tracing::warn!("Close handshake cut short by abort");
                self.log(LogEntry::error(Error::Cancelled.to_string()));
                return SessionState::Failed;
            }
        };

        match error {
            None if peer_closed => outcome.terminal_state(),
            None => {
                self.log(LogEntry::info("Connection closed by client"));
                outcome.terminal_state()
            }
            // The peer already closed; a failing acknowledgement is expected
            Some(e) if peer_closed => {
                tracing::debug!("Close after peer close: {}", e);
                outcome.terminal_state()
            }
            Some(e) => {
                let message = match e {
                    Error::CloseFailed(_) => e.to_string(),
                    other => Error::CloseFailed(other.to_string()).to_string(),
                };
                self.log(LogEntry::error(message));
                SessionState::Failed
            }
        }
    }

    fn fail(&mut self, e: Error) -> Outcome {
        self.log(LogEntry::error(e.to_string()));
        Outcome::from_error(&e)
    }

    fn transition(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        tracing::debug!(from = %self.state, to = %state, "Session state change");
        self.state = state;
        let _ = self.events.send(SessionEvent::State(state));
    }

    fn log(&mut self, entry: LogEntry) {
        match entry.status {
            LogStatus::Error => tracing::warn!(message = %entry.message, "Run log"),
            LogStatus::Debug => tracing::debug!(message = %entry.message, "Run log"),
            _ => tracing::trace!(status = %entry.status, message = %entry.message, "Run log"),
        }
        let _ = self.events.send(SessionEvent::Log(entry.clone()));
        self.logs.push(entry);
    }
}
