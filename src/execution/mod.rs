//! Streaming execution against the remote runner
//!
//! [`Runner`] starts at most one [`session`] at a time. Each session talks to
//! the runner through a [`transport::Transport`] and turns every inbound
//! message into run-log entries with [`classify`].

pub mod classify;
pub mod runner;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod scripted;

pub use runner::{RunRequest, Runner};
pub use session::{Outcome, RunReport, SessionEvent, SessionHandle, SessionSettings, SessionState};
pub use transport::{Connector, Frame, Transport, WsConnector};
