//! bddrun - compile BDD test plans into browser scripts and run them
//!
//! The library has three parts: the plan [`compiler`], endpoint resolution
//! and the HTTP client in [`api`], and the streaming [`execution`] session
//! that drives a remote runner over WebSocket.

pub mod api;
pub mod cli;
pub mod commands;
pub mod common;
pub mod compiler;
pub mod execution;

// Re-export commonly used types for tests
pub use common::{Error, Result};
