//! Common utilities shared by the compiler, API client and execution session

pub mod config;
pub mod error;
pub mod logging;
pub mod ordered;
pub mod paths;

pub use error::{Error, Result};

/// Wall-clock timestamp in the format used for run log entries
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}
