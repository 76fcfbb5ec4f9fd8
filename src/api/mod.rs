//! Backend API: endpoint resolution, wire types and the HTTP client

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::ApiClient;
pub use endpoints::{EndpointResolver, EndpointTable};
pub use types::*;
