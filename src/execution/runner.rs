//! Starts execution sessions, one at a time

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::api::endpoints::{keys, params};
use crate::api::types::ScriptKind;
use crate::api::EndpointResolver;
use crate::common::config::Config;
use crate::common::{Error, Result};

use super::session::{self, SessionHandle, SessionSettings};
use super::transport::{Connector, WsConnector};

/// Parameters of one streaming run
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub test_case_id: String,
    pub script_kind: ScriptKind,
    /// Bearer credential, sent in the upgrade request and as the first frame
    pub token: String,
}

/// Entry point for streaming runs
///
/// At most one session is active per runner. Starting another while one is
/// still running fails with [`Error::SessionAlreadyActive`]; the gate opens
/// again once the active session has released its resources.
pub struct Runner {
    resolver: EndpointResolver,
    settings: SessionSettings,
    connector: Arc<dyn Connector>,
    active: Arc<AtomicBool>,
}

impl Runner {
    pub fn new(
        resolver: EndpointResolver,
        settings: SessionSettings,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            resolver,
            settings,
            connector,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runner using the WebSocket connector and the configured timeouts
    pub fn from_config(config: &Config, resolver: EndpointResolver) -> Self {
        let settings = SessionSettings {
            run_timeout: config.execution.run_timeout(),
            close_timeout: config.execution.close_timeout(),
        };
        Self::new(resolver, settings, Arc::new(WsConnector))
    }

    /// Whether a session currently holds the runner
    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Start a session; must be called from within a tokio runtime
    pub fn start(&self, request: RunRequest) -> Result<SessionHandle> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::SessionAlreadyActive);
        }

        let url = match self.resolver.ws_url(
            keys::EXECUTE_WS,
            &[
                (params::TEST_CASE_ID, request.test_case_id.as_str()),
                (params::SCRIPT_TYPE, request.script_kind.as_str()),
            ],
        ) {
            Ok(url) => url,
            Err(e) => {
                self.active.store(false, Ordering::Release);
                return Err(e);
            }
        };

        tracing::info!(test_case = %request.test_case_id, kind = %request.script_kind, "Starting execution session");
        Ok(session::spawn(
            url,
            request.token,
            self.settings,
            self.connector.clone(),
            self.active.clone(),
        ))
    }
}
