//! In-memory transport for driving sessions in tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::common::{Error, Result};

use super::transport::{Connector, Frame, Transport};

/// What the test side can observe about the transport
#[derive(Default)]
pub struct Probe {
    pub sent: Mutex<Vec<String>>,
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub drops: AtomicUsize,
}

impl Probe {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

/// How the scripted connector answers `connect`
pub enum ConnectBehavior {
    Accept,
    Refuse(fn() -> Error),
    /// Never completes
    Hang,
}

/// How the scripted transport answers `close`
#[derive(Clone, Copy)]
pub enum CloseBehavior {
    Acknowledge,
    Fail,
    /// Never completes
    Hang,
}

pub struct ScriptedConnector {
    behavior: ConnectBehavior,
    inbound: Mutex<Option<mpsc::UnboundedReceiver<Result<Frame>>>>,
    close: CloseBehavior,
    probe: Arc<Probe>,
}

/// Feeds frames to the transport the connector hands out
pub type FrameFeed = mpsc::UnboundedSender<Result<Frame>>;

impl ScriptedConnector {
    pub fn new(behavior: ConnectBehavior) -> (Arc<Self>, FrameFeed, Arc<Probe>) {
        Self::build(behavior, CloseBehavior::Acknowledge)
    }

    /// A connector whose transport answers `close` as given
    pub fn with_close(close: CloseBehavior) -> (Arc<Self>, FrameFeed, Arc<Probe>) {
        Self::build(ConnectBehavior::Accept, close)
    }

    fn build(behavior: ConnectBehavior, close: CloseBehavior) -> (Arc<Self>, FrameFeed, Arc<Probe>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let probe = Arc::new(Probe::default());
        let connector = Arc::new(Self {
            behavior,
            inbound: Mutex::new(Some(rx)),
            close,
            probe: probe.clone(),
        });
        (connector, tx, probe)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, _url: &Url, _token: &str) -> Result<Box<dyn Transport>> {
        self.probe.connects.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            ConnectBehavior::Accept => {}
            ConnectBehavior::Refuse(error) => return Err(error()),
            ConnectBehavior::Hang => std::future::pending::<()>().await,
        }
        let inbound = self
            .inbound
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or_else(|| Error::ConnectionFailed("scripted transport already used".into()))?;
        Ok(Box::new(ScriptedTransport {
            inbound,
            close: self.close,
            probe: self.probe.clone(),
        }))
    }
}

pub struct ScriptedTransport {
    inbound: mpsc::UnboundedReceiver<Result<Frame>>,
    close: CloseBehavior,
    probe: Arc<Probe>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        if let Ok(mut sent) = self.probe.sent.lock() {
            sent.push(text);
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Frame>> {
        match self.inbound.recv().await {
            Some(frame) => frame.map(Some),
            // Feed dropped: behave like a silent peer
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        match self.close {
            CloseBehavior::Acknowledge => Ok(()),
            CloseBehavior::Fail => Err(Error::CloseFailed("peer reset during close".into())),
            CloseBehavior::Hang => std::future::pending().await,
        }
    }
}

impl Drop for ScriptedTransport {
    fn drop(&mut self) {
        self.probe.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Shorthand for a text frame
pub fn text(json: &str) -> Result<Frame> {
    Ok(Frame::Text(json.to_string()))
}
