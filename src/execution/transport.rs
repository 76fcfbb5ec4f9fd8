//! Streaming transport to the remote runner
//!
//! The session talks to the runner through the [`Transport`] trait so the
//! state machine can be driven by the real WebSocket connection or by a
//! scripted stand-in. [`WsConnector`] opens the real connection with
//! `tokio-tungstenite`.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::common::{Error, Result};

/// Close code a server uses to reject the credential (policy violation)
pub const POLICY_VIOLATION: u16 = 1008;

/// An inbound frame, reduced to what the session cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete text message
    Text(String),
    /// A data message that could not be read as text
    Malformed(String),
    /// The peer started the close handshake
    Close { code: Option<u16>, reason: String },
}

/// One open bidirectional connection
#[async_trait]
pub trait Transport: Send {
    /// Send one text message
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Wait for the next frame; `Ok(None)` means the stream ended
    async fn recv(&mut self) -> Result<Option<Frame>>;

    /// Run the graceful close handshake
    async fn close(&mut self) -> Result<()>;
}

/// Opens transports to a URL, presenting a bearer credential
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url, token: &str) -> Result<Box<dyn Transport>>;
}

/// Connector for `ws://` and `wss://` endpoints
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url, token: &str) -> Result<Box<dyn Transport>> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| Error::AuthRejected(format!("credential is not a valid header: {e}")))?;
        request.headers_mut().insert("Authorization", bearer);

        let (stream, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(connect_error)?;
        tracing::debug!(status = %response.status(), "WebSocket handshake complete");

        Ok(Box::new(WsTransport { stream }))
    }
}

fn connect_error(e: tungstenite::Error) -> Error {
    match e {
        tungstenite::Error::Http(response)
            if matches!(
                response.status(),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
            ) =>
        {
            Error::AuthRejected(format!("server answered {}", response.status()))
        }
        tungstenite::Error::Http(response) => {
            Error::ConnectionFailed(format!("server answered {}", response.status()))
        }
        other => Error::ConnectionFailed(other.to_string()),
    }
}

fn binary_frame(bytes: Vec<u8>) -> Frame {
    match String::from_utf8(bytes) {
        Ok(text) => Frame::Text(text),
        Err(e) => Frame::Malformed(format!("binary message is not UTF-8 ({})", e.utf8_error())),
    }
}

/// A live WebSocket connection
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Option<Frame>> {
        loop {
            let message = match self.stream.next().await {
                None => return Ok(None),
                Some(Err(tungstenite::Error::ConnectionClosed)) => return Ok(None),
                Some(Err(e)) => return Err(Error::Transport(e.to_string())),
                Some(Ok(message)) => message,
            };

            match message {
                Message::Text(text) => return Ok(Some(Frame::Text(text))),
                Message::Binary(bytes) => return Ok(Some(binary_frame(bytes))),
                Message::Close(frame) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.into_owned()),
                        None => (None, String::new()),
                    };
                    return Ok(Some(Frame::Close { code, reason }));
                }
                // Pings are answered by tungstenite on the next read/write
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        let frame = tungstenite::protocol::CloseFrame {
            code: CloseCode::Normal,
            reason: "Client closing".into(),
        };
        match self.stream.close(Some(frame)).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => {}
            Err(e) => return Err(Error::CloseFailed(e.to_string())),
        }

        // Drain until the peer acknowledges the close
        while let Some(message) = self.stream.next().await {
            match message {
                Ok(_) => {}
                Err(tungstenite::Error::ConnectionClosed) => break,
                Err(e) => return Err(Error::CloseFailed(e.to_string())),
            }
        }
        Ok(())
    }
}
