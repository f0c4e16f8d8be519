//! Transport connector seam.
//!
//! A [`Connector`] opens one underlying transport and hands back its two
//! halves: a sink for outbound text frames and a stream of inbound text
//! frames. The stream ending means the transport closed.
//!
//! [`WebSocketConnector`] is the production implementation over
//! `tokio-tungstenite`.

// ============================================================================
// Imports
// ============================================================================

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt, stream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Outbound half of a transport.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;

/// Inbound half of a transport.
///
/// `Err` items are transport errors; the stream ending means the transport
/// closed.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

// ============================================================================
// Connector
// ============================================================================

/// Opens transports for a connection.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Opens one transport to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be established.
    async fn connect(&self, url: &Url) -> Result<(FrameSink, FrameStream)>;
}

// ============================================================================
// WebSocketConnector
// ============================================================================

/// Connector over `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Creates a new WebSocket connector.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &Url) -> Result<(FrameSink, FrameStream)> {
        let (ws_stream, response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| Error::connection(format!("WebSocket handshake failed: {e}")))?;

        debug!(url = %url, status = %response.status(), "WebSocket handshake completed");

        let (ws_write, ws_read) = ws_stream.split();

        let sink = ws_write
            .sink_map_err(Error::from)
            .with(|text: String| async move { Ok::<_, Error>(Message::Text(text.into())) });

        Ok((Box::pin(sink), Box::pin(text_frames(ws_read))))
    }
}

/// Maps raw WebSocket messages to text frames.
///
/// Close frames end the stream. A read error is yielded once, then the
/// stream ends.
fn text_frames<S>(ws_read: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Send
        + Unpin,
{
    stream::unfold(Some(ws_read), |state| async move {
        let mut ws_read = state?;
        loop {
            match ws_read.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some((Ok(text.as_str().to_owned()), Some(ws_read)));
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "WebSocket closed by remote");
                    return None;
                }
                Some(Ok(other)) => {
                    // Binary, Ping, Pong
                    trace!(len = other.len(), "Ignoring non-text frame");
                }
                Some(Err(e)) => return Some((Err(Error::from(e)), None)),
                None => return None,
            }
        }
    })
}

// ============================================================================
// Tests
// ============================================================================
