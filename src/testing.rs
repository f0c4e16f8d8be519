//! In-memory connector and async test helpers.

// ============================================================================
// Imports
// ============================================================================

use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{sink, stream};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use url::Url;

use crate::error::{Error, Result};

use crate::transport::connector::{Connector, FrameSink, FrameStream};

// ============================================================================
// Helpers
// ============================================================================

/// Installs a test subscriber once; honours `RUST_LOG`.
pub(crate) fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Polls `condition` in 1ms steps until it holds.
///
/// Sleeping (rather than yielding) lets paused-clock tests auto-advance
/// through reconnect and backoff timers.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..120_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached within 120s");
}

// ============================================================================
// MockPeer
// ============================================================================

type Inbound = mpsc::UnboundedSender<Result<String>>;

/// Server side of one mock transport.
#[derive(Clone)]
pub(crate) struct MockPeer {
    inbound: Arc<Mutex<Option<Inbound>>>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl MockPeer {
    /// Delivers a text frame. Returns `false` if the client side is gone.
    pub(crate) fn push(&self, text: &str) -> bool {
        self.inbound
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(Ok(text.to_string())).is_ok())
    }

    /// Delivers a transport error.
    pub(crate) fn push_error(&self, message: &str) -> bool {
        self.inbound
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(Err(Error::connection(message))).is_ok())
    }

    /// Closes the transport from the server side.
    pub(crate) fn close(&self) {
        self.inbound.lock().take();
    }

    /// Frames the client has sent.
    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    /// Returns `true` once the client side dropped its stream.
    pub(crate) fn is_disconnected(&self) -> bool {
        self.inbound
            .lock()
            .as_ref()
            .is_none_or(mpsc::UnboundedSender::is_closed)
    }
}

// ============================================================================
// MockConnector
// ============================================================================

#[derive(Default)]
struct MockState {
    urls: Vec<Url>,
    refuse: bool,
    hang: bool,
    peers: Vec<MockPeer>,
}

/// Scripted connector recording every attempt.
#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    state: Arc<Mutex<MockState>>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent attempts fail immediately.
    pub(crate) fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse = refuse;
    }

    /// Makes subsequent attempts never complete.
    pub(crate) fn hang_connections(&self, hang: bool) {
        self.state.lock().hang = hang;
    }

    /// Number of connect attempts so far.
    pub(crate) fn attempts(&self) -> usize {
        self.state.lock().urls.len()
    }

    /// URLs of every attempt, in order.
    pub(crate) fn urls(&self) -> Vec<Url> {
        self.state.lock().urls.clone()
    }

    /// Number of transports successfully opened.
    pub(crate) fn peer_count(&self) -> usize {
        self.state.lock().peers.len()
    }

    /// Server side of the `index`-th opened transport.
    pub(crate) fn peer(&self, index: usize) -> MockPeer {
        self.state.lock().peers[index].clone()
    }
}

enum Plan {
    Refuse,
    Hang,
    Open(MockPeer, mpsc::UnboundedReceiver<Result<String>>),
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &Url) -> Result<(FrameSink, FrameStream)> {
        let plan = {
            let mut state = self.state.lock();
            state.urls.push(url.clone());

            if state.refuse {
                Plan::Refuse
            } else if state.hang {
                Plan::Hang
            } else {
                let (tx, rx) = mpsc::unbounded_channel();
                let peer = MockPeer {
                    inbound: Arc::new(Mutex::new(Some(tx))),
                    sent: Arc::new(Mutex::new(Vec::new())),
                };
                state.peers.push(peer.clone());
                Plan::Open(peer, rx)
            }
        };

        match plan {
            Plan::Refuse => Err(Error::connection("connection refused")),
            Plan::Hang => {
                std::future::pending::<()>().await;
                Err(Error::ConnectionClosed)
            }
            Plan::Open(peer, mut rx) => {
                let outbound = sink::unfold(peer.sent, |sent, frame: String| async move {
                    sent.lock().push(frame);
                    Ok::<_, Error>(sent)
                });
                let inbound = stream::poll_fn(move |cx| rx.poll_recv(cx));
                Ok((Box::pin(outbound), Box::pin(inbound)))
            }
        }
    }
}
