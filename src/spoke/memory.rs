//! In-memory spoke used to drive hubs in tests

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;

use super::{closed_signal, MessageStream, Spoke, SpokeFactory, SpokeRole};
use crate::models::{CanonicalMessage, Endpoint, Protocol, TranslatorError, TranslatorResult};

/// The far side of a [`MemorySpoke`]
pub struct MemoryPeer {
    /// Messages pushed here come out of the spoke's receive stream
    pub inbound: mpsc::Sender<CanonicalMessage>,
    /// Messages sent through the spoke arrive here
    pub outbound: mpsc::Receiver<CanonicalMessage>,
}

pub struct MemorySpoke {
    protocol: Protocol,
    inbound: Mutex<Option<mpsc::Receiver<CanonicalMessage>>>,
    outbound: mpsc::Sender<CanonicalMessage>,
    closed: watch::Sender<bool>,
    is_closed: AtomicBool,
}

impl MemorySpoke {
    pub fn pair(protocol: Protocol) -> (Arc<MemorySpoke>, MemoryPeer) {
        let (inbound_tx, inbound_rx) = mpsc::channel(64);
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let (closed, _) = watch::channel(false);

        let spoke = Arc::new(MemorySpoke {
            protocol,
            inbound: Mutex::new(Some(inbound_rx)),
            outbound: outbound_tx,
            closed,
            is_closed: AtomicBool::new(false),
        });
        let peer = MemoryPeer {
            inbound: inbound_tx,
            outbound: outbound_rx,
        };
        (spoke, peer)
    }
}

#[async_trait]
impl Spoke for MemorySpoke {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn send(&self, message: CanonicalMessage) -> TranslatorResult<()> {
        if self.is_closed() {
            return Err(TranslatorError::Transport("spoke closed".to_string()));
        }
        self.outbound
            .send(message)
            .await
            .map_err(|_| TranslatorError::Transport("peer gone".to_string()))
    }

    fn receive(&self) -> TranslatorResult<MessageStream> {
        let rx = self
            .inbound
            .lock()
            .take()
            .ok_or_else(|| TranslatorError::Transport("receive stream already taken".to_string()))?;

        Ok(ReceiverStream::new(rx)
            .take_until(closed_signal(self.closed.subscribe()))
            .map(Ok)
            .boxed())
    }

    async fn close(&self) {
        if !self.is_closed.swap(true, Ordering::SeqCst) {
            self.closed.send_replace(true);
        }
    }

    fn is_closed(&self) -> bool {
        self.is_closed.load(Ordering::SeqCst)
    }
}

/// Factory that records the peers of every spoke it opens
pub struct MemorySpokeFactory {
    protocol: Protocol,
    fail_role: Option<&'static str>,
    pub opened: Mutex<Vec<(&'static str, Arc<MemorySpoke>, MemoryPeer)>>,
}

impl MemorySpokeFactory {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            fail_role: None,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Make every `open` for the given role ("consumer" or "producer") fail
    pub fn failing(protocol: Protocol, role: &'static str) -> Self {
        Self {
            fail_role: Some(role),
            ..Self::new(protocol)
        }
    }

    /// Remove and return the spoke and peer opened for `role` most recently
    pub fn take(&self, role: &str) -> Option<(Arc<MemorySpoke>, MemoryPeer)> {
        let mut opened = self.opened.lock();
        let idx = opened.iter().rposition(|(r, _, _)| *r == role)?;
        let (_, spoke, peer) = opened.remove(idx);
        Some((spoke, peer))
    }
}

#[async_trait]
impl SpokeFactory for MemorySpokeFactory {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    async fn open(&self, role: SpokeRole, endpoint: &Endpoint) -> TranslatorResult<Arc<dyn Spoke>> {
        let role = role.name();
        if self.fail_role == Some(role) {
            return Err(TranslatorError::connect_failed(endpoint.to_string(), "refused"));
        }
        let (spoke, peer) = MemorySpoke::pair(self.protocol);
        self.opened.lock().push((role, Arc::clone(&spoke), peer));
        Ok(spoke)
    }
}
