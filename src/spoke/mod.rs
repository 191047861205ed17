//! Spokes: protocol adapters attached to either side of a hub.
//!
//! A hub never talks a wire protocol itself. It reads [`CanonicalMessage`]s
//! from one spoke's receive stream and writes them through the other spoke's
//! `send`. Each wire protocol provides a [`SpokeFactory`] that opens spokes in
//! the consumer role (accepting the consumer's traffic on the hub's listen
//! port) or the producer role (originating traffic towards the producer).
//!
//! - [`http`] – the HTTP adapter.

pub mod http;
#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;

use crate::models::{CanonicalMessage, Endpoint, Protocol, TranslatorError, TranslatorResult};

pub use http::{HttpSpokeConfig, HttpSpokeFactory};

/// Lazy, finite sequence of messages read from a spoke
pub type MessageStream = BoxStream<'static, TranslatorResult<CanonicalMessage>>;

/// Every protocol adapter must implement this trait.
///
/// # Contract
///
/// * `send` – writes one message to the wire; fails with
///   [`TranslatorError::Transport`] on write failure or once closed.
/// * `receive` – hands out the inbound message stream. The stream ends when
///   the underlying connection closes. It can be taken only once.
/// * `close` – releases sockets and handles. Idempotent; any in-flight `send`
///   or pending `receive` must complete promptly afterwards.
///
/// Spokes never retry.
#[async_trait]
pub trait Spoke: Send + Sync {
    fn protocol(&self) -> Protocol;

    async fn send(&self, message: CanonicalMessage) -> TranslatorResult<()>;

    fn receive(&self) -> TranslatorResult<MessageStream>;

    async fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Side of the hub a spoke is opened for
#[derive(Debug)]
pub enum SpokeRole {
    /// Faces the consumer; carries the hub's bound listen socket
    Consumer(TcpListener),
    /// Faces the producer
    Producer,
}

impl SpokeRole {
    pub fn name(&self) -> &'static str {
        match self {
            SpokeRole::Consumer(_) => "consumer",
            SpokeRole::Producer => "producer",
        }
    }
}

/// Opens spokes for one wire protocol
#[async_trait]
pub trait SpokeFactory: Send + Sync {
    fn protocol(&self) -> Protocol;

    async fn open(&self, role: SpokeRole, endpoint: &Endpoint) -> TranslatorResult<Arc<dyn Spoke>>;
}

/// Table of spoke factories, keyed by protocol
#[derive(Clone, Default)]
pub struct SpokeCatalog {
    factories: HashMap<Protocol, Arc<dyn SpokeFactory>>,
}

impl SpokeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any previous one for the same protocol
    pub fn register(&mut self, factory: Arc<dyn SpokeFactory>) {
        self.factories.insert(factory.protocol(), factory);
    }

    pub fn with(mut self, factory: Arc<dyn SpokeFactory>) -> Self {
        self.register(factory);
        self
    }

    pub fn factory(&self, protocol: Protocol) -> TranslatorResult<Arc<dyn SpokeFactory>> {
        self.factories.get(&protocol).cloned().ok_or_else(|| {
            TranslatorError::UnsupportedProtocol(format!("no spoke available for {}", protocol))
        })
    }

    pub fn supports(&self, protocol: Protocol) -> bool {
        self.factories.contains_key(&protocol)
    }

    pub fn protocols(&self) -> Vec<Protocol> {
        self.factories.keys().copied().collect()
    }
}

/// Completes once the watched close flag turns true
pub(crate) async fn closed_signal(mut closed: tokio::sync::watch::Receiver<bool>) {
    let _ = closed.wait_for(|c| *c).await;
}

impl std::fmt::Debug for SpokeCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpokeCatalog")
            .field("protocols", &self.protocols())
            .finish()
    }
}
