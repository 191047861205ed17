//! A translation hub: one consumer spoke, one producer spoke, and the two
//! forwarding paths between them.
//!
//! Both paths run as tasks on a [`JoinSet`] owned by a supervisor task. The
//! first path to end, for whatever reason, takes the whole hub down: the
//! supervisor moves the hub to `CLOSING`, aborts the other path, closes both
//! spokes, releases the listen port and settles in `CLOSED`. An explicit
//! [`Hub::close`] goes through the same teardown.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::ports::PortLease;
use crate::metrics;
use crate::models::{
    CloseReason, Direction, Endpoint, HubAccess, HubEvent, HubId, HubInfo, HubState,
    TranslatorError, TranslatorResult,
};
use crate::spoke::{Spoke, SpokeCatalog, SpokeFactory, SpokeRole};

/// A live bridge between a consumer and a producer
pub struct Hub {
    id: HubId,
    consumer: Endpoint,
    producer: Endpoint,
    port: u16,
    opened_at: DateTime<Utc>,
    state: watch::Receiver<HubState>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl Hub {
    /// Open both spokes and start forwarding.
    ///
    /// If either spoke fails to open within `connect_timeout` the other one is
    /// closed again, the lease is released and no hub is returned.
    pub async fn open(
        id: HubId,
        consumer: Endpoint,
        producer: Endpoint,
        mut lease: PortLease,
        catalog: &SpokeCatalog,
        connect_timeout: Duration,
        events: broadcast::Sender<HubEvent>,
    ) -> TranslatorResult<Hub> {
        let consumer_factory = catalog.factory(consumer.protocol)?;
        let producer_factory = catalog.factory(producer.protocol)?;

        let listener = lease
            .take_listener()
            .ok_or_else(|| TranslatorError::Internal("listen socket already taken".to_string()))?;

        let consumer_spoke = open_spoke(
            consumer_factory.as_ref(),
            SpokeRole::Consumer(listener),
            &consumer,
            connect_timeout,
        )
        .await?;

        let producer_spoke = match open_spoke(
            producer_factory.as_ref(),
            SpokeRole::Producer,
            &producer,
            connect_timeout,
        )
        .await
        {
            Ok(spoke) => spoke,
            Err(e) => {
                consumer_spoke.close().await;
                return Err(e);
            }
        };

        Ok(Hub::start(
            id,
            consumer,
            producer,
            consumer_spoke,
            producer_spoke,
            lease,
            events,
        ))
    }

    /// Start forwarding between two already opened spokes
    pub fn start(
        id: HubId,
        consumer: Endpoint,
        producer: Endpoint,
        consumer_spoke: Arc<dyn Spoke>,
        producer_spoke: Arc<dyn Spoke>,
        lease: PortLease,
        events: broadcast::Sender<HubEvent>,
    ) -> Hub {
        let port = lease.port();
        let (state_tx, state_rx) = watch::channel(HubState::Created);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        state_tx.send_replace(HubState::Active);
        metrics::record_hub_opened();
        info!(
            hub = %id,
            port,
            consumer = %consumer,
            producer = %producer,
            "Hub active"
        );
        let _ = events.send(HubEvent::Opened { id, port });

        tokio::spawn(supervise(
            id,
            consumer_spoke,
            producer_spoke,
            state_tx,
            shutdown_rx,
            lease,
            events,
        ));

        Hub {
            id,
            consumer,
            producer,
            port,
            opened_at: Utc::now(),
            state: state_rx,
            shutdown: Mutex::new(Some(shutdown_tx)),
        }
    }

    pub fn id(&self) -> HubId {
        self.id
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> HubState {
        *self.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.state() == HubState::Active
    }

    pub fn is_closed(&self) -> bool {
        self.state() == HubState::Closed
    }

    pub fn access(&self, outgoing_ip: &str) -> HubAccess {
        HubAccess::new(self.id, outgoing_ip, self.port)
    }

    pub fn info(&self) -> HubInfo {
        HubInfo {
            id: self.id,
            consumer_name: self.consumer.name.clone(),
            consumer_protocol: self.consumer.protocol,
            producer_name: self.producer.name.clone(),
            producer_protocol: self.producer.protocol,
            port: self.port,
            state: self.state(),
            opened_at: self.opened_at,
        }
    }

    /// Tear the hub down and wait until it is `CLOSED`. Idempotent.
    pub async fn close(&self) {
        let shutdown = self.shutdown.lock().take();
        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(());
        }
        self.wait_closed().await;
    }

    /// Wait until the hub reaches `CLOSED`
    pub async fn wait_closed(&self) {
        let mut state = self.state.clone();
        let _ = state.wait_for(|s| *s == HubState::Closed).await;
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("id", &self.id)
            .field("port", &self.port)
            .field("state", &self.state())
            .finish()
    }
}

async fn open_spoke(
    factory: &dyn SpokeFactory,
    role: SpokeRole,
    endpoint: &Endpoint,
    connect_timeout: Duration,
) -> TranslatorResult<Arc<dyn Spoke>> {
    let role_name = role.name();
    match tokio::time::timeout(connect_timeout, factory.open(role, endpoint)).await {
        Ok(Ok(spoke)) => Ok(spoke),
        Ok(Err(e @ TranslatorError::ConnectFailed { .. })) => Err(e),
        Ok(Err(e)) => Err(TranslatorError::connect_failed(endpoint.to_string(), e.to_string())),
        Err(_) => Err(TranslatorError::connect_failed(
            endpoint.to_string(),
            format!("{} spoke did not open within {:?}", role_name, connect_timeout),
        )),
    }
}

async fn supervise(
    id: HubId,
    consumer: Arc<dyn Spoke>,
    producer: Arc<dyn Spoke>,
    state: watch::Sender<HubState>,
    mut shutdown: oneshot::Receiver<()>,
    lease: PortLease,
    events: broadcast::Sender<HubEvent>,
) {
    let mut paths = JoinSet::new();
    paths.spawn(forward(
        Direction::ConsumerToProducer,
        Arc::clone(&consumer),
        Arc::clone(&producer),
    ));
    paths.spawn(forward(
        Direction::ProducerToConsumer,
        Arc::clone(&producer),
        Arc::clone(&consumer),
    ));

    // First terminal event wins; a dropped Hub handle counts as a request
    let reason = tokio::select! {
        Some(joined) = paths.join_next() => match joined {
            Ok(reason) => reason,
            Err(e) => CloseReason::PathFailed { error: e.to_string() },
        },
        _ = &mut shutdown => CloseReason::Requested,
    };

    state.send_replace(HubState::Closing);
    paths.abort_all();
    tokio::join!(consumer.close(), producer.close());
    while paths.join_next().await.is_some() {}
    drop(lease);
    state.send_replace(HubState::Closed);

    metrics::record_hub_closed();
    match &reason {
        CloseReason::Requested | CloseReason::SourceClosed { .. } => {
            info!(hub = %id, %reason, "Hub closed")
        }
        _ => warn!(hub = %id, %reason, "Hub closed"),
    }
    let _ = events.send(HubEvent::Closed { id, reason });
}

/// Move messages from `source` to `sink` until the source ends or a send fails
async fn forward(direction: Direction, source: Arc<dyn Spoke>, sink: Arc<dyn Spoke>) -> CloseReason {
    let mut messages = match source.receive() {
        Ok(messages) => messages,
        Err(e) => {
            return CloseReason::Transport {
                direction,
                error: e.to_string(),
            }
        }
    };

    while let Some(item) = messages.next().await {
        let message = match item {
            Ok(message) => message,
            Err(e) => {
                return CloseReason::Transport {
                    direction,
                    error: e.to_string(),
                }
            }
        };

        debug!(%direction, bytes = message.len(), "Forwarding message");
        if let Err(e) = sink.send(message).await {
            return CloseReason::Transport {
                direction,
                error: e.to_string(),
            };
        }
        metrics::record_message_forwarded(direction);
    }

    CloseReason::SourceClosed { direction }
}
