//! Registry of live translation hubs

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use super::hub::Hub;
use super::ports::PortAllocator;
use crate::metrics;
use crate::models::{Endpoint, HubAccess, HubEvent, HubId, HubInfo, TranslatorError, TranslatorResult};
use crate::spoke::SpokeCatalog;

const EVENT_CAPACITY: usize = 256;

/// Owns every hub of the process.
///
/// Lookups, get-or-create and removals are serialised on one async lock. The
/// lock is held across hub construction, which also serialises port
/// allocation.
pub struct HubRegistry {
    hubs: Mutex<HashMap<HubId, Arc<Hub>>>,
    ports: PortAllocator,
    spokes: SpokeCatalog,
    connect_timeout: Duration,
    events: broadcast::Sender<HubEvent>,
}

impl HubRegistry {
    /// Create an empty registry
    pub fn new(ports: PortAllocator, spokes: SpokeCatalog, connect_timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            hubs: Mutex::new(HashMap::new()),
            ports,
            spokes,
            connect_timeout,
            events,
        }
    }

    /// Return the active hub for the pair, or build a new one
    pub async fn get_or_create(
        &self,
        producer: Endpoint,
        consumer: Endpoint,
        outgoing_ip: &str,
    ) -> TranslatorResult<HubAccess> {
        let id = HubId::derive(&producer.name, &consumer.name);
        let mut hubs = self.hubs.lock().await;
        prune_closed(&mut hubs);

        if let Some(existing) = hubs.get(&id) {
            if existing.is_active() {
                info!(hub = %id, "Hub already exists");
                metrics::record_hub_reused();
                return Ok(existing.access(outgoing_ip));
            }
        }
        if let Some(stale) = hubs.remove(&id) {
            debug!(hub = %id, state = %stale.state(), "Replacing hub that is no longer active");
            stale.close().await;
        }

        let lease = self.ports.allocate()?;
        info!(
            hub = %id,
            consumer_protocol = %consumer.protocol,
            producer_protocol = %producer.protocol,
            port = lease.port(),
            "Creating a new hub"
        );

        let hub = Hub::open(
            id,
            consumer,
            producer,
            lease,
            &self.spokes,
            self.connect_timeout,
            self.events.clone(),
        )
        .await?;

        let access = hub.access(outgoing_ip);
        hubs.insert(id, Arc::new(hub));
        metrics::set_hubs_active(hubs.len() as i64);
        Ok(access)
    }

    /// Snapshot of every tracked hub
    pub async fn list(&self, outgoing_ip: &str) -> Vec<HubAccess> {
        let mut hubs = self.hubs.lock().await;
        prune_closed(&mut hubs);
        hubs.values().map(|hub| hub.access(outgoing_ip)).collect()
    }

    /// Look up one hub
    pub async fn get(&self, id: HubId, outgoing_ip: &str) -> TranslatorResult<HubAccess> {
        let mut hubs = self.hubs.lock().await;
        prune_closed(&mut hubs);
        hubs.get(&id)
            .map(|hub| hub.access(outgoing_ip))
            .ok_or_else(|| TranslatorError::not_found(id.to_string()))
    }

    /// Diagnostic view of every tracked hub
    pub async fn infos(&self) -> Vec<HubInfo> {
        let mut hubs = self.hubs.lock().await;
        prune_closed(&mut hubs);
        hubs.values().map(|hub| hub.info()).collect()
    }

    pub async fn info(&self, id: HubId) -> TranslatorResult<HubInfo> {
        let mut hubs = self.hubs.lock().await;
        prune_closed(&mut hubs);
        hubs.get(&id)
            .map(|hub| hub.info())
            .ok_or_else(|| TranslatorError::not_found(id.to_string()))
    }

    /// Close and evict one hub. Returns false if it was not tracked.
    pub async fn remove(&self, id: HubId) -> bool {
        let removed = {
            let mut hubs = self.hubs.lock().await;
            let removed = hubs.remove(&id);
            metrics::set_hubs_active(hubs.len() as i64);
            removed
        };

        match removed {
            Some(hub) => {
                hub.close().await;
                info!(hub = %id, "Hub removed");
                true
            }
            None => false,
        }
    }

    /// Close and evict every hub
    pub async fn remove_all(&self) -> usize {
        let drained: Vec<Arc<Hub>> = {
            let mut hubs = self.hubs.lock().await;
            let drained = hubs.drain().map(|(_, hub)| hub).collect();
            metrics::set_hubs_active(0);
            drained
        };

        let count = drained.len();
        join_all(drained.iter().map(|hub| hub.close())).await;
        if count > 0 {
            info!(count, "All hubs removed");
        }
        count
    }

    /// Number of tracked hubs, including ones still closing
    pub async fn len(&self) -> usize {
        self.hubs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Hub lifecycle notifications
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }

    pub fn spokes(&self) -> &SpokeCatalog {
        &self.spokes
    }
}

impl std::fmt::Debug for HubRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubRegistry")
            .field("ports", &self.ports.range())
            .field("spokes", &self.spokes)
            .finish()
    }
}

/// Drop hubs that shut themselves down after a transport failure
fn prune_closed(hubs: &mut HashMap<HubId, Arc<Hub>>) {
    let before = hubs.len();
    hubs.retain(|_, hub| !hub.is_closed());
    if hubs.len() != before {
        debug!(pruned = before - hubs.len(), "Pruned closed hubs");
        metrics::set_hubs_active(hubs.len() as i64);
    }
}
