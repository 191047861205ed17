//! Translator service
//!
//! Boundary facade for creating, listing and removing translation hubs.
//! Addresses are resolved and validated here; hub bookkeeping is left to the
//! [`HubRegistry`].

use std::sync::Arc;
use tracing::{debug, info};

use crate::models::{resolve, HubAccess, HubEvent, HubId, HubInfo, TranslatorResult, TranslatorSetup};
use crate::translator::HubRegistry;

/// Creates and manages translation hubs
#[derive(Clone)]
pub struct TranslatorService {
    registry: Arc<HubRegistry>,
}

impl TranslatorService {
    pub fn new(registry: Arc<HubRegistry>) -> Self {
        Self { registry }
    }

    /// Bridge the consumer and producer of `setup`, reusing a live hub for the
    /// same name pair.
    ///
    /// Both addresses must resolve to non-local hosts; nothing is created
    /// otherwise.
    pub async fn create_translation_hub(
        &self,
        setup: TranslatorSetup,
        outgoing_ip: &str,
    ) -> TranslatorResult<HubAccess> {
        let consumer = resolve(&setup.consumer_name, &setup.consumer_address).await?;
        let producer = resolve(&setup.producer_name, &setup.producer_address).await?;
        debug!(consumer = %consumer, producer = %producer, "Endpoints resolved");

        self.registry.get_or_create(producer, consumer, outgoing_ip).await
    }

    pub async fn list_hubs(&self, outgoing_ip: &str) -> Vec<HubAccess> {
        self.registry.list(outgoing_ip).await
    }

    pub async fn get_hub(&self, id: HubId, outgoing_ip: &str) -> TranslatorResult<HubAccess> {
        self.registry.get(id, outgoing_ip).await
    }

    pub async fn hub_info(&self, id: HubId) -> TranslatorResult<HubInfo> {
        self.registry.info(id).await
    }

    /// Tear one hub down. Unknown ids are not an error.
    pub async fn remove_hub(&self, id: HubId) -> bool {
        self.registry.remove(id).await
    }

    pub async fn remove_all_hubs(&self) -> usize {
        let removed = self.registry.remove_all().await;
        info!(removed, "Translator hubs shut down");
        removed
    }

    pub async fn hub_count(&self) -> usize {
        self.registry.len().await
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<HubEvent> {
        self.registry.subscribe()
    }

    pub fn registry(&self) -> &Arc<HubRegistry> {
        &self.registry
    }
}
