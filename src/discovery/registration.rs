//! Advertises bridged capabilities in the service registry.
//!
//! Every service of an [`ExternalEntity`] becomes one registry entry whose
//! provider is this node. Services are registered independently: a failing
//! service is logged and skipped, the rest of the entity still goes through.
//! Whatever was registered is withdrawn again by [`RegistrationAdapter::unregister_all`].

use futures::future::join_all;
use parking_lot::Mutex;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, warn};

use super::client::{DirectoryClient, ServiceRegistryRequest, SystemRequest, UnregisterRequest};
use super::entity::ExternalEntity;
use crate::metrics;

pub const HTTP_SECURE_JSON: &str = "HTTP-SECURE-JSON";
pub const HTTP_INSECURE_JSON: &str = "HTTP-INSECURE-JSON";
pub const SECURITY_CERTIFICATE: &str = "CERTIFICATE";
pub const SECURITY_NOT_SECURE: &str = "NOT_SECURE";

/// How this node presents itself to the service registry
#[derive(Debug, Clone)]
pub struct RegistrationConfig {
    /// Prefix of every service definition, e.g. `fiware`
    pub source: String,
    /// Address providers are reachable at
    pub node_address: String,
    /// Port providers are reachable at
    pub node_port: u16,
    /// Mirrors this node's TLS setting
    pub secure: bool,
}

/// Outcome of a bulk register or unregister
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationReport {
    pub succeeded: usize,
    pub failed: usize,
}

impl std::ops::AddAssign for RegistrationReport {
    fn add_assign(&mut self, other: Self) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

/// Registers entity services and withdraws them at shutdown
pub struct RegistrationAdapter {
    client: Arc<dyn DirectoryClient>,
    config: RegistrationConfig,
    registered: Mutex<Vec<UnregisterRequest>>,
}

impl RegistrationAdapter {
    pub fn new(client: Arc<dyn DirectoryClient>, config: RegistrationConfig) -> Self {
        Self {
            client,
            config,
            registered: Mutex::new(Vec::new()),
        }
    }

    pub fn service_definition(&self, entity_type: &str, service: &str) -> String {
        format!("{} {} - {}", self.config.source, entity_type, service)
    }

    /// Callable URI of one service, rooted at this node
    pub fn service_uri(&self, entity_id: &str, service: &str) -> String {
        let scheme = if self.config.secure { "https" } else { "http" };
        let host = match self.config.node_address.parse::<IpAddr>() {
            Ok(IpAddr::V6(v6)) => format!("[{}]", v6),
            _ => self.config.node_address.clone(),
        };
        format!(
            "{}://{}:{}/translator/plugin/service/{}/{}",
            scheme, host, self.config.node_port, entity_id, service
        )
    }

    pub fn registration_request(&self, entity: &ExternalEntity, service: &str) -> ServiceRegistryRequest {
        let (secure, interface) = if self.config.secure {
            (SECURITY_CERTIFICATE, HTTP_SECURE_JSON)
        } else {
            (SECURITY_NOT_SECURE, HTTP_INSECURE_JSON)
        };

        ServiceRegistryRequest {
            service_definition: self.service_definition(&entity.entity_type, service),
            provider_system: SystemRequest {
                system_name: entity.id.clone(),
                address: self.config.node_address.clone(),
                port: self.config.node_port,
            },
            service_uri: self.service_uri(&entity.id, service),
            secure: secure.to_string(),
            interfaces: vec![interface.to_string()],
        }
    }

    fn unregister_request(&self, entity: &ExternalEntity, service: &str) -> UnregisterRequest {
        UnregisterRequest {
            system_name: entity.id.clone(),
            address: self.config.node_address.clone(),
            port: self.config.node_port,
            service_definition: self.service_definition(&entity.entity_type, service),
        }
    }

    /// Register every service of `entity`, concurrently
    pub async fn register_entity(&self, entity: &ExternalEntity) -> RegistrationReport {
        info!(entity = %entity.id, services = entity.services.len(), "Registering entity services");

        let attempts = entity.services.iter().map(|service| async move {
            let request = self.registration_request(entity, service);
            match self.client.register(&request).await {
                Ok(()) => Some(self.unregister_request(entity, service)),
                Err(e) => {
                    warn!(entity = %entity.id, service = %service, error = %e, "Service registration failed");
                    metrics::record_registration_failure();
                    None
                }
            }
        });
        let results = join_all(attempts).await;

        let mut report = RegistrationReport::default();
        let mut registered = self.registered.lock();
        for result in results {
            match result {
                Some(done) => {
                    if !registered.contains(&done) {
                        registered.push(done);
                    }
                    report.succeeded += 1;
                }
                None => report.failed += 1,
            }
        }
        report
    }

    pub async fn register_all(&self, entities: &[ExternalEntity]) -> RegistrationReport {
        let mut report = RegistrationReport::default();
        for entity in entities {
            report += self.register_entity(entity).await;
        }
        if !entities.is_empty() {
            info!(succeeded = report.succeeded, failed = report.failed, "Entity registration finished");
        }
        report
    }

    /// Withdraw everything registered so far. Single attempt per service;
    /// failures are logged and dropped.
    pub async fn unregister_all(&self) -> RegistrationReport {
        let pending = std::mem::take(&mut *self.registered.lock());
        if pending.is_empty() {
            return RegistrationReport::default();
        }
        info!(services = pending.len(), "Unregistering services");

        let results = join_all(pending.iter().map(|request| async move {
            let result = self.client.unregister(request).await;
            if let Err(e) = &result {
                warn!(
                    system = %request.system_name,
                    service = %request.service_definition,
                    error = %e,
                    "Service unregistration failed"
                );
                metrics::record_registration_failure();
            }
            result.is_ok()
        }))
        .await;

        let succeeded = results.iter().filter(|ok| **ok).count();
        RegistrationReport {
            succeeded,
            failed: results.len() - succeeded,
        }
    }

    /// Number of services currently advertised
    pub fn registered_count(&self) -> usize {
        self.registered.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TranslatorError, TranslatorResult};
    use async_trait::async_trait;

    /// Directory double; calls for services named in `failing` are rejected
    #[derive(Default)]
    struct RecordingDirectory {
        failing: Vec<&'static str>,
        registered: Mutex<Vec<ServiceRegistryRequest>>,
        unregistered: Mutex<Vec<UnregisterRequest>>,
    }

    impl RecordingDirectory {
        fn failing(services: &[&'static str]) -> Self {
            Self {
                failing: services.to_vec(),
                ..Default::default()
            }
        }

        fn rejects(&self, definition: &str) -> bool {
            self.failing.iter().any(|s| definition.ends_with(&format!("- {}", s)))
        }
    }

    #[async_trait]
    impl DirectoryClient for RecordingDirectory {
        async fn register(&self, request: &ServiceRegistryRequest) -> TranslatorResult<()> {
            if self.rejects(&request.service_definition) {
                return Err(TranslatorError::Directory("rejected".to_string()));
            }
            self.registered.lock().push(request.clone());
            Ok(())
        }

        async fn unregister(&self, request: &UnregisterRequest) -> TranslatorResult<()> {
            self.unregistered.lock().push(request.clone());
            if request.service_definition.ends_with("- pressure") {
                return Err(TranslatorError::Network("registry unreachable".to_string()));
            }
            Ok(())
        }
    }

    fn config(secure: bool) -> RegistrationConfig {
        RegistrationConfig {
            source: "fiware".to_string(),
            node_address: "10.0.0.1".to_string(),
            node_port: 8462,
            secure,
        }
    }

    fn room() -> ExternalEntity {
        ExternalEntity::new(
            "urn:room:1",
            "Room",
            vec!["temperature".to_string(), "pressure".to_string(), "humidity".to_string()],
        )
    }

    #[test]
    fn test_request_synthesis() {
        let adapter = RegistrationAdapter::new(Arc::new(RecordingDirectory::default()), config(false));
        let request = adapter.registration_request(&room(), "temperature");

        assert_eq!(request.service_definition, "fiware Room - temperature");
        assert_eq!(
            request.service_uri,
            "http://10.0.0.1:8462/translator/plugin/service/urn:room:1/temperature"
        );
        assert_eq!(request.provider_system.system_name, "urn:room:1");
        assert_eq!(request.provider_system.port, 8462);
        assert_eq!(request.secure, "NOT_SECURE");
        assert_eq!(request.interfaces, vec!["HTTP-INSECURE-JSON"]);
    }

    #[test]
    fn test_security_mirrors_tls() {
        let mut secure = config(true);
        secure.node_address = "2001:db8::7".to_string();
        let adapter = RegistrationAdapter::new(Arc::new(RecordingDirectory::default()), secure);
        let request = adapter.registration_request(&room(), "humidity");

        assert_eq!(request.secure, "CERTIFICATE");
        assert_eq!(request.interfaces, vec!["HTTP-SECURE-JSON"]);
        assert!(request.service_uri.starts_with("https://[2001:db8::7]:8462/"));
    }

    #[tokio::test]
    async fn test_failing_service_does_not_abort_entity() {
        let directory = Arc::new(RecordingDirectory::failing(&["pressure"]));
        let adapter = RegistrationAdapter::new(directory.clone(), config(false));

        let report = adapter.register_entity(&room()).await;

        assert_eq!(report, RegistrationReport { succeeded: 2, failed: 1 });
        assert_eq!(directory.registered.lock().len(), 2);
        assert_eq!(adapter.registered_count(), 2);
    }

    #[tokio::test]
    async fn test_unregister_all_is_best_effort() {
        let directory = Arc::new(RecordingDirectory::default());
        let adapter = RegistrationAdapter::new(directory.clone(), config(false));
        let other = ExternalEntity::new("urn:door:4", "Door", vec!["state".to_string()]);

        let report = adapter.register_all(&[room(), other]).await;
        assert_eq!(report.succeeded, 4);

        let report = adapter.unregister_all().await;
        assert_eq!(report, RegistrationReport { succeeded: 3, failed: 1 });
        assert_eq!(directory.unregistered.lock().len(), 4);
        assert_eq!(adapter.registered_count(), 0);

        // Nothing left to withdraw, and no retries of the failed one
        assert_eq!(adapter.unregister_all().await, RegistrationReport::default());
        assert_eq!(directory.unregistered.lock().len(), 4);
    }

    #[tokio::test]
    async fn test_unregister_matches_registration() {
        let directory = Arc::new(RecordingDirectory::default());
        let adapter = RegistrationAdapter::new(directory.clone(), config(false));
        let entity = ExternalEntity::new("urn:room:1", "Room", vec!["temperature".to_string()]);

        adapter.register_entity(&entity).await;
        adapter.register_entity(&entity).await;
        assert_eq!(adapter.registered_count(), 1);

        adapter.unregister_all().await;
        let withdrawn = directory.unregistered.lock()[0].clone();
        assert_eq!(
            withdrawn,
            UnregisterRequest {
                system_name: "urn:room:1".to_string(),
                address: "10.0.0.1".to_string(),
                port: 8462,
                service_definition: "fiware Room - temperature".to_string(),
            }
        );
    }
}
