//! Translator Hub - protocol translation broker
//!
//! Bridges a consumer and a producer that speak different wire protocols:
//! - Endpoint resolution and validation
//! - Protocol adapters ("spokes") behind one trait
//! - Hubs forwarding canonical messages in both directions
//! - A registry that reuses and tears down hubs
//! - Service registry integration and a REST front-end

pub mod api;
pub mod config;
pub mod discovery;
pub mod metrics;
pub mod models;
pub mod services;
pub mod spoke;
pub mod translator;

// Re-export commonly used types
pub use config::Settings;
pub use discovery::{DirectoryClient, ExternalEntity, HttpDirectoryClient, RegistrationAdapter};
pub use models::{
    CanonicalMessage, Endpoint, HubAccess, HubId, HubState, Protocol, TranslatorError,
    TranslatorResult, TranslatorSetup,
};
pub use services::TranslatorService;
pub use spoke::{Spoke, SpokeCatalog, SpokeFactory};
pub use translator::{Hub, HubRegistry, PortAllocator};

/// Version of the translator hub
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
