//! Service registry client
//!
//! The directory service contract is the [`DirectoryClient`] trait;
//! [`HttpDirectoryClient`] talks to a service registry over HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::models::{TranslatorError, TranslatorResult};

pub const REGISTER_URI: &str = "/serviceregistry/register";
pub const UNREGISTER_URI: &str = "/serviceregistry/unregister";

/// Provider system of a registered service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemRequest {
    pub system_name: String,
    pub address: String,
    pub port: u16,
}

/// Service registration payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRegistryRequest {
    pub service_definition: String,
    pub provider_system: SystemRequest,
    pub service_uri: String,
    /// `CERTIFICATE` or `NOT_SECURE`
    pub secure: String,
    pub interfaces: Vec<String>,
}

/// Identifies one registered service for withdrawal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnregisterRequest {
    pub system_name: String,
    pub address: String,
    pub port: u16,
    pub service_definition: String,
}

impl UnregisterRequest {
    fn query(&self) -> String {
        format!(
            "system_name={}&address={}&port={}&service_definition={}",
            urlencoding::encode(&self.system_name),
            urlencoding::encode(&self.address),
            self.port,
            urlencoding::encode(&self.service_definition)
        )
    }
}

/// Register and unregister calls of the directory service
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn register(&self, request: &ServiceRegistryRequest) -> TranslatorResult<()>;

    async fn unregister(&self, request: &UnregisterRequest) -> TranslatorResult<()>;
}

/// Directory client for an HTTP service registry
#[derive(Clone)]
pub struct HttpDirectoryClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpDirectoryClient {
    /// `base_url` is scheme, host and port of the registry, e.g. `https://10.0.0.2:8443`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> TranslatorResult<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn register(&self, request: &ServiceRegistryRequest) -> TranslatorResult<()> {
        let url = format!("{}{}", self.base_url, REGISTER_URI);

        let response = self
            .http_client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| TranslatorError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslatorError::Directory(format!(
                "Registration of '{}' failed: {} {}",
                request.service_definition, status, body
            )));
        }

        debug!(service = %request.service_definition, %status, "Service registered");
        Ok(())
    }

    async fn unregister(&self, request: &UnregisterRequest) -> TranslatorResult<()> {
        let url = format!("{}{}?{}", self.base_url, UNREGISTER_URI, request.query());

        let response = self
            .http_client
            .delete(&url)
            .send()
            .await
            .map_err(|e| TranslatorError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslatorError::Directory(format!(
                "Unregistration of '{}' failed: {}",
                request.service_definition, status
            )));
        }

        debug!(service = %request.service_definition, %status, "Service unregistered");
        Ok(())
    }
}
