//! Translator hub configuration settings

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::discovery::ExternalEntity;

/// Main configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub translator: TranslatorSettings,
    #[serde(default)]
    pub tls: TlsSettings,
    pub service_registry: ServiceRegistrySettings,
    pub metrics: MetricsSettings,
}

/// REST server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,
    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8462
}

fn default_workers() -> usize {
    num_cpus::get()
}

/// Hub settings
#[derive(Debug, Clone, Deserialize)]
pub struct TranslatorSettings {
    /// Interface the hubs' listen ports are bound on
    #[serde(default = "default_host")]
    pub bind_host: String,
    /// First listen port handed to hubs
    #[serde(default = "default_port_range_start")]
    pub port_range_start: u16,
    /// Last listen port handed to hubs (inclusive)
    #[serde(default = "default_port_range_end")]
    pub port_range_end: u16,
    /// Bound on opening both spokes of a hub
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// How long a consumer request waits for the producer's reply
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
    /// Address reported to callers in hub access records; detected when unset
    pub outgoing_ip: Option<String>,
}

fn default_port_range_start() -> u16 {
    40000
}

fn default_port_range_end() -> u16 {
    40999
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_reply_timeout_ms() -> u64 {
    30000
}

impl TranslatorSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

/// TLS settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsSettings {
    /// Advertise services as certificate-secured and talk HTTPS to the registry
    #[serde(default)]
    pub enabled: bool,
}

/// Service registry settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceRegistrySettings {
    /// Register configured entities at startup
    #[serde(default)]
    pub enabled: bool,
    /// Service registry host
    #[serde(default = "default_registry_address")]
    pub address: String,
    /// Service registry port
    #[serde(default = "default_registry_port")]
    pub port: u16,
    /// Prefix of the synthesized service definitions
    #[serde(default = "default_source")]
    pub source: String,
    /// Request timeout in milliseconds
    #[serde(default = "default_registry_timeout_ms")]
    pub timeout_ms: u64,
    /// Entities whose services are advertised
    #[serde(default)]
    pub entities: Vec<ExternalEntity>,
}

fn default_registry_address() -> String {
    "127.0.0.1".to_string()
}

fn default_registry_port() -> u16 {
    8443
}

fn default_source() -> String {
    "fiware".to_string()
}

fn default_registry_timeout_ms() -> u64 {
    10000
}

impl ServiceRegistrySettings {
    /// Base URL of the registry, using HTTPS when TLS is enabled
    pub fn base_url(&self, tls: &TlsSettings) -> String {
        let scheme = if tls.enabled { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.address, self.port)
    }
}

/// Metrics settings
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Metrics endpoint path
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Settings {
    /// Load settings from file and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load settings from a specific config file path (without extension)
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref();

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.http_port", default_http_port() as i64)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("translator.bind_host", default_host())?
            .set_default("translator.port_range_start", default_port_range_start() as i64)?
            .set_default("translator.port_range_end", default_port_range_end() as i64)?
            .set_default("translator.connect_timeout_ms", default_connect_timeout_ms() as i64)?
            .set_default("translator.reply_timeout_ms", default_reply_timeout_ms() as i64)?
            .set_default("tls.enabled", false)?
            .set_default("service_registry.enabled", false)?
            .set_default("service_registry.address", default_registry_address())?
            .set_default("service_registry.port", default_registry_port() as i64)?
            .set_default("service_registry.source", default_source())?
            .set_default("service_registry.timeout_ms", default_registry_timeout_ms() as i64)?
            .set_default("metrics.enabled", true)?
            .set_default("metrics.path", default_metrics_path())?
            // Add config file if it exists
            .add_source(File::with_name(config_path.to_str().unwrap_or("config")).required(false))
            // Add environment variables with prefix TRANSLATOR_HUB__
            .add_source(Environment::with_prefix("TRANSLATOR_HUB").separator("__"));

        builder.build()?.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: ServerSettings {
                host: default_host(),
                http_port: default_http_port(),
                workers: default_workers(),
            },
            translator: TranslatorSettings {
                bind_host: default_host(),
                port_range_start: default_port_range_start(),
                port_range_end: default_port_range_end(),
                connect_timeout_ms: default_connect_timeout_ms(),
                reply_timeout_ms: default_reply_timeout_ms(),
                outgoing_ip: None,
            },
            tls: TlsSettings::default(),
            service_registry: ServiceRegistrySettings {
                enabled: false,
                address: default_registry_address(),
                port: default_registry_port(),
                source: default_source(),
                timeout_ms: default_registry_timeout_ms(),
                entities: Vec::new(),
            },
            metrics: MetricsSettings {
                enabled: true,
                path: default_metrics_path(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.http_port, 8462);
        assert_eq!(settings.translator.port_range_start, 40000);
        assert_eq!(settings.translator.port_range_end, 40999);
        assert_eq!(settings.translator.connect_timeout(), Duration::from_secs(5));
        assert!(!settings.tls.enabled);
        assert!(!settings.service_registry.enabled);
        assert_eq!(settings.service_registry.source, "fiware");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let settings = Settings::load_from("does-not-exist/translator").unwrap();
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.translator.reply_timeout_ms, 30000);
        assert!(settings.translator.outgoing_ip.is_none());
        assert!(settings.service_registry.entities.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[translator]
port_range_start = 41000
port_range_end = 41010
outgoing_ip = "10.0.0.1"

[tls]
enabled = true

[service_registry]
enabled = true
address = "10.0.0.2"

[[service_registry.entities]]
id = "urn:room:1"
type = "Room"
services = ["temperature", "humidity"]
"#
        )
        .unwrap();

        let settings = Settings::load_from(dir.path().join("hub")).unwrap();
        assert_eq!(settings.translator.port_range_start, 41000);
        assert_eq!(settings.translator.outgoing_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(
            settings.service_registry.base_url(&settings.tls),
            "https://10.0.0.2:8443"
        );
        assert_eq!(settings.service_registry.entities.len(), 1);
        assert_eq!(settings.service_registry.entities[0].entity_type, "Room");
    }
}
