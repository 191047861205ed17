//! Endpoint model and resolution
//!
//! An endpoint is one side of a translation hub: a named system reachable at a
//! network address and speaking a known wire protocol.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::io;
use std::net::IpAddr;
use std::str::FromStr;

use super::{TranslatorError, TranslatorResult};

/// Wire protocols a spoke can speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Coap,
    Mqtt,
}

impl Protocol {
    /// Map an address scheme to a protocol and its security flag
    pub fn from_scheme(scheme: &str) -> Option<(Protocol, bool)> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" => Some((Protocol::Http, false)),
            "https" => Some((Protocol::Http, true)),
            "coap" => Some((Protocol::Coap, false)),
            "coaps" => Some((Protocol::Coap, true)),
            "mqtt" => Some((Protocol::Mqtt, false)),
            "mqtts" => Some((Protocol::Mqtt, true)),
            _ => None,
        }
    }

    /// Scheme used when addressing an endpoint of this protocol
    pub fn scheme(&self, secure: bool) -> &'static str {
        match (self, secure) {
            (Protocol::Http, false) => "http",
            (Protocol::Http, true) => "https",
            (Protocol::Coap, false) => "coap",
            (Protocol::Coap, true) => "coaps",
            (Protocol::Mqtt, false) => "mqtt",
            (Protocol::Mqtt, true) => "mqtts",
        }
    }

    /// Well-known port of the protocol
    pub fn default_port(&self, secure: bool) -> u16 {
        match (self, secure) {
            (Protocol::Http, false) => 80,
            (Protocol::Http, true) => 443,
            (Protocol::Coap, false) => 5683,
            (Protocol::Coap, true) => 5684,
            (Protocol::Mqtt, false) => 1883,
            (Protocol::Mqtt, true) => 8883,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scheme(false))
    }
}

impl FromStr for Protocol {
    type Err = TranslatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Protocol::from_scheme(s)
            .map(|(protocol, _)| protocol)
            .ok_or_else(|| TranslatorError::UnsupportedProtocol(s.to_string()))
    }
}

/// A validated system endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    /// System name
    pub name: String,
    /// Address as given by the caller
    pub address: String,
    /// Host name or IP literal (IPv6 without brackets)
    pub host: String,
    /// Explicit port, if the address carried one
    pub port: Option<u16>,
    /// Path component of the address, `/` when absent
    pub path: String,
    pub protocol: Protocol,
    /// True when the scheme asks for a secured transport
    pub secure: bool,
    /// True when the host is loopback or the unspecified address
    pub is_local: bool,
}

impl Endpoint {
    /// Parse an endpoint without touching the network.
    ///
    /// Only IP literals and `localhost` are checked for locality here; use
    /// [`resolve`] to also validate host names through DNS.
    pub fn parse(name: &str, address: &str) -> TranslatorResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TranslatorError::invalid_address(address, "system name is empty"));
        }

        let address = address.trim();
        let (scheme, _) = address.split_once("://").ok_or_else(|| {
            TranslatorError::UnsupportedProtocol(format!("missing protocol scheme in {}", address))
        })?;
        let (protocol, secure) = Protocol::from_scheme(scheme)
            .ok_or_else(|| TranslatorError::UnsupportedProtocol(scheme.to_string()))?;

        let url = reqwest::Url::parse(address)
            .map_err(|e| TranslatorError::invalid_address(address, e.to_string()))?;

        let host = url
            .host_str()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TranslatorError::invalid_address(address, "missing host"))?;

        let is_local = match host.parse::<IpAddr>() {
            Ok(ip) => is_local_ip(&ip),
            Err(_) => host.eq_ignore_ascii_case("localhost"),
        };

        let path = if url.path().is_empty() {
            "/".to_string()
        } else {
            url.path().to_string()
        };

        Ok(Self {
            name: name.to_string(),
            address: address.to_string(),
            host,
            port: url.port(),
            path,
            protocol,
            secure,
            is_local,
        })
    }

    /// Port to connect to, falling back to the protocol default
    pub fn effective_port(&self) -> u16 {
        self.port
            .unwrap_or_else(|| self.protocol.default_port(self.secure))
    }

    /// Base URL of the endpoint, e.g. `http://10.0.0.5:8080/api`
    pub fn base_url(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        format!(
            "{}://{}:{}{}",
            self.protocol.scheme(self.secure),
            host,
            self.effective_port(),
            self.path.trim_end_matches('/')
        )
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.base_url())
    }
}

/// Resolve a `(name, address)` pair into an endpoint usable for translation.
///
/// Fails with `UnsupportedProtocol` when the scheme is missing or unknown,
/// `InvalidAddress` when the address or host cannot be resolved, and
/// `LocalAddress` when the host is (or resolves to) loopback or the
/// unspecified address.
pub async fn resolve(name: &str, address: &str) -> TranslatorResult<Endpoint> {
    resolve_with(name, address, system_lookup).await
}

async fn system_lookup(host: String, port: u16) -> io::Result<Vec<IpAddr>> {
    Ok(tokio::net::lookup_host((host.as_str(), port))
        .await?
        .map(|addr| addr.ip())
        .collect())
}

/// [`resolve`] with a pluggable host lookup
async fn resolve_with<F, Fut>(name: &str, address: &str, lookup: F) -> TranslatorResult<Endpoint>
where
    F: FnOnce(String, u16) -> Fut,
    Fut: Future<Output = io::Result<Vec<IpAddr>>>,
{
    let mut endpoint = Endpoint::parse(name, address)?;

    if !endpoint.is_local && endpoint.host.parse::<IpAddr>().is_err() {
        let resolved = lookup(endpoint.host.clone(), endpoint.effective_port())
            .await
            .map_err(|e| TranslatorError::invalid_address(address, e.to_string()))?;

        if resolved.is_empty() {
            return Err(TranslatorError::invalid_address(address, "host has no addresses"));
        }
        endpoint.is_local = resolved.iter().all(is_local_ip);
    }

    if endpoint.is_local {
        return Err(TranslatorError::local_address(address));
    }

    Ok(endpoint)
}

/// Loopback or unspecified, including IPv4-mapped IPv6 forms such as `::ffff:127.0.0.1`
fn is_local_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_unspecified(),
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(
            v6.is_loopback() || v6.is_unspecified(),
            |v4| v4.is_loopback() || v4.is_unspecified(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_parse_http_endpoint() {
        let ep = Endpoint::parse("sensorA", "http://10.0.0.5:8080").unwrap();
        assert_eq!(ep.name, "sensorA");
        assert_eq!(ep.host, "10.0.0.5");
        assert_eq!(ep.port, Some(8080));
        assert_eq!(ep.protocol, Protocol::Http);
        assert!(!ep.secure);
        assert!(!ep.is_local);
        assert_eq!(ep.base_url(), "http://10.0.0.5:8080");
    }

    #[test]
    fn test_parse_non_special_schemes() {
        let ep = Endpoint::parse("meter", "coap://10.1.2.3/sensors/temp").unwrap();
        assert_eq!(ep.protocol, Protocol::Coap);
        assert_eq!(ep.host, "10.1.2.3");
        assert_eq!(ep.effective_port(), 5683);
        assert_eq!(ep.path, "/sensors/temp");

        let ep = Endpoint::parse("broker", "mqtts://10.1.2.4").unwrap();
        assert_eq!(ep.protocol, Protocol::Mqtt);
        assert!(ep.secure);
        assert_eq!(ep.effective_port(), 8883);
    }

    #[test]
    fn test_parse_ipv6() {
        let ep = Endpoint::parse("v6", "https://[2001:db8::1]:8443/x").unwrap();
        assert_eq!(ep.host, "2001:db8::1");
        assert_eq!(ep.base_url(), "https://[2001:db8::1]:8443/x");
    }

    #[test]
    fn test_local_detection() {
        for address in [
            "http://127.0.0.1:8080",
            "http://localhost:8080",
            "http://0.0.0.0",
            "http://[::1]:80",
            "http://[::]:80",
            "http://[::ffff:127.0.0.1]:8080",
            "http://[::ffff:0.0.0.0]:8080",
        ] {
            let ep = Endpoint::parse("a", address).unwrap();
            assert!(ep.is_local, "{} should be local", address);
        }

        let ep = Endpoint::parse("a", "http://[::ffff:10.0.0.5]:8080").unwrap();
        assert!(!ep.is_local);
    }

    #[test]
    fn test_missing_or_unknown_scheme() {
        assert!(matches!(
            Endpoint::parse("a", "10.0.0.5:8080"),
            Err(TranslatorError::UnsupportedProtocol(_))
        ));
        assert!(matches!(
            Endpoint::parse("a", "ftp://10.0.0.5"),
            Err(TranslatorError::UnsupportedProtocol(_))
        ));
    }

    #[test]
    fn test_invalid_address() {
        assert!(matches!(
            Endpoint::parse("a", "http://"),
            Err(TranslatorError::InvalidAddress { .. })
        ));
        assert!(matches!(
            Endpoint::parse("a", "http://10.0.0.5:99999"),
            Err(TranslatorError::InvalidAddress { .. })
        ));
        assert!(matches!(
            Endpoint::parse("", "http://10.0.0.5"),
            Err(TranslatorError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_protocol_from_str() {
        assert_eq!(Protocol::from_str("MQTT").unwrap(), Protocol::Mqtt);
        assert_eq!(Protocol::Coap.to_string(), "coap");
        assert!(Protocol::from_str("amqp").is_err());
    }

    #[tokio::test]
    async fn test_resolve_rejects_local() {
        let err = resolve("a", "http://127.0.0.1:8080").await.unwrap_err();
        assert!(matches!(err, TranslatorError::LocalAddress { .. }));

        let err = resolve("a", "http://localhost:8080").await.unwrap_err();
        assert!(matches!(err, TranslatorError::LocalAddress { .. }));

        for address in ["http://[::ffff:127.0.0.1]:8080", "http://[::ffff:0.0.0.0]:8080"] {
            let err = resolve("a", address).await.unwrap_err();
            assert!(matches!(err, TranslatorError::LocalAddress { .. }), "{} accepted", address);
        }
    }

    fn lookup_to(
        ips: Vec<IpAddr>,
    ) -> impl FnOnce(String, u16) -> std::future::Ready<io::Result<Vec<IpAddr>>> {
        move |_, _| std::future::ready(Ok(ips))
    }

    #[tokio::test]
    async fn test_resolve_hostname_to_loopback() {
        let loopback = vec![IpAddr::V4(Ipv4Addr::LOCALHOST), "::1".parse().unwrap()];
        let err = resolve_with("a", "http://sensor.internal:8080", lookup_to(loopback))
            .await
            .unwrap_err();
        assert!(matches!(err, TranslatorError::LocalAddress { .. }));

        let mapped = vec!["::ffff:127.0.0.1".parse().unwrap()];
        let err = resolve_with("a", "http://sensor.internal:8080", lookup_to(mapped))
            .await
            .unwrap_err();
        assert!(matches!(err, TranslatorError::LocalAddress { .. }));
    }

    #[tokio::test]
    async fn test_resolve_hostname_with_routable_address() {
        let mixed = vec![IpAddr::V4(Ipv4Addr::LOCALHOST), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))];
        let ep = resolve_with("a", "http://sensor.internal:8080", lookup_to(mixed))
            .await
            .unwrap();
        assert!(!ep.is_local);
        assert_eq!(ep.host, "sensor.internal");

        let err = resolve_with("a", "http://sensor.internal", lookup_to(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, TranslatorError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn test_resolve_lookup_sees_effective_port() {
        let err = resolve_with("a", "https://sensor.internal", |host: String, port| async move {
            assert_eq!(host, "sensor.internal");
            assert_eq!(port, 443);
            Err(io::Error::new(io::ErrorKind::NotFound, "no such host"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, TranslatorError::InvalidAddress { .. }));
    }

    #[tokio::test]
    async fn test_resolve_system_lookup_of_loopback_name() {
        let ips = system_lookup("localhost".to_string(), 80).await.unwrap();
        assert!(!ips.is_empty());
        assert!(ips.iter().all(is_local_ip));
    }

    #[tokio::test]
    async fn test_resolve_ip_literal() {
        let ep = resolve("dashboard1", "http://10.0.0.9:9090").await.unwrap();
        assert_eq!(ep.effective_port(), 9090);
    }
}
