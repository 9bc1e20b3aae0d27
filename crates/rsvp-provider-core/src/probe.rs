//! Connectivity probes
//!
//! Lightweight reachability checks against the endpoint a provider
//! configuration declares.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::defaults::defaults_for;
use crate::error::{RegistryError, RegistryResult};
use crate::types::ProviderConfiguration;

/// Network endpoint resolved from a configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Resolve the endpoint declared by a configuration
    ///
    /// Looks at `url`/`endpoint`/`uri` first, then `host` + `port`, falling
    /// back to the type's default port. Returns `None` for providers with no
    /// network endpoint (file-backed stores, for instance).
    pub fn from_configuration(config: &ProviderConfiguration) -> Option<Self> {
        let default_port = defaults_for(&config.provider_type).default_port;

        for key in ["url", "endpoint", "uri"] {
            if let Some(raw) = config.get_str(key) {
                if let Some(endpoint) = Self::parse(raw, default_port) {
                    return Some(endpoint);
                }
            }
        }

        let host = config.get_str("host")?.trim();
        if host.is_empty() {
            return None;
        }
        let port = config
            .get_u64("port")
            .and_then(|p| u16::try_from(p).ok())
            .or(default_port)?;

        Some(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Parse `scheme://user@host:port/path` style addresses
    pub fn parse(raw: &str, default_port: Option<u16>) -> Option<Self> {
        let (scheme, rest) = match raw.split_once("://") {
            Some((scheme, rest)) => (Some(scheme.to_ascii_lowercase()), rest),
            None => (None, raw),
        };
        let authority = rest.split(['/', '?', '#']).next()?;
        let authority = authority.rsplit('@').next()?;
        if authority.is_empty() {
            return None;
        }

        let scheme_port = match scheme.as_deref() {
            Some("https") | Some("wss") => Some(443),
            Some("http") | Some("ws") => Some(80),
            _ => None,
        };

        match authority.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => Some(Self {
                host: host.to_string(),
                port: port.parse().ok()?,
            }),
            _ => Some(Self {
                host: authority.to_string(),
                port: scheme_port.or(default_port)?,
            }),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Result of a successful reachability check
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConnectivitySample {
    pub address: Option<String>,
    pub latency_ms: u64,
    pub reachable: bool,
}

/// Reachability check used by the test-connectivity step
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn probe(&self, config: &ProviderConfiguration) -> RegistryResult<ConnectivitySample>;
}

/// TCP connect probe
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(Duration::from_millis(5000))
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn probe(&self, config: &ProviderConfiguration) -> RegistryResult<ConnectivitySample> {
        let Some(endpoint) = Endpoint::from_configuration(config) else {
            tracing::debug!(
                provider = %config.name,
                "No network endpoint declared, skipping reachability check"
            );
            return Ok(ConnectivitySample {
                address: None,
                latency_ms: 0,
                reachable: true,
            });
        };

        let address = endpoint.address();
        let start = Instant::now();
        match timeout(self.timeout, tokio::net::TcpStream::connect(&address)).await {
            Ok(Ok(_)) => Ok(ConnectivitySample {
                address: Some(address),
                latency_ms: start.elapsed().as_millis() as u64,
                reachable: true,
            }),
            Ok(Err(e)) => Err(RegistryError::Unavailable(format!(
                "TCP connection to {} failed: {}",
                address, e
            ))),
            Err(_) => Err(RegistryError::Timeout(format!(
                "TCP connection to {} timed out after {}ms",
                address,
                self.timeout.as_millis()
            ))),
        }
    }
}

/// Deterministic probe that never touches the network
#[derive(Debug, Clone)]
pub struct StaticProbe {
    latency_ms: u64,
    failure: Option<String>,
}

impl StaticProbe {
    /// Probe that always reports the endpoint reachable
    pub fn reachable(latency_ms: u64) -> Self {
        Self {
            latency_ms,
            failure: None,
        }
    }

    /// Probe that always reports the endpoint unreachable
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            latency_ms: 0,
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn probe(&self, config: &ProviderConfiguration) -> RegistryResult<ConnectivitySample> {
        if let Some(message) = &self.failure {
            return Err(RegistryError::Unavailable(message.clone()));
        }
        Ok(ConnectivitySample {
            address: Endpoint::from_configuration(config).map(|e| e.address()),
            latency_ms: self.latency_ms,
            reachable: true,
        })
    }
}
