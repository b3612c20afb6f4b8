//! DNS resolution of string endpoints.
//!
//! # Responsibilities
//! - Expand `scheme://host[:port]/path` and `host:port` endpoints to addresses
//! - Retry each lookup a bounded number of times
//! - Keep the order of first appearance and drop duplicates

use std::net::{IpAddr, SocketAddr};

use futures_util::future::BoxFuture;
use tokio::net::lookup_host;
use url::Url;

use crate::discovery::{ResolveError, Resolver};

/// Default lookup attempts per endpoint.
pub const DEFAULT_RESOLVE_ATTEMPTS: u32 = 3;

/// Resolver backed by the system resolver (`tokio::net::lookup_host`).
#[derive(Debug, Clone)]
pub struct DnsResolver {
    attempts: u32,
}

impl DnsResolver {
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts: attempts.max(1),
        }
    }

    async fn resolve_one(&self, endpoint: &str) -> Result<Vec<String>, ResolveError> {
        let target = Target::parse(endpoint)?;
        let mut last_error = String::new();

        for attempt in 1..=self.attempts {
            match lookup_host((target.host(), target.port())).await {
                Ok(addrs) => {
                    let mut resolved = Vec::new();
                    for addr in addrs {
                        let rendered = target.render(addr.ip())?;
                        if !resolved.contains(&rendered) {
                            resolved.push(rendered);
                        }
                    }
                    tracing::debug!(endpoint = %endpoint, addresses = ?resolved, "Resolved endpoint");
                    return Ok(resolved);
                }
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint, attempt, error = %e, "DNS lookup failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(ResolveError::Lookup {
            endpoint: endpoint.to_string(),
            attempts: self.attempts,
            message: last_error,
        })
    }
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLVE_ATTEMPTS)
    }
}

impl Resolver<String> for DnsResolver {
    fn resolve<'a>(&'a self, endpoints: &'a [String]) -> BoxFuture<'a, Result<Vec<String>, ResolveError>> {
        Box::pin(async move {
            let mut addresses: Vec<String> = Vec::new();
            for endpoint in endpoints {
                for address in self.resolve_one(endpoint).await? {
                    if !addresses.contains(&address) {
                        addresses.push(address);
                    }
                }
            }
            if addresses.is_empty() {
                return Err(ResolveError::NoAddresses);
            }
            Ok(addresses)
        })
    }
}

/// What to look up, and how to print the result.
#[derive(Debug)]
enum Target {
    Url { url: Url, host: String, port: u16 },
    HostPort { host: String, port: u16 },
}

impl Target {
    fn parse(endpoint: &str) -> Result<Self, ResolveError> {
        let invalid = || ResolveError::InvalidEndpoint(endpoint.to_string());

        // "example.com:80" parses as a URL with scheme "example.com" and no host.
        if let Ok(url) = Url::parse(endpoint) {
            if let Some(host) = url.host_str() {
                let port = url.port_or_known_default().ok_or_else(invalid)?;
                let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
                return Ok(Self::Url { host, port, url });
            }
        }

        let (host, port) = endpoint.rsplit_once(':').ok_or_else(invalid)?;
        let port: u16 = port.parse().map_err(|_| invalid())?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid());
        }
        Ok(Self::HostPort {
            host: host.to_string(),
            port,
        })
    }

    fn host(&self) -> &str {
        match self {
            Self::Url { host, .. } | Self::HostPort { host, .. } => host,
        }
    }

    fn port(&self) -> u16 {
        match self {
            Self::Url { port, .. } | Self::HostPort { port, .. } => *port,
        }
    }

    fn render(&self, ip: IpAddr) -> Result<String, ResolveError> {
        match self {
            Self::Url { url, .. } => {
                let mut resolved = url.clone();
                resolved
                    .set_ip_host(ip)
                    .map_err(|_| ResolveError::InvalidEndpoint(url.to_string()))?;
                Ok(resolved.to_string())
            }
            Self::HostPort { port, .. } => Ok(SocketAddr::new(ip, *port).to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ip_literals_resolve_to_themselves() {
        let resolver = DnsResolver::default();
        let endpoints = vec!["127.0.0.1:8080".to_string(), "[::1]:9000".to_string()];
        let resolved = resolver.resolve(&endpoints).await.unwrap();
        assert_eq!(resolved, vec!["127.0.0.1:8080", "[::1]:9000"]);
    }

    #[tokio::test]
    async fn test_url_keeps_scheme_and_path() {
        let resolver = DnsResolver::default();
        let endpoints = vec!["http://127.0.0.1:8080/api".to_string()];
        let resolved = resolver.resolve(&endpoints).await.unwrap();
        assert_eq!(resolved, vec!["http://127.0.0.1:8080/api"]);
    }

    #[tokio::test]
    async fn test_duplicates_collapse() {
        let resolver = DnsResolver::default();
        let endpoints = vec!["127.0.0.1:80".to_string(), "127.0.0.1:80".to_string()];
        let resolved = resolver.resolve(&endpoints).await.unwrap();
        assert_eq!(resolved, vec!["127.0.0.1:80"]);
    }

    #[tokio::test]
    async fn test_missing_port_is_rejected() {
        let resolver = DnsResolver::default();
        let endpoints = vec!["no-port-here".to_string()];
        let err = resolver.resolve(&endpoints).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_target_parsing() {
        let target = Target::parse("https://example.com/path").unwrap();
        assert_eq!(target.host(), "example.com");
        assert_eq!(target.port(), 443);

        let target = Target::parse("example.com:8443").unwrap();
        assert_eq!(target.host(), "example.com");
        assert_eq!(target.port(), 8443);

        assert!(Target::parse(":80").is_err());
    }
}
