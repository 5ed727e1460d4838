//! Lookup of the IP currently published in DNS.

use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use std::net::IpAddr;

/// Read-only view of what DNS currently answers for a name.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PublishedIp: Send + Sync {
    /// Resolve `fqdn` to a single IP string.
    async fn lookup(&self, fqdn: &str) -> Result<String>;
}

/// Resolver backed by the operating system's resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl SystemResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PublishedIp for SystemResolver {
    async fn lookup(&self, fqdn: &str) -> Result<String> {
        let addrs: Vec<IpAddr> = tokio::net::lookup_host((fqdn, 0))
            .await
            .map_err(|e| DdnsError::Dns(format!("{}: {}", fqdn, e)))?
            .map(|addr| addr.ip())
            .collect();

        pick_address(&addrs)
            .map(|ip| ip.to_string())
            .ok_or_else(|| DdnsError::Dns(format!("{}: no addresses", fqdn)))
    }
}

/// Prefer the first IPv4 answer; fall back to whatever came first.
fn pick_address(addrs: &[IpAddr]) -> Option<IpAddr> {
    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_address_prefers_ipv4() {
        let addrs: Vec<IpAddr> = vec![
            "2001:db8::1".parse().unwrap(),
            "198.51.100.4".parse().unwrap(),
        ];
        assert_eq!(pick_address(&addrs), Some("198.51.100.4".parse().unwrap()));
    }

    #[test]
    fn test_pick_address_falls_back_to_ipv6() {
        let addrs: Vec<IpAddr> = vec!["2001:db8::1".parse().unwrap()];
        assert_eq!(pick_address(&addrs), Some("2001:db8::1".parse().unwrap()));
        assert_eq!(pick_address(&[]), None);
    }

    #[tokio::test]
    async fn test_lookup_localhost() {
        let ip = SystemResolver::new().lookup("localhost").await.unwrap();
        assert!(ip == "127.0.0.1" || ip == "::1");
    }

    #[tokio::test]
    async fn test_lookup_invalid_name() {
        let result = SystemResolver::new().lookup("no-such-host.invalid").await;
        assert!(matches!(result, Err(DdnsError::Dns(_))));
    }
}
