//! Current IP detection.
//!
//! The source is picked from the `ip_server` setting:
//!
//! - `if://<name>`: the IPv4 address bound to a local interface.
//! - `http://...` or `https://...`: an echo service answering
//!   `{"IP": "...", "Port": n}`.

use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Timeout applied to every outbound HTTP request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const INTERFACE_SCHEME: &str = "if://";

/// Peer address as reported by the echo service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddress {
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "Port")]
    pub port: u16,
}

/// Where the current IP comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpSource {
    /// Named local network interface.
    Interface(String),
    /// Echo service URL.
    Http(String),
}

impl IpSource {
    /// Parse an `ip_server` value.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();

        if let Some(name) = value.strip_prefix(INTERFACE_SCHEME) {
            if name.is_empty() {
                return Err(DdnsError::Config(
                    "`ip_server` names no interface after if://".to_string(),
                ));
            }
            return Ok(IpSource::Interface(name.to_string()));
        }

        if value.starts_with("http://") || value.starts_with("https://") {
            return Ok(IpSource::Http(value.to_string()));
        }

        Err(DdnsError::Config(format!(
            "`ip_server` must be an http(s) URL or if://<interface>, got {:?}",
            value
        )))
    }
}

/// Anything that can report the host's current IP.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CurrentIp: Send + Sync {
    /// Resolve the current IP as a dotted-decimal string.
    async fn current_ip(&self) -> Result<String>;
}

/// IP detector backed by an echo service or a local interface.
pub struct IpDetector {
    client: reqwest::Client,
    source: IpSource,
}

impl IpDetector {
    /// Create a detector for the given source.
    pub fn new(source: IpSource) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { client, source })
    }

    /// Source this detector reads from.
    pub fn source(&self) -> &IpSource {
        &self.source
    }

    async fn from_echo_service(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(DdnsError::IpDetection(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let address: PeerAddress = response.json().await.map_err(|e| {
            DdnsError::IpDetection(format!("Invalid response from {}: {}", url, e))
        })?;

        if address.ip.is_empty() {
            return Err(DdnsError::IpDetection(format!("Empty IP from {}", url)));
        }

        tracing::debug!("Detected {} from {}", address.ip, url);
        Ok(address.ip)
    }

    fn from_interface(&self, name: &str) -> Result<String> {
        let interfaces = local_ip_address::list_afinet_netifas()
            .map_err(|e| DdnsError::IpDetection(format!("Cannot list interfaces: {}", e)))?;

        let ip = interface_ipv4(&interfaces, name).ok_or_else(|| {
            DdnsError::IpDetection(format!("No IPv4 address on interface {}", name))
        })?;

        tracing::debug!("Detected {} on interface {}", ip, name);
        Ok(ip)
    }
}

#[async_trait]
impl CurrentIp for IpDetector {
    async fn current_ip(&self) -> Result<String> {
        match &self.source {
            IpSource::Interface(name) => self.from_interface(name),
            IpSource::Http(url) => self.from_echo_service(url).await,
        }
    }
}

/// First non-loopback IPv4 address bound to the named interface.
fn interface_ipv4(interfaces: &[(String, IpAddr)], name: &str) -> Option<String> {
    interfaces
        .iter()
        .filter(|(iface, _)| iface == name)
        .map(|(_, ip)| ip)
        .find(|ip| ip.is_ipv4() && !ip.is_loopback())
        .map(|ip| ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_interface_source() {
        let source = IpSource::parse("if://eth0").unwrap();
        assert_eq!(source, IpSource::Interface("eth0".to_string()));
    }

    #[test]
    fn test_parse_http_source() {
        let source = IpSource::parse("https://ip.example.com/").unwrap();
        assert_eq!(source, IpSource::Http("https://ip.example.com/".to_string()));
    }

    #[test]
    fn test_parse_rejects_other_syntax() {
        assert!(IpSource::parse("ftp://example.com").is_err());
        assert!(IpSource::parse("if://").is_err());
        assert!(IpSource::parse("").is_err());
    }

    #[test]
    fn test_interface_ipv4_skips_loopback_and_v6() {
        let interfaces = vec![
            ("lo".to_string(), "127.0.0.1".parse().unwrap()),
            ("eth0".to_string(), "fe80::1".parse().unwrap()),
            ("eth0".to_string(), "192.168.1.20".parse().unwrap()),
            ("wlan0".to_string(), "10.0.0.7".parse().unwrap()),
        ];

        assert_eq!(
            interface_ipv4(&interfaces, "eth0"),
            Some("192.168.1.20".to_string())
        );
        assert_eq!(interface_ipv4(&interfaces, "lo"), None);
        assert_eq!(interface_ipv4(&interfaces, "ppp0"), None);
    }

    #[tokio::test]
    async fn test_echo_service_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"IP": "203.0.113.9", "Port": 51234})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let detector = IpDetector::new(IpSource::Http(format!("{}/", mock_server.uri()))).unwrap();
        assert_eq!(detector.current_ip().await.unwrap(), "203.0.113.9");
    }

    #[tokio::test]
    async fn test_echo_service_plain_text_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("203.0.113.9"))
            .mount(&mock_server)
            .await;

        let detector = IpDetector::new(IpSource::Http(mock_server.uri())).unwrap();
        let result = detector.current_ip().await;
        assert!(matches!(result, Err(DdnsError::IpDetection(_))));
    }

    #[tokio::test]
    async fn test_echo_service_http_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let detector = IpDetector::new(IpSource::Http(mock_server.uri())).unwrap();
        assert!(detector.current_ip().await.is_err());
    }

    #[tokio::test]
    async fn test_echo_service_empty_ip() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"IP": "", "Port": 0})),
            )
            .mount(&mock_server)
            .await;

        let detector = IpDetector::new(IpSource::Http(mock_server.uri())).unwrap();
        assert!(detector.current_ip().await.is_err());
    }
}
