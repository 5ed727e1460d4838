//! GoDaddy DDNS provider.

use super::{Credentials, DdnsProvider, RecordTarget};
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;

const DEFAULT_BASE_URL: &str = "https://api.godaddy.com";
const PROVIDER: &str = "godaddy";

/// TTL of records written by this provider.
pub(crate) const RECORD_TTL: u32 = 600;

/// GoDaddy DDNS provider.
///
/// Records are addressed by domain, type and name, so no lookup precedes
/// the update and nothing is cached.
pub struct GoDaddyProvider {
    client: reqwest::Client,
    credentials: Credentials,
    target: RecordTarget,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct UpdateRecord<'a> {
    data: &'a str,
    name: &'a str,
    ttl: u32,
    #[serde(rename = "type")]
    record_type: &'a str,
}

impl GoDaddyProvider {
    /// Create a new GoDaddy provider.
    pub fn new(client: reqwest::Client, credentials: Credentials, target: RecordTarget) -> Self {
        Self::with_base_url(client, credentials, target, DEFAULT_BASE_URL.to_string())
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(
        client: reqwest::Client,
        credentials: Credentials,
        target: RecordTarget,
        base_url: String,
    ) -> Self {
        Self {
            client,
            credentials,
            target,
            base_url,
        }
    }

    fn auth_header(&self) -> String {
        format!("sso-key {}:{}", self.credentials.key, self.credentials.secret)
    }
}

#[async_trait]
impl DdnsProvider for GoDaddyProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn apply(&self, ip: &str) -> Result<()> {
        let url = format!(
            "{}/v1/domains/{}/records/{}/{}",
            self.base_url, self.target.domain, self.target.record_type, self.target.name
        );

        let records = [UpdateRecord {
            data: ip,
            name: &self.target.name,
            ttl: RECORD_TTL,
            record_type: &self.target.record_type,
        }];

        tracing::info!(
            "Updating {} record {} -> {}",
            self.target.record_type,
            self.target.fqdn(),
            ip
        );

        let response = self
            .client
            .put(&url)
            .header("Authorization", self.auth_header())
            .header("Content-Type", "application/json")
            .json(&records)
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await?;
        Err(DdnsError::provider(PROVIDER, format!("HTTP {}: {}", status, body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_header() {
        let provider = GoDaddyProvider::new(
            reqwest::Client::new(),
            Credentials {
                email: String::new(),
                key: "test_key".to_string(),
                secret: "test_secret".to_string(),
            },
            RecordTarget {
                domain: "example.com".to_string(),
                name: "home".to_string(),
                record_type: "A".to_string(),
            },
        );

        assert_eq!(provider.auth_header(), "sso-key test_key:test_secret");
    }
}
