//! Cloudflare DDNS provider.
//!
//! An update takes up to three calls: zone lookup, record lookup, then a
//! create or update. Zone and record IDs are remembered for the lifetime of
//! the provider so steady-state updates only issue the final call.

use super::{Credentials, DdnsProvider, RecordTarget};
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com";
const PROVIDER: &str = "cloudflare";

/// TTL of records written by this provider.
pub(crate) const RECORD_TTL: u32 = 300;

/// Cloudflare DDNS provider.
pub struct CloudflareProvider {
    client: reqwest::Client,
    credentials: Credentials,
    target: RecordTarget,
    proxied: bool,
    base_url: String,
    cache: Mutex<IdCache>,
}

#[derive(Debug, Deserialize)]
struct CloudflareResponse<T> {
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Identified {
    id: String,
}

#[derive(Debug, Serialize)]
struct DnsRecord<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    proxied: bool,
    zone_id: &'a str,
    ttl: u32,
}

/// Zone and record IDs resolved during this run.
///
/// An empty stored value counts as a miss.
#[derive(Debug, Default)]
pub(crate) struct IdCache {
    zones: HashMap<String, String>,
    records: HashMap<String, String>,
}

impl IdCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Cached zone ID for `domain`.
    pub(crate) fn zone(&self, domain: &str) -> Option<&str> {
        non_empty(self.zones.get(domain))
    }

    pub(crate) fn set_zone(&mut self, domain: &str, zone_id: &str) {
        self.zones.insert(domain.to_string(), zone_id.to_string());
    }

    /// Cached record ID for `fqdn`.
    pub(crate) fn record(&self, fqdn: &str) -> Option<&str> {
        non_empty(self.records.get(fqdn))
    }

    pub(crate) fn set_record(&mut self, fqdn: &str, record_id: &str) {
        self.records.insert(fqdn.to_string(), record_id.to_string());
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider.
    pub fn new(
        client: reqwest::Client,
        credentials: Credentials,
        target: RecordTarget,
        proxied: bool,
    ) -> Self {
        Self::with_base_url(
            client,
            credentials,
            target,
            proxied,
            DEFAULT_BASE_URL.to_string(),
        )
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(
        client: reqwest::Client,
        credentials: Credentials,
        target: RecordTarget,
        proxied: bool,
        base_url: String,
    ) -> Self {
        Self {
            client,
            credentials,
            target,
            proxied,
            base_url,
            cache: Mutex::new(IdCache::new()),
        }
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, IdCache> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/client/v4{}", self.base_url, path);

        self.client
            .request(method, url)
            .header("X-Auth-Email", &self.credentials.email)
            .header("X-Auth-Key", &self.credentials.key)
            .header("Authorization", format!("Bearer {}", self.credentials.secret))
            .header("Content-Type", "application/json")
    }

    /// Send a request and return the body if the status is 200.
    async fn send(&self, request: RequestBuilder, action: &str) -> Result<String> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status != StatusCode::OK {
            return Err(DdnsError::provider(
                PROVIDER,
                format!("{} failed (HTTP {}): {}", action, status, body),
            ));
        }

        Ok(body)
    }

    async fn first_id(&self, request: RequestBuilder, action: &str) -> Result<Option<String>> {
        let body = self.send(request, action).await?;
        let response: CloudflareResponse<Vec<Identified>> = parse(&body, action)?;

        Ok(response
            .result
            .and_then(|items| items.into_iter().next())
            .map(|item| item.id))
    }

    async fn zone_id(&self) -> Result<String> {
        let domain = &self.target.domain;

        let cached = self.cache().zone(domain).map(str::to_string);
        if let Some(zone_id) = cached {
            tracing::debug!("Zone ID for {} from cache", domain);
            return Ok(zone_id);
        }

        let request = self
            .request(Method::GET, "/zones")
            .query(&[("name", domain.as_str())]);

        let zone_id = self
            .first_id(request, "Zone lookup")
            .await?
            .ok_or_else(|| DdnsError::ZoneNotFound(domain.clone()))?;

        self.cache().set_zone(domain, &zone_id);
        Ok(zone_id)
    }

    async fn record_id(&self, zone_id: &str, fqdn: &str) -> Result<Option<String>> {
        let cached = self.cache().record(fqdn).map(str::to_string);
        if cached.is_some() {
            tracing::debug!("Record ID for {} from cache", fqdn);
            return Ok(cached);
        }

        let request = self
            .request(Method::GET, &format!("/zones/{}/dns_records", zone_id))
            .query(&[("name", fqdn)]);

        self.first_id(request, "Record lookup").await
    }
}

fn parse<T: DeserializeOwned>(body: &str, action: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        DdnsError::provider(PROVIDER, format!("{}: unexpected response: {}", action, e))
    })
}

#[async_trait]
impl DdnsProvider for CloudflareProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn apply(&self, ip: &str) -> Result<()> {
        let zone_id = self.zone_id().await?;
        let fqdn = self.target.fqdn();

        let record = DnsRecord {
            record_type: &self.target.record_type,
            name: &self.target.name,
            content: ip,
            proxied: self.proxied,
            zone_id: &zone_id,
            ttl: RECORD_TTL,
        };

        match self.record_id(&zone_id, &fqdn).await? {
            None => {
                tracing::info!("Creating {} record {} -> {}", record.record_type, fqdn, ip);
                let request = self
                    .request(Method::POST, &format!("/zones/{}/dns_records", zone_id))
                    .json(&record);
                self.send(request, "Record create").await?;
            }
            Some(record_id) => {
                self.cache().set_record(&fqdn, &record_id);
                tracing::info!("Updating {} record {} -> {}", record.record_type, fqdn, ip);
                let request = self
                    .request(
                        Method::PUT,
                        &format!("/zones/{}/dns_records/{}", zone_id, record_id),
                    )
                    .json(&record);
                self.send(request, "Record update").await?;
            }
        }

        Ok(())
    }
}
