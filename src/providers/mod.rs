//! DDNS provider implementations.

mod cloudflare;
mod godaddy;


pub use cloudflare::CloudflareProvider;
pub use godaddy::GoDaddyProvider;

use crate::config::{Config, ProviderKind};
use crate::detector::REQUEST_TIMEOUT;
use crate::error::Result;
use async_trait::async_trait;

/// Trait for DDNS providers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DdnsProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &'static str;

    /// Point the configured record at `ip`.
    async fn apply(&self, ip: &str) -> Result<()>;
}

/// API credentials shared by the providers.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// Account email (Cloudflare only).
    pub email: String,
    pub key: String,
    pub secret: String,
}

/// The record a provider manages.
#[derive(Debug, Clone)]
pub struct RecordTarget {
    pub domain: String,
    /// Host label (e.g., "home").
    pub name: String,
    pub record_type: String,
}

impl RecordTarget {
    /// `<name>.<domain>`.
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.name, self.domain)
    }
}

/// Create the configured provider.
pub fn create_provider(config: &Config) -> Result<Box<dyn DdnsProvider>> {
    let client = http_client()?;
    let credentials = Credentials {
        email: resolve_env(&config.email),
        key: resolve_env(&config.key),
        secret: resolve_env(&config.secret),
    };
    let target = RecordTarget {
        domain: config.domain.clone(),
        name: config.name.clone(),
        record_type: config.record_type.clone(),
    };

    let provider: Box<dyn DdnsProvider> = match config.server {
        ProviderKind::Cloudflare => Box::new(CloudflareProvider::new(
            client,
            credentials,
            target,
            config.proxy,
        )),
        ProviderKind::GoDaddy => Box::new(GoDaddyProvider::new(client, credentials, target)),
    };

    tracing::debug!("Using provider {}", provider.name());
    Ok(provider)
}

fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// Resolve environment variable references (values starting with $).
fn resolve_env(value: &str) -> String {
    if let Some(var_name) = value.strip_prefix('$') {
        std::env::var(var_name).unwrap_or_else(|_| {
            tracing::warn!("Environment variable {} not set", var_name);
            value.to_string()
        })
    } else {
        value.to_string()
    }
}
