//! Configuration management for ddns-sync.

use crate::error::{DdnsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default reconciliation period in seconds.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

const CONFIG_FILE_NAME: &str = "config.json";

/// Supported DNS providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Cloudflare,
    GoDaddy,
}

impl ProviderKind {
    /// Get the provider name.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Cloudflare => "cloudflare",
            ProviderKind::GoDaddy => "godaddy",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Main configuration structure, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider selector.
    pub server: ProviderKind,

    /// Managed domain (e.g., "example.com").
    pub domain: String,

    /// Account email (Cloudflare only).
    #[serde(default)]
    pub email: String,

    /// API key (or environment variable name if prefixed with $).
    pub key: String,

    /// API secret (or environment variable name if prefixed with $).
    pub secret: String,

    /// DNS record type (default: "A").
    #[serde(default = "default_record_type")]
    pub record_type: String,

    /// Host label of the record (e.g., "home").
    pub name: String,

    /// Where the current IP comes from: an echo service URL or `if://<interface>`.
    pub ip_server: String,

    /// Whether to proxy through Cloudflare (default: false).
    #[serde(default)]
    pub proxy: bool,

    /// Check interval in seconds (default: 60).
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

fn default_record_type() -> String {
    "A".to_string()
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

impl Config {
    /// Pick the config file to use when none was given on the command line.
    ///
    /// The first existing candidate wins; otherwise the file next to the
    /// executable is returned so a template can be written there.
    pub fn default_path() -> PathBuf {
        let exe_local = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(CONFIG_FILE_NAME)));

        let candidates = [
            exe_local.clone(),
            dirs::config_dir().map(|p| p.join("ddns-sync").join(CONFIG_FILE_NAME)),
            Some(PathBuf::from(CONFIG_FILE_NAME)),
        ];

        for candidate in candidates.into_iter().flatten() {
            if candidate.exists() {
                return candidate;
            }
        }

        exe_local.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DdnsError::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| DdnsError::Config(format!("Invalid {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path as indented JSON.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Placeholder configuration written when no config file exists.
    pub fn template() -> Self {
        Self {
            server: ProviderKind::Cloudflare,
            domain: "example.com".to_string(),
            email: "you@example.com".to_string(),
            key: "your api key".to_string(),
            secret: "your api secret".to_string(),
            record_type: default_record_type(),
            name: "www".to_string(),
            ip_server: "http://127.0.0.1:9999".to_string(),
            proxy: false,
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }

    /// Check the fields the update loop cannot run without.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("domain", &self.domain),
            ("name", &self.name),
            ("record_type", &self.record_type),
            ("ip_server", &self.ip_server),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DdnsError::Config(format!("`{}` must not be empty", field)));
            }
        }

        if self.interval_secs == 0 {
            return Err(DdnsError::Config(
                "`interval_secs` must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Fully qualified name of the managed record.
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.name, self.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GODADDY_JSON: &str = r#"{
        "server": "godaddy",
        "domain": "example.com",
        "key": "k",
        "secret": "s",
        "name": "home",
        "ip_server": "http://127.0.0.1:9999"
    }"#;

    #[test]
    fn test_defaults_applied() {
        let config: Config = serde_json::from_str(GODADDY_JSON).unwrap();
        assert_eq!(config.server, ProviderKind::GoDaddy);
        assert_eq!(config.record_type, "A");
        assert_eq!(config.interval_secs, DEFAULT_INTERVAL_SECS);
        assert_eq!(config.email, "");
        assert!(!config.proxy);
        assert_eq!(config.fqdn(), "home.example.com");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let json = GODADDY_JSON.replace("godaddy", "route53");
        let err = serde_json::from_str::<Config>(&json).unwrap_err();
        assert!(err.to_string().contains("route53"));
    }

    #[test]
    fn test_load_from_rejects_unknown_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, GODADDY_JSON.replace("godaddy", "namecheap")).unwrap();

        let result = Config::load_from(&path);
        assert!(matches!(result, Err(DdnsError::Config(_))));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from(&dir.path().join("absent.json"));
        assert!(matches!(result, Err(DdnsError::Config(_))));
    }

    #[test]
    fn test_template_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        Config::template().save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded.server, ProviderKind::Cloudflare);
        assert_eq!(loaded.name, "www");
        assert_eq!(loaded.interval_secs, DEFAULT_INTERVAL_SECS);
    }

    #[test]
    fn test_validate_empty_name() {
        let mut config: Config = serde_json::from_str(GODADDY_JSON).unwrap();
        config.name = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config: Config = serde_json::from_str(GODADDY_JSON).unwrap();
        config.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_names() {
        assert_eq!(ProviderKind::Cloudflare.name(), "cloudflare");
        assert_eq!(ProviderKind::GoDaddy.to_string(), "godaddy");
    }
}
