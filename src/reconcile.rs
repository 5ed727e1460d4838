//! The update loop: compare the published IP with the current one and push
//! the change to the provider when they differ.

use crate::detector::CurrentIp;
use crate::providers::DdnsProvider;
use crate::resolver::PublishedIp;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Published IP assumed when the DNS lookup fails. Never equal to a real
/// source IP, so the next successful detection always triggers an update.
pub const SENTINEL_IP: &str = "0.0.0.0";

/// What a single pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// DNS already publishes the current IP.
    Unchanged { ip: String },
    /// The provider accepted the new IP.
    Updated { previous: String, current: String },
    /// The provider rejected the update or could not be reached.
    UpdateFailed {
        previous: String,
        current: String,
        error: String,
    },
    /// The current IP could not be determined; nothing was attempted.
    SourceFailed { error: String },
}

/// Drives one record through periodic reconciliation.
pub struct Reconciler {
    fqdn: String,
    interval: Duration,
    dns: Box<dyn PublishedIp>,
    source: Box<dyn CurrentIp>,
    provider: Box<dyn DdnsProvider>,
}

impl Reconciler {
    pub fn new(
        fqdn: String,
        interval: Duration,
        dns: Box<dyn PublishedIp>,
        source: Box<dyn CurrentIp>,
        provider: Box<dyn DdnsProvider>,
    ) -> Self {
        Self {
            fqdn,
            interval,
            dns,
            source,
            provider,
        }
    }

    /// Run one pass to completion.
    pub async fn run_once(&self) -> CycleOutcome {
        let published = match self.dns.lookup(&self.fqdn).await {
            Ok(ip) => ip,
            Err(e) => {
                tracing::warn!("{}; assuming {}", e, SENTINEL_IP);
                SENTINEL_IP.to_string()
            }
        };

        let current = match self.source.current_ip().await {
            Ok(ip) if !ip.is_empty() => ip,
            Ok(_) => {
                tracing::warn!("IP source returned an empty address");
                return CycleOutcome::SourceFailed {
                    error: "empty address".to_string(),
                };
            }
            Err(e) => {
                tracing::warn!("Failed to detect IP: {}", e);
                return CycleOutcome::SourceFailed {
                    error: e.to_string(),
                };
            }
        };

        if current == published {
            tracing::info!("{} unchanged ({})", self.fqdn, current);
            return CycleOutcome::Unchanged { ip: current };
        }

        tracing::info!("{} changed: {} -> {}", self.fqdn, published, current);

        match self.provider.apply(&current).await {
            Ok(()) => {
                tracing::info!("{} updated to {}", self.fqdn, current);
                CycleOutcome::Updated {
                    previous: published,
                    current,
                }
            }
            Err(e) => {
                tracing::error!("Failed to update {}: {}", self.fqdn, e);
                CycleOutcome::UpdateFailed {
                    previous: published,
                    current,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Run passes on a fixed tick until `shutdown` turns true or its sender
    /// is dropped. The first tick fires immediately. The signal is checked at
    /// every tick boundary, so a pass in progress always finishes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "Watching {} every {}s",
            self.fqdn,
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            if stop_requested(&shutdown) {
                break;
            }

            self.run_once().await;
        }

        tracing::info!("Shutdown signal received, stopping");
    }
}

fn stop_requested(shutdown: &watch::Receiver<bool>) -> bool {
    shutdown.has_changed().is_err() || *shutdown.borrow()
}
