//! # ddns-sync
//!
//! A dynamic DNS updater. It watches the host's IP (from an echo service or a
//! local interface), compares it with what DNS publishes for a hostname, and
//! pushes changes to Cloudflare or GoDaddy.
//!
//! ## Usage
//!
//! ```bash
//! # Run the update loop (writes a config template on first start)
//! ddns-sync run
//!
//! # Run a single pass
//! ddns-sync once
//!
//! # Serve the "what is my IP" echo service
//! ddns-sync echo --listen 0.0.0.0:9999
//! ```

pub mod config;
pub mod detector;
pub mod error;
pub mod providers;
pub mod reconcile;
pub mod resolver;
pub mod server;

pub use config::Config;
pub use detector::IpDetector;
pub use error::{DdnsError, Result};
pub use reconcile::{CycleOutcome, Reconciler};
