//! # Phone Home - PinePhone Pro Telemetry Agent
//!
//! A resilient hardware telemetry agent for the PinePhone Pro. Samples
//! battery, thermal, CPU, GPU, memory, network, storage, sensor and
//! process state straight from sysfs and procfs, and ships it to a
//! remote collector as JSON over HTTP.
//!
//! ## Features
//!
//! - **Tiered collection**: fast-moving state every few seconds,
//!   slow-moving state every few minutes
//! - **Resilient delivery**: retries with linear backoff, failure
//!   classification and a bounded offline buffer
//! - **Graceful degradation**: a missing or broken hardware source
//!   never takes down the rest of an envelope
//! - **Library + Binary**: embed the pipeline or run the standalone
//!   agent
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use phonehome::{AgentConfig, Aggregator, Scheduler, Transporter};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AgentConfig::from_env();
//!     config.validate()?;
//!
//!     let transporter = Transporter::new(&config)?;
//!     let aggregator = Aggregator::new(&config);
//!
//!     let mut scheduler = Scheduler::new(&config, aggregator, transporter);
//!     scheduler.start().await;
//!
//!     tokio::signal::ctrl_c().await?;
//!     scheduler.stop();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod probes;

// Re-export public API
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use pipeline::{
    aggregator::Aggregator,
    buffer::OfflineBuffer,
    envelope::{Envelope, FullSnapshot, Tier, TierPayload},
    scheduler::Scheduler,
    transport::{HttpTransport, RequestStatus, Transport, Transporter},
};
pub use probes::{DeviceProbes, ProbeSet};

/// The default high tier collection interval in milliseconds
pub const DEFAULT_HIGH_INTERVAL_MS: u64 = 5_000;

/// The default medium tier collection interval in milliseconds
pub const DEFAULT_MEDIUM_INTERVAL_MS: u64 = 60_000;

/// The default low tier collection interval in milliseconds
pub const DEFAULT_LOW_INTERVAL_MS: u64 = 300_000;
