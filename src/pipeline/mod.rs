//! The telemetry pipeline: probe fan-out, envelope assembly, tier
//! scheduling and delivery with offline buffering.
//!
//! Data flows one way. The [`Scheduler`] ticks each tier on its own
//! cadence, the [`Aggregator`] runs that tier's probes concurrently,
//! the result is wrapped in an [`Envelope`] and handed to the
//! [`Transporter`], which retries transient failures and parks
//! undeliverable envelopes in the [`OfflineBuffer`].

pub mod aggregator;
pub mod buffer;
pub mod envelope;
pub mod scheduler;
pub mod transport;

pub use aggregator::Aggregator;
pub use buffer::OfflineBuffer;
pub use envelope::{
    AckResponse, Envelope, FullSnapshot, HighFrequencyPayload, LowFrequencyPayload,
    MediumFrequencyPayload, TelemetryAck, Tier, TierPayload,
};
pub use scheduler::Scheduler;
pub use transport::{HttpTransport, RequestStatus, Transport, Transporter};
