//! Wire types exchanged with the collector.
//!
//! Every transmission is an [`Envelope`]: device identity, a capture
//! timestamp in two encodings and one tier payload. Field names are
//! camelCase on the wire to match the collector's JSON schema.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::probes::{
    CpuInfo, CpuStats, GpuInfo, MemoryInfo, NetworkInfo, PowerInfo, ProcessesInfo, SensorsInfo,
    StorageInfo, SystemInfo, ThermalInfo,
};

/// Collection cadence tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    High,
    Medium,
    Low,
}

impl Tier {
    /// All tiers, in descending cadence order.
    pub const ALL: [Tier; 3] = [Tier::High, Tier::Medium, Tier::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::High => "high",
            Tier::Medium => "medium",
            Tier::Low => "low",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fragments captured on the high tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighFrequencyPayload {
    pub power: PowerInfo,
    pub thermal: ThermalInfo,
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    pub network: NetworkInfo,
}

/// Fragments captured on the medium tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediumFrequencyPayload {
    pub cpu_stats: CpuStats,
    pub gpu: GpuInfo,
    pub storage: StorageInfo,
    pub processes: ProcessesInfo,
}

/// Fragments captured on the low tier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LowFrequencyPayload {
    pub sensors: SensorsInfo,
    pub system: SystemInfo,
}

/// One tier's worth of telemetry. Serializes as a plain object; the
/// three variants carry disjoint key sets, so deserialization stays
/// unambiguous without a tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TierPayload {
    High(HighFrequencyPayload),
    Medium(MediumFrequencyPayload),
    Low(LowFrequencyPayload),
}

/// A single transmission to the collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub device_id: String,
    /// Capture instant, RFC 3339 with millisecond precision
    pub timestamp: String,
    /// The same instant as Unix milliseconds
    pub timestamp_ms: i64,
    pub frequency: Tier,
    pub data: TierPayload,
}

impl Envelope {
    /// Wrap a payload with identity and the current instant. Both
    /// timestamp encodings come from a single clock read.
    pub fn new(device_id: impl Into<String>, frequency: Tier, data: TierPayload) -> Self {
        let now = Utc::now();
        Self {
            device_id: device_id.into(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            timestamp_ms: now.timestamp_millis(),
            frequency,
            data,
        }
    }

    pub fn tier(&self) -> Tier {
        self.frequency
    }
}

/// Collector acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<TelemetryAck>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Receipt details inside a successful acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryAck {
    #[serde(default)]
    pub received: bool,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Every fragment at once, for the one-shot snapshot command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullSnapshot {
    pub device_id: String,
    pub timestamp: String,
    pub timestamp_ms: i64,
    pub power: PowerInfo,
    pub thermal: ThermalInfo,
    pub cpu: CpuInfo,
    pub cpu_stats: CpuStats,
    pub gpu: GpuInfo,
    pub memory: MemoryInfo,
    pub network: NetworkInfo,
    pub storage: StorageInfo,
    pub sensors: SensorsInfo,
    pub processes: ProcessesInfo,
    pub system: SystemInfo,
}
