//! Fan-out collection across the probe set.

use std::future::Future;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tracing::{debug, warn};

use crate::config::{AgentConfig, CollectorsConfig};
use crate::error::Result;
use crate::probes::{DeviceProbes, ProbeSet};

use super::envelope::{
    FullSnapshot, HighFrequencyPayload, LowFrequencyPayload, MediumFrequencyPayload, Tier,
    TierPayload,
};

/// Runs the probes belonging to a tier and assembles the payload.
/// A failed probe or a disabled collector yields that fragment's
/// default; one bad source never poisons the rest of the envelope.
pub struct Aggregator {
    probes: Arc<dyn ProbeSet>,
    collectors: CollectorsConfig,
}

impl Aggregator {
    pub fn new(config: &AgentConfig) -> Self {
        Self::with_probes(
            Arc::new(DeviceProbes::new(config.max_processes)),
            config.collectors.clone(),
        )
    }

    /// Build on a caller-supplied probe set.
    pub fn with_probes(probes: Arc<dyn ProbeSet>, collectors: CollectorsConfig) -> Self {
        Self { probes, collectors }
    }

    pub async fn collect(&self, tier: Tier) -> TierPayload {
        match tier {
            Tier::High => TierPayload::High(self.collect_high().await),
            Tier::Medium => TierPayload::Medium(self.collect_medium().await),
            Tier::Low => TierPayload::Low(self.collect_low().await),
        }
    }

    async fn collect_high(&self) -> HighFrequencyPayload {
        let (power, thermal, cpu, memory, network) = tokio::join!(
            slot(self.collectors.battery, "power", self.probes.power()),
            slot(self.collectors.thermal, "thermal", self.probes.thermal()),
            slot(self.collectors.cpu, "cpu", self.probes.cpu()),
            slot(self.collectors.memory, "memory", self.probes.memory()),
            slot(self.collectors.network, "network", self.probes.network()),
        );

        HighFrequencyPayload {
            power,
            thermal,
            cpu,
            memory,
            network,
        }
    }

    async fn collect_medium(&self) -> MediumFrequencyPayload {
        let (cpu_stats, gpu, storage, processes) = tokio::join!(
            slot(self.collectors.cpu, "cpu stats", self.probes.cpu_stats()),
            slot(self.collectors.gpu, "gpu", self.probes.gpu()),
            slot(self.collectors.storage, "storage", self.probes.storage()),
            slot(
                self.collectors.processes,
                "processes",
                self.probes.processes()
            ),
        );

        MediumFrequencyPayload {
            cpu_stats,
            gpu,
            storage,
            processes,
        }
    }

    async fn collect_low(&self) -> LowFrequencyPayload {
        let (sensors, system) = tokio::join!(
            slot(self.collectors.sensors, "sensors", self.probes.sensors()),
            slot(true, "system", self.probes.system()),
        );

        LowFrequencyPayload { sensors, system }
    }

    /// Capture every fragment at once, ignoring the enable flags.
    /// Backs the one-shot snapshot command.
    pub async fn collect_full(&self, device_id: &str) -> FullSnapshot {
        let now = Utc::now();
        let (power, thermal, cpu, cpu_stats, gpu, memory, network, storage, sensors, processes, system) = tokio::join!(
            slot(true, "power", self.probes.power()),
            slot(true, "thermal", self.probes.thermal()),
            slot(true, "cpu", self.probes.cpu()),
            slot(true, "cpu stats", self.probes.cpu_stats()),
            slot(true, "gpu", self.probes.gpu()),
            slot(true, "memory", self.probes.memory()),
            slot(true, "network", self.probes.network()),
            slot(true, "storage", self.probes.storage()),
            slot(true, "sensors", self.probes.sensors()),
            slot(true, "processes", self.probes.processes()),
            slot(true, "system", self.probes.system()),
        );

        FullSnapshot {
            device_id: device_id.to_string(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            timestamp_ms: now.timestamp_millis(),
            power,
            thermal,
            cpu,
            cpu_stats,
            gpu,
            memory,
            network,
            storage,
            sensors,
            processes,
            system,
        }
    }
}

/// Resolve one payload slot. Disabled collectors and failed probes
/// both fall back to the fragment's default value.
async fn slot<T: Default>(enabled: bool, name: &str, probe: impl Future<Output = Result<T>>) -> T {
    if !enabled {
        debug!("{} collector disabled, using default fragment", name);
        return T::default();
    }
    match probe.await {
        Ok(value) => value,
        Err(err) => {
            warn!("{} probe failed: {}", name, err);
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;

    #[tokio::test]
    async fn test_slot_passes_value_through() {
        let value = slot(true, "demo", async { Ok(41u64) }).await;
        assert_eq!(value, 41);
    }

    #[tokio::test]
    async fn test_slot_disabled_returns_default_without_probing() {
        let value: u64 = slot(false, "demo", async {
            panic!("disabled slot must not run its probe")
        })
        .await;
        assert_eq!(value, 0u64);
    }

    #[tokio::test]
    async fn test_slot_swallows_probe_errors() {
        let value = slot(true, "demo", async {
            Err::<u64, _>(AgentError::probe_error("source vanished"))
        })
        .await;
        assert_eq!(value, 0);
    }
}
