//! Hardware and OS telemetry probes.
//!
//! Each submodule owns one fragment of the telemetry schema: its data
//! types, the sysfs/procfs paths it reads and the conversions it
//! applies. The [`ProbeSet`] trait bundles them behind one seam so the
//! aggregation layer can run against scripted probes in tests.

pub mod cpu;
pub mod gpu;
pub mod memory;
pub mod network;
pub mod power;
pub mod process;
pub mod sensors;
pub mod storage;
pub(crate) mod sysfs;
pub mod system;
pub mod thermal;

pub use cpu::{CpuInfo, CpuStats};
pub use gpu::GpuInfo;
pub use memory::MemoryInfo;
pub use network::NetworkInfo;
pub use power::PowerInfo;
pub use process::ProcessesInfo;
pub use sensors::SensorsInfo;
pub use storage::StorageInfo;
pub use system::SystemInfo;
pub use thermal::ThermalInfo;

use async_trait::async_trait;

use crate::error::Result;

/// The full set of telemetry probes.
///
/// Every method is a zero-argument reading of one fragment. A probe
/// that cannot reach its data source returns an error; the caller
/// decides what stands in for the missing fragment.
#[async_trait]
pub trait ProbeSet: Send + Sync {
    async fn power(&self) -> Result<PowerInfo>;
    async fn thermal(&self) -> Result<ThermalInfo>;
    async fn cpu(&self) -> Result<CpuInfo>;
    async fn cpu_stats(&self) -> Result<CpuStats>;
    async fn gpu(&self) -> Result<GpuInfo>;
    async fn memory(&self) -> Result<MemoryInfo>;
    async fn network(&self) -> Result<NetworkInfo>;
    async fn storage(&self) -> Result<StorageInfo>;
    async fn sensors(&self) -> Result<SensorsInfo>;
    async fn processes(&self) -> Result<ProcessesInfo>;
    async fn system(&self) -> Result<SystemInfo>;
}

/// Probes backed by the device's sysfs and procfs trees.
#[derive(Debug, Clone)]
pub struct DeviceProbes {
    max_processes: usize,
}

impl DeviceProbes {
    pub fn new(max_processes: usize) -> Self {
        Self { max_processes }
    }
}

#[async_trait]
impl ProbeSet for DeviceProbes {
    async fn power(&self) -> Result<PowerInfo> {
        power::collect().await
    }

    async fn thermal(&self) -> Result<ThermalInfo> {
        thermal::collect().await
    }

    async fn cpu(&self) -> Result<CpuInfo> {
        cpu::collect().await
    }

    async fn cpu_stats(&self) -> Result<CpuStats> {
        cpu::collect_stats().await
    }

    async fn gpu(&self) -> Result<GpuInfo> {
        gpu::collect().await
    }

    async fn memory(&self) -> Result<MemoryInfo> {
        memory::collect().await
    }

    async fn network(&self) -> Result<NetworkInfo> {
        network::collect().await
    }

    async fn storage(&self) -> Result<StorageInfo> {
        storage::collect().await
    }

    async fn sensors(&self) -> Result<SensorsInfo> {
        sensors::collect().await
    }

    async fn processes(&self) -> Result<ProcessesInfo> {
        process::collect(self.max_processes).await
    }

    async fn system(&self) -> Result<SystemInfo> {
        system::collect().await
    }
}
