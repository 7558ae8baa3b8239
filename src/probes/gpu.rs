//! GPU probe: devfreq state of the Mali-T860.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::probes::sysfs;

const GPU_DEVFREQ_DIR: &str = "/sys/devices/platform/ff9a0000.gpu/devfreq/ff9a0000.gpu";

/// devfreq state of the GPU.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuFrequencyInfo {
    /// Current frequency in MHz
    pub current_freq: f64,
    /// Frequency the governor is steering towards in MHz
    pub target_freq: f64,
    /// Minimum allowed frequency in MHz
    pub min_freq: f64,
    /// Maximum allowed frequency in MHz
    pub max_freq: f64,
    /// Active devfreq governor
    pub governor: String,
    /// Supported OPP frequencies in MHz
    pub available_frequencies: Vec<f64>,
    /// Governor polling interval in milliseconds
    pub polling_interval_ms: u64,
}

impl Default for GpuFrequencyInfo {
    fn default() -> Self {
        Self {
            current_freq: 0.0,
            target_freq: 0.0,
            min_freq: 0.0,
            max_freq: 0.0,
            governor: "unknown".to_string(),
            available_frequencies: Vec::new(),
            polling_interval_ms: 0,
        }
    }
}

/// GPU telemetry fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GpuInfo {
    pub frequency: GpuFrequencyInfo,
}

/// Collect the GPU devfreq state.
pub async fn collect() -> Result<GpuInfo> {
    let dir = Path::new(GPU_DEVFREQ_DIR);
    if !dir.is_dir() {
        return Err(AgentError::probe_error(format!(
            "GPU devfreq not registered at {}",
            GPU_DEVFREQ_DIR
        )));
    }
    Ok(GpuInfo {
        frequency: read_devfreq(dir),
    })
}

pub(crate) fn read_devfreq(dir: &Path) -> GpuFrequencyInfo {
    // devfreq reports plain Hz.
    let mhz = |name: &str| sysfs::hz_to_mhz(sysfs::read_number(&dir.join(name)).unwrap_or(0.0));

    // TODO: parse trans_stat into per-OPP transition counts.
    GpuFrequencyInfo {
        current_freq: mhz("cur_freq"),
        target_freq: mhz("target_freq"),
        min_freq: mhz("min_freq"),
        max_freq: mhz("max_freq"),
        governor: sysfs::read_string(&dir.join("governor"))
            .unwrap_or_else(|| "unknown".to_string()),
        available_frequencies: read_available_frequencies(dir),
        polling_interval_ms: sysfs::read_int(&dir.join("polling_interval")).unwrap_or(0) as u64,
    }
}

fn read_available_frequencies(dir: &Path) -> Vec<f64> {
    let Some(raw) = sysfs::read_string(&dir.join("available_frequencies")) else {
        return Vec::new();
    };
    raw.split_whitespace()
        .filter_map(|v| v.parse::<f64>().ok())
        .filter(|hz| *hz > 0.0)
        .map(sysfs::hz_to_mhz)
        .collect()
}
