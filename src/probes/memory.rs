//! Memory probe: `/proc/meminfo` breakdown in bytes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::probes::sysfs;

const PROC_MEMINFO: &str = "/proc/meminfo";

/// Memory telemetry fragment. All sizes in bytes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInfo {
    pub total: u64,
    pub free: u64,
    pub available: u64,
    pub buffers: u64,
    pub cached: u64,
    pub swap_total: u64,
    pub swap_free: u64,
    pub swap_used: u64,
    pub active: u64,
    pub inactive: u64,
    pub active_anon: u64,
    pub inactive_anon: u64,
    pub active_file: u64,
    pub inactive_file: u64,
    pub dirty: u64,
    pub writeback: u64,
    pub anon_pages: u64,
    pub mapped: u64,
    pub shmem: u64,
    pub slab: u64,
    pub s_reclaimable: u64,
    pub s_unreclaim: u64,
    /// (total - available) / total, in percent
    pub used_percent: f64,
    /// swap used / swap total, in percent
    pub swap_used_percent: f64,
}

/// Collect the memory breakdown.
pub async fn collect() -> Result<MemoryInfo> {
    let Some(content) = sysfs::read_string(Path::new(PROC_MEMINFO)) else {
        return Err(AgentError::probe_error("/proc/meminfo is unreadable"));
    };
    Ok(parse_memory(&content))
}

pub(crate) fn parse_memory(content: &str) -> MemoryInfo {
    let values = sysfs::parse_meminfo(content);
    let get = |key: &str| values.get(key).copied().unwrap_or(0);

    let total = get("MemTotal");
    let available = get("MemAvailable");
    let swap_total = get("SwapTotal");
    let swap_free = get("SwapFree");
    let swap_used = swap_total.saturating_sub(swap_free);

    let used_percent = if total > 0 {
        total.saturating_sub(available) as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    let swap_used_percent = if swap_total > 0 {
        swap_used as f64 / swap_total as f64 * 100.0
    } else {
        0.0
    };

    MemoryInfo {
        total,
        free: get("MemFree"),
        available,
        buffers: get("Buffers"),
        cached: get("Cached"),
        swap_total,
        swap_free,
        swap_used,
        active: get("Active"),
        inactive: get("Inactive"),
        active_anon: get("Active(anon)"),
        inactive_anon: get("Inactive(anon)"),
        active_file: get("Active(file)"),
        inactive_file: get("Inactive(file)"),
        dirty: get("Dirty"),
        writeback: get("Writeback"),
        anon_pages: get("AnonPages"),
        mapped: get("Mapped"),
        shmem: get("Shmem"),
        slab: get("Slab"),
        s_reclaimable: get("SReclaimable"),
        s_unreclaim: get("SUnreclaim"),
        used_percent,
        swap_used_percent,
    }
}
