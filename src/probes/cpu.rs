//! CPU probe: per-core frequencies, kernel time accounting, load
//! average and hotplug state, plus the slower-moving cpufreq and
//! cpuidle statistics reported on the medium tier.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::probes::sysfs;

const CPU_ROOT: &str = "/sys/devices/system/cpu";
const PROC_STAT: &str = "/proc/stat";
const PROC_LOADAVG: &str = "/proc/loadavg";
const PROC_UPTIME: &str = "/proc/uptime";

/// RK3399 core count (4x Cortex-A53 + 2x Cortex-A72).
const CPU_COUNT: u32 = 6;
/// cpuidle states exposed per core on this SoC.
const IDLE_STATE_COUNT: u32 = 3;
/// Milliseconds per jiffy; USER_HZ is 100 on this kernel.
const JIFFY_MS: u64 = 10;

/// cpufreq state of one core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuFrequencyInfo {
    /// Core index
    pub cpu: u32,
    /// Current scaling frequency in MHz
    pub current_freq: f64,
    /// Governor floor in MHz
    pub min_freq: f64,
    /// Governor ceiling in MHz
    pub max_freq: f64,
    /// Hardware minimum in MHz
    pub hardware_min_freq: f64,
    /// Hardware maximum in MHz
    pub hardware_max_freq: f64,
    /// Active scaling governor
    pub governor: String,
}

/// One `cpu` line of `/proc/stat`, converted from jiffies to
/// milliseconds. The label is kept verbatim, so `cpu` is the
/// all-cores aggregate and `cpuN` a single core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuTimeInfo {
    pub cpu: String,
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

/// `/proc/loadavg` contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadAverage {
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
    /// Currently runnable tasks
    pub running_processes: u64,
    /// Total scheduling entities
    pub total_processes: u64,
}

/// High-tier CPU snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuInfo {
    pub frequencies: Vec<CpuFrequencyInfo>,
    pub cpu_times: Vec<CpuTimeInfo>,
    pub load_average: LoadAverage,
    /// Seconds since boot
    pub uptime: f64,
    /// Aggregate idle seconds across all cores
    pub idle_time: f64,
    pub online_cpus: Vec<u32>,
    pub offline_cpus: Vec<u32>,
}

/// Residency of one cpufreq state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuTimeInState {
    /// Frequency step in MHz
    pub frequency: f64,
    /// Time spent at this step in milliseconds
    pub time_ms: u64,
}

/// cpufreq statistics of one core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuFrequencyStats {
    pub cpu: u32,
    pub time_in_state: Vec<CpuTimeInState>,
    /// Total frequency transitions since boot
    pub total_transitions: u64,
}

/// One cpuidle state of one core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuIdleStateInfo {
    pub index: u32,
    pub name: String,
    pub description: String,
    /// Times this state was entered
    pub usage: u64,
    /// Total residency in microseconds
    pub time_us: u64,
    /// Exit latency in microseconds
    pub latency_us: u64,
}

/// cpuidle statistics of one core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuIdleInfo {
    pub cpu: u32,
    pub states: Vec<CpuIdleStateInfo>,
}

/// Medium-tier CPU statistics fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuStats {
    pub frequency_stats: Vec<CpuFrequencyStats>,
    pub idle_stats: Vec<CpuIdleInfo>,
}

/// Collect the high-tier CPU snapshot.
pub async fn collect() -> Result<CpuInfo> {
    let Some(stat) = sysfs::read_string(Path::new(PROC_STAT)) else {
        return Err(AgentError::probe_error("/proc/stat is unreadable"));
    };
    let root = Path::new(CPU_ROOT);
    let (uptime, idle_time) = read_uptime(Path::new(PROC_UPTIME));

    Ok(CpuInfo {
        frequencies: read_frequencies(root),
        cpu_times: parse_cpu_times(&stat),
        load_average: read_load_average(Path::new(PROC_LOADAVG)),
        uptime,
        idle_time,
        online_cpus: read_cpu_list(&root.join("online")),
        offline_cpus: read_cpu_list(&root.join("offline")),
    })
}

/// Collect the medium-tier cpufreq/cpuidle statistics.
pub async fn collect_stats() -> Result<CpuStats> {
    let root = Path::new(CPU_ROOT);
    if !root.is_dir() {
        return Err(AgentError::probe_error(format!(
            "{} is not available",
            CPU_ROOT
        )));
    }
    Ok(CpuStats {
        frequency_stats: read_frequency_stats(root),
        idle_stats: read_idle_stats(root),
    })
}

/// Cores whose cpufreq directory is missing or offline are skipped.
pub(crate) fn read_frequencies(root: &Path) -> Vec<CpuFrequencyInfo> {
    (0..CPU_COUNT)
        .filter_map(|cpu| {
            let dir = root.join(format!("cpu{}/cpufreq", cpu));
            let current = sysfs::read_number(&dir.join("scaling_cur_freq"))?;
            let khz = |name: &str| sysfs::read_number(&dir.join(name)).unwrap_or(0.0);
            Some(CpuFrequencyInfo {
                cpu,
                current_freq: sysfs::khz_to_mhz(current),
                min_freq: sysfs::khz_to_mhz(khz("scaling_min_freq")),
                max_freq: sysfs::khz_to_mhz(khz("scaling_max_freq")),
                hardware_min_freq: sysfs::khz_to_mhz(khz("cpuinfo_min_freq")),
                hardware_max_freq: sysfs::khz_to_mhz(khz("cpuinfo_max_freq")),
                governor: sysfs::read_string(&dir.join("scaling_governor"))
                    .unwrap_or_else(|| "unknown".to_string()),
            })
        })
        .collect()
}

pub(crate) fn parse_cpu_times(stat: &str) -> Vec<CpuTimeInfo> {
    stat.lines()
        .filter_map(sysfs::parse_cpu_stat_line)
        .map(|(cpu, jiffies)| {
            let ms = |index: usize| jiffies.get(index).copied().unwrap_or(0) * JIFFY_MS;
            CpuTimeInfo {
                cpu,
                user: ms(0),
                nice: ms(1),
                system: ms(2),
                idle: ms(3),
                iowait: ms(4),
                irq: ms(5),
                softirq: ms(6),
                steal: ms(7),
            }
        })
        .collect()
}

fn read_load_average(path: &Path) -> LoadAverage {
    sysfs::read_string(path)
        .map(|raw| parse_load_average(&raw))
        .unwrap_or_default()
}

pub(crate) fn parse_load_average(raw: &str) -> LoadAverage {
    let parts: Vec<&str> = raw.split_whitespace().collect();
    let load = |index: usize| {
        parts
            .get(index)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0)
    };
    let (running, total) = parts
        .get(3)
        .and_then(|pair| pair.split_once('/'))
        .map(|(r, t)| (r.parse().unwrap_or(0), t.parse().unwrap_or(0)))
        .unwrap_or((0, 0));

    LoadAverage {
        load1: load(0),
        load5: load(1),
        load15: load(2),
        running_processes: running,
        total_processes: total,
    }
}

/// Returns `(uptime, idle_time)` in seconds from `/proc/uptime`.
fn read_uptime(path: &Path) -> (f64, f64) {
    let Some(raw) = sysfs::read_string(path) else {
        return (0.0, 0.0);
    };
    let mut parts = raw.split_whitespace();
    let mut next = || {
        parts
            .next()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0)
    };
    (next(), next())
}

fn read_cpu_list(path: &Path) -> Vec<u32> {
    sysfs::read_string(path)
        .map(|raw| parse_cpu_list(&raw))
        .unwrap_or_default()
}

/// Parse the kernel's cpulist format, e.g. `0-3,5`. An empty file
/// (no offline cores) yields an empty list.
pub(crate) fn parse_cpu_list(raw: &str) -> Vec<u32> {
    let mut cpus = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((start, end)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (start.parse::<u32>(), end.parse::<u32>()) {
                cpus.extend(start..=end);
            }
        } else if let Ok(cpu) = part.parse() {
            cpus.push(cpu);
        }
    }
    cpus
}

/// Cores without cpufreq accounting (no `time_in_state`) are skipped.
pub(crate) fn read_frequency_stats(root: &Path) -> Vec<CpuFrequencyStats> {
    (0..CPU_COUNT)
        .filter_map(|cpu| {
            let dir = root.join(format!("cpu{}/cpufreq/stats", cpu));
            let raw = sysfs::read_string(&dir.join("time_in_state"))?;
            Some(CpuFrequencyStats {
                cpu,
                time_in_state: parse_time_in_state(&raw),
                total_transitions: sysfs::read_int(&dir.join("total_trans")).unwrap_or(0) as u64,
            })
        })
        .collect()
}

pub(crate) fn parse_time_in_state(raw: &str) -> Vec<CpuTimeInState> {
    raw.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let khz: f64 = parts.next()?.parse().ok()?;
            let jiffies: u64 = parts.next()?.parse().ok()?;
            Some(CpuTimeInState {
                frequency: sysfs::khz_to_mhz(khz),
                time_ms: jiffies * JIFFY_MS,
            })
        })
        .collect()
}

/// Cores with no readable cpuidle states are skipped entirely.
pub(crate) fn read_idle_stats(root: &Path) -> Vec<CpuIdleInfo> {
    (0..CPU_COUNT)
        .filter_map(|cpu| {
            let states: Vec<CpuIdleStateInfo> = (0..IDLE_STATE_COUNT)
                .filter_map(|state| read_idle_state(root, cpu, state))
                .collect();
            if states.is_empty() {
                return None;
            }
            Some(CpuIdleInfo { cpu, states })
        })
        .collect()
}

fn read_idle_state(root: &Path, cpu: u32, state: u32) -> Option<CpuIdleStateInfo> {
    let dir = root.join(format!("cpu{}/cpuidle/state{}", cpu, state));
    let name = sysfs::read_string(&dir.join("name"))?;
    Some(CpuIdleStateInfo {
        index: state,
        name,
        description: sysfs::read_string(&dir.join("desc")).unwrap_or_default(),
        usage: sysfs::read_int(&dir.join("usage")).unwrap_or(0) as u64,
        time_us: sysfs::read_int(&dir.join("time")).unwrap_or(0) as u64,
        latency_us: sysfs::read_int(&dir.join("latency")).unwrap_or(0) as u64,
    })
}
