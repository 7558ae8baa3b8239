//! Thermal probe: thermal zones and cooling devices.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::probes::sysfs;

const THERMAL_DIR: &str = "/sys/class/thermal";

/// Zones wired up on this board: 0 battery, 1 CPU, 2 GPU.
const ZONE_COUNT: u32 = 3;

/// One thermal zone reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermalZoneInfo {
    /// Zone index under /sys/class/thermal
    pub zone: u32,
    /// Zone type string from the device tree (e.g. "cpu-thermal")
    #[serde(rename = "type")]
    pub kind: String,
    /// Zone temperature in degrees Celsius
    pub temperature: f64,
}

/// One cooling device and its throttle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoolingDeviceInfo {
    /// Device index under /sys/class/thermal
    pub index: u32,
    /// Cooling device type (e.g. "thermal-cpufreq-0")
    #[serde(rename = "type")]
    pub kind: String,
    /// Current throttle state, 0 means unthrottled
    pub current_state: u64,
    /// Deepest available throttle state
    pub max_state: u64,
}

/// Combined thermal snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermalInfo {
    pub zones: Vec<ThermalZoneInfo>,
    pub cooling_devices: Vec<CoolingDeviceInfo>,
    /// Battery zone temperature in degrees Celsius, 0 when absent
    pub battery_temp: f64,
    /// CPU zone temperature in degrees Celsius, 0 when absent
    pub cpu_temp: f64,
    /// GPU zone temperature in degrees Celsius, 0 when absent
    pub gpu_temp: f64,
}

/// Collect thermal zones and cooling devices.
pub async fn collect() -> Result<ThermalInfo> {
    let dir = Path::new(THERMAL_DIR);
    if sysfs::list_dir(dir).is_empty() {
        return Err(AgentError::probe_error(format!(
            "no thermal devices under {}",
            THERMAL_DIR
        )));
    }
    Ok(read_thermal(dir))
}

pub(crate) fn read_thermal(dir: &Path) -> ThermalInfo {
    let zones: Vec<ThermalZoneInfo> = (0..ZONE_COUNT)
        .filter_map(|zone| read_zone(dir, zone))
        .collect();

    let zone_temp = |index: u32| {
        zones
            .iter()
            .find(|z| z.zone == index)
            .map(|z| z.temperature)
            .unwrap_or(0.0)
    };

    ThermalInfo {
        battery_temp: zone_temp(0),
        cpu_temp: zone_temp(1),
        gpu_temp: zone_temp(2),
        cooling_devices: read_cooling_devices(dir),
        zones,
    }
}

/// Read one zone; a zone without a readable `temp` is skipped.
fn read_zone(dir: &Path, zone: u32) -> Option<ThermalZoneInfo> {
    let zone_dir = dir.join(format!("thermal_zone{}", zone));
    let millicelsius = sysfs::read_number(&zone_dir.join("temp"))?;
    Some(ThermalZoneInfo {
        zone,
        kind: sysfs::read_string(&zone_dir.join("type")).unwrap_or_else(|| "unknown".to_string()),
        temperature: sysfs::mc_to_c(millicelsius),
    })
}

fn read_cooling_devices(dir: &Path) -> Vec<CoolingDeviceInfo> {
    sysfs::list_dir(dir)
        .into_iter()
        .filter_map(|name| {
            let index: u32 = name.strip_prefix("cooling_device")?.parse().ok()?;
            let device_dir = dir.join(&name);
            // A device without a type string is not usable.
            let kind = sysfs::read_string(&device_dir.join("type"))?;
            Some(CoolingDeviceInfo {
                index,
                kind,
                current_state: sysfs::read_int(&device_dir.join("cur_state")).unwrap_or(0) as u64,
                max_state: sysfs::read_int(&device_dir.join("max_state")).unwrap_or(0) as u64,
            })
        })
        .collect()
}
