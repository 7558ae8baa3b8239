//! Power subsystem probe.
//!
//! Reads the RK818 fuel gauge and charger, the Type-C power delivery
//! source and the Type-C port controller exposed under
//! `/sys/class/power_supply` and `/sys/class/typec`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::probes::sysfs;

const BATTERY_DIR: &str = "/sys/class/power_supply/rk818-battery";
const USB_INPUT_DIR: &str = "/sys/class/power_supply/rk818-usb";
const USB_PD_DIR: &str = "/sys/class/power_supply/tcpm-source-psy-4-0022";
const TYPEC_PORT_DIR: &str = "/sys/class/typec/port0";

/// Battery fuel gauge state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryInfo {
    /// Charge level in percent (0-100)
    pub capacity: u32,
    /// Charging status as reported by the kernel (e.g. "Charging", "Full")
    pub status: String,
    /// Battery voltage in volts
    pub voltage: f64,
    /// Battery current in amps, negative while discharging
    pub current: f64,
    /// Battery temperature in degrees Celsius
    pub temperature: f64,
    /// Last measured full charge in mAh
    pub charge_full: f64,
    /// Designed full charge in mAh
    pub charge_full_design: f64,
    /// Battery health as reported by the kernel
    pub health: String,
    /// Whether a battery is physically present
    pub present: bool,
    /// Active charge profile (e.g. "Fast")
    pub charge_type: String,
    /// Designed energy capacity in Wh
    pub energy_full_design: f64,
}

impl Default for BatteryInfo {
    fn default() -> Self {
        Self {
            capacity: 0,
            status: "Unknown".to_string(),
            voltage: 0.0,
            current: 0.0,
            temperature: 0.0,
            charge_full: 0.0,
            charge_full_design: 0.0,
            health: "Unknown".to_string(),
            present: false,
            charge_type: "Unknown".to_string(),
            energy_full_design: 0.0,
        }
    }
}

/// USB charger input limits negotiated by the RK818.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsbInputInfo {
    /// Whether a USB supply is connected
    pub present: bool,
    /// Supply health as reported by the kernel
    pub health: String,
    /// Negotiated input current limit in amps
    pub input_current_limit: f64,
    /// Negotiated input voltage limit in volts
    pub input_voltage_limit: f64,
}

impl Default for UsbInputInfo {
    fn default() -> Self {
        Self {
            present: false,
            health: "Unknown".to_string(),
            input_current_limit: 0.0,
            input_voltage_limit: 0.0,
        }
    }
}

/// USB-C power delivery source state from the TCPM port manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsbPdInfo {
    /// Whether the PD source is online
    pub online: bool,
    /// Present supply voltage in volts
    pub voltage: f64,
    /// Minimum negotiated voltage in volts
    pub voltage_min: f64,
    /// Maximum negotiated voltage in volts
    pub voltage_max: f64,
    /// Present supply current in amps
    pub current: f64,
    /// Maximum negotiated current in amps
    pub current_max: f64,
    /// Active USB supply type (e.g. "PD", "C")
    pub usb_type: String,
}

impl Default for UsbPdInfo {
    fn default() -> Self {
        Self {
            online: false,
            voltage: 0.0,
            voltage_min: 0.0,
            voltage_max: 0.0,
            current: 0.0,
            current_max: 0.0,
            usb_type: "unknown".to_string(),
        }
    }
}

/// Type-C port controller roles and orientation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeCPortInfo {
    /// Data role of the port ("host" or "device")
    pub data_role: String,
    /// Power role of the port ("source" or "sink")
    pub power_role: String,
    /// Cable plug orientation
    pub orientation: String,
    /// Power operation mode (e.g. "default", "3.0A", "usb_power_delivery")
    pub power_operation_mode: String,
    /// Whether this port sources VCONN
    pub vconn_source: bool,
}

impl Default for TypeCPortInfo {
    fn default() -> Self {
        Self {
            data_role: "device".to_string(),
            power_role: "sink".to_string(),
            orientation: "unknown".to_string(),
            power_operation_mode: "default".to_string(),
            vconn_source: false,
        }
    }
}

/// Combined power subsystem snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerInfo {
    pub battery: BatteryInfo,
    pub usb_input: UsbInputInfo,
    pub usb_c_pd: UsbPdInfo,
    pub type_c_port: TypeCPortInfo,
}

/// Collect the full power subsystem state.
///
/// Fails when the fuel gauge is not registered at all; individual
/// missing attributes fall back to their zero values.
pub async fn collect() -> Result<PowerInfo> {
    let battery_dir = Path::new(BATTERY_DIR);
    if !battery_dir.is_dir() {
        return Err(AgentError::probe_error(format!(
            "battery supply not registered at {}",
            BATTERY_DIR
        )));
    }

    Ok(PowerInfo {
        battery: read_battery(battery_dir),
        usb_input: read_usb_input(Path::new(USB_INPUT_DIR)),
        usb_c_pd: read_usb_pd(Path::new(USB_PD_DIR)),
        type_c_port: read_type_c_port(Path::new(TYPEC_PORT_DIR)),
    })
}

pub(crate) fn read_battery(dir: &Path) -> BatteryInfo {
    let defaults = BatteryInfo::default();
    BatteryInfo {
        capacity: sysfs::read_int(&dir.join("capacity")).unwrap_or(0) as u32,
        status: sysfs::read_string(&dir.join("status")).unwrap_or(defaults.status),
        voltage: sysfs::uv_to_v(sysfs::read_number(&dir.join("voltage_now")).unwrap_or(0.0)),
        current: sysfs::ua_to_a(sysfs::read_number(&dir.join("current_now")).unwrap_or(0.0)),
        // The fuel gauge reports tenths of a degree.
        temperature: sysfs::read_number(&dir.join("temp")).unwrap_or(0.0) / 10.0,
        // uAh to mAh.
        charge_full: sysfs::read_number(&dir.join("charge_full")).unwrap_or(0.0) / 1000.0,
        charge_full_design: sysfs::read_number(&dir.join("charge_full_design")).unwrap_or(0.0)
            / 1000.0,
        health: sysfs::read_string(&dir.join("health")).unwrap_or(defaults.health),
        present: sysfs::read_bool(&dir.join("present")).unwrap_or(false),
        charge_type: sysfs::read_string(&dir.join("charge_type")).unwrap_or(defaults.charge_type),
        // uWh to Wh.
        energy_full_design: sysfs::read_number(&dir.join("energy_full_design")).unwrap_or(0.0)
            / 1_000_000.0,
    }
}

pub(crate) fn read_usb_input(dir: &Path) -> UsbInputInfo {
    let defaults = UsbInputInfo::default();
    UsbInputInfo {
        present: sysfs::read_bool(&dir.join("present")).unwrap_or(false),
        health: sysfs::read_string(&dir.join("health")).unwrap_or(defaults.health),
        input_current_limit: sysfs::ua_to_a(
            sysfs::read_number(&dir.join("input_current_limit")).unwrap_or(0.0),
        ),
        input_voltage_limit: sysfs::uv_to_v(
            sysfs::read_number(&dir.join("input_voltage_limit")).unwrap_or(0.0),
        ),
    }
}

pub(crate) fn read_usb_pd(dir: &Path) -> UsbPdInfo {
    UsbPdInfo {
        online: sysfs::read_bool(&dir.join("online")).unwrap_or(false),
        voltage: sysfs::uv_to_v(sysfs::read_number(&dir.join("voltage_now")).unwrap_or(0.0)),
        voltage_min: sysfs::uv_to_v(sysfs::read_number(&dir.join("voltage_min")).unwrap_or(0.0)),
        voltage_max: sysfs::uv_to_v(sysfs::read_number(&dir.join("voltage_max")).unwrap_or(0.0)),
        current: sysfs::ua_to_a(sysfs::read_number(&dir.join("current_now")).unwrap_or(0.0)),
        current_max: sysfs::ua_to_a(sysfs::read_number(&dir.join("current_max")).unwrap_or(0.0)),
        usb_type: read_usb_type(dir),
    }
}

/// `usb_type` lists the supported types with the active one in
/// brackets ("C [PD] PD_PPS"); older kernels report a single token.
fn read_usb_type(dir: &Path) -> String {
    let Some(raw) = sysfs::read_string(&dir.join("usb_type")) else {
        return "unknown".to_string();
    };
    if let Some(active) = sysfs::selected_option(&raw) {
        return active.to_string();
    }
    raw.split_whitespace()
        .next()
        .unwrap_or("unknown")
        .to_string()
}

pub(crate) fn read_type_c_port(dir: &Path) -> TypeCPortInfo {
    let defaults = TypeCPortInfo::default();
    TypeCPortInfo {
        data_role: sysfs::read_string(&dir.join("data_role")).unwrap_or(defaults.data_role),
        power_role: sysfs::read_string(&dir.join("power_role")).unwrap_or(defaults.power_role),
        orientation: sysfs::read_string(&dir.join("orientation")).unwrap_or(defaults.orientation),
        power_operation_mode: sysfs::read_string(&dir.join("power_operation_mode"))
            .unwrap_or(defaults.power_operation_mode),
        vconn_source: sysfs::read_bool(&dir.join("vconn_source")).unwrap_or(false),
    }
}
