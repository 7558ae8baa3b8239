//! System probe: backlight, LEDs, rfkill switches and wakeup count.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::probes::sysfs;

const BACKLIGHT_DIR: &str = "/sys/class/backlight/backlight";
const LEDS_DIR: &str = "/sys/class/leds";
const RFKILL_DIR: &str = "/sys/class/rfkill";
const WAKEUP_COUNT_PATH: &str = "/sys/power/wakeup_count";

/// Display backlight state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayInfo {
    pub brightness: u64,
    pub max_brightness: u64,
    pub brightness_percent: f64,
    /// Whether the panel is powered (bl_power 0 means on)
    pub power: bool,
}

impl Default for DisplayInfo {
    fn default() -> Self {
        Self {
            brightness: 0,
            max_brightness: 1,
            brightness_percent: 0.0,
            power: false,
        }
    }
}

/// One LED and its active trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedInfo {
    pub name: String,
    pub brightness: u64,
    pub max_brightness: u64,
    /// Active trigger, "none" when untriggered
    pub trigger: String,
}

/// One rfkill switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RfkillInfo {
    /// Radio class ("wifi", "bluetooth" or "wwan")
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub soft_blocked: bool,
    pub hard_blocked: bool,
}

/// System telemetry fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub display: DisplayInfo,
    pub leds: Vec<LedInfo>,
    pub rfkill: Vec<RfkillInfo>,
    /// Kernel wakeup event count
    pub wakeup_count: u64,
}

/// Collect display, LED, rfkill and wakeup state.
pub async fn collect() -> Result<SystemInfo> {
    if !Path::new("/sys/class").is_dir() {
        return Err(AgentError::probe_error("/sys/class is not available"));
    }
    Ok(SystemInfo {
        display: read_display(Path::new(BACKLIGHT_DIR)),
        leds: read_leds(Path::new(LEDS_DIR)),
        rfkill: read_rfkill(Path::new(RFKILL_DIR)),
        wakeup_count: sysfs::read_int(Path::new(WAKEUP_COUNT_PATH)).unwrap_or(0) as u64,
    })
}

pub(crate) fn read_display(dir: &Path) -> DisplayInfo {
    let brightness = sysfs::read_int(&dir.join("brightness")).unwrap_or(0) as u64;
    // max_brightness falls back to 1 to keep the percentage defined.
    let max_brightness = sysfs::read_int(&dir.join("max_brightness")).unwrap_or(1).max(1) as u64;
    DisplayInfo {
        brightness,
        max_brightness,
        brightness_percent: brightness as f64 / max_brightness as f64 * 100.0,
        power: sysfs::read_int(&dir.join("bl_power")).unwrap_or(0) == 0,
    }
}

pub(crate) fn read_leds(dir: &Path) -> Vec<LedInfo> {
    sysfs::list_dir(dir)
        .into_iter()
        .map(|name| {
            let led_dir = dir.join(&name);
            let trigger = sysfs::read_string(&led_dir.join("trigger"))
                .and_then(|raw| sysfs::selected_option(&raw).map(str::to_string))
                .unwrap_or_else(|| "none".to_string());
            LedInfo {
                name,
                brightness: sysfs::read_int(&led_dir.join("brightness")).unwrap_or(0) as u64,
                max_brightness: sysfs::read_int(&led_dir.join("max_brightness")).unwrap_or(1)
                    as u64,
                trigger,
            }
        })
        .collect()
}

pub(crate) fn read_rfkill(dir: &Path) -> Vec<RfkillInfo> {
    sysfs::list_dir(dir)
        .into_iter()
        .filter(|name| name.starts_with("rfkill"))
        .filter_map(|name| {
            let switch_dir = dir.join(&name);
            let raw_kind = sysfs::read_string(&switch_dir.join("type"))?;
            let kind = match raw_kind.as_str() {
                "bluetooth" => "bluetooth",
                "wlan" => "wifi",
                _ => "wwan",
            };
            Some(RfkillInfo {
                kind: kind.to_string(),
                name: sysfs::read_string(&switch_dir.join("name")).unwrap_or_default(),
                soft_blocked: sysfs::read_bool(&switch_dir.join("soft")).unwrap_or(false),
                hard_blocked: sysfs::read_bool(&switch_dir.join("hard")).unwrap_or(false),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_read_display_percent_and_power() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("brightness"), "512\n").unwrap();
        fs::write(dir.path().join("max_brightness"), "1024\n").unwrap();
        fs::write(dir.path().join("bl_power"), "0\n").unwrap();

        let display = read_display(dir.path());

        assert_eq!(display.brightness, 512);
        assert_eq!(display.max_brightness, 1024);
        assert!((display.brightness_percent - 50.0).abs() < 1e-9);
        assert!(display.power);
    }

    #[test]
    fn test_read_display_missing_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let display = read_display(dir.path());

        assert_eq!(display.brightness, 0);
        assert_eq!(display.max_brightness, 1);
        assert_eq!(display.brightness_percent, 0.0);
        // Absent bl_power reads as powered.
        assert!(display.power);
    }

    #[test]
    fn test_read_leds_parses_active_trigger() {
        let dir = tempfile::tempdir().unwrap();
        let led = dir.path().join("red:indicator");
        fs::create_dir_all(&led).unwrap();
        fs::write(led.join("brightness"), "255\n").unwrap();
        fs::write(led.join("max_brightness"), "255\n").unwrap();
        fs::write(led.join("trigger"), "none timer [heartbeat] rfkill0\n").unwrap();

        let leds = read_leds(dir.path());

        assert_eq!(leds.len(), 1);
        assert_eq!(leds[0].name, "red:indicator");
        assert_eq!(leds[0].brightness, 255);
        assert_eq!(leds[0].trigger, "heartbeat");
    }

    #[test]
    fn test_read_rfkill_maps_types_and_skips_typeless() {
        let dir = tempfile::tempdir().unwrap();
        for (name, kind, soft) in [
            ("rfkill0", Some("wlan"), "0"),
            ("rfkill1", Some("bluetooth"), "1"),
            ("rfkill2", None, "0"),
        ] {
            let switch = dir.path().join(name);
            fs::create_dir_all(&switch).unwrap();
            if let Some(kind) = kind {
                fs::write(switch.join("type"), format!("{}\n", kind)).unwrap();
            }
            fs::write(switch.join("name"), "dev\n").unwrap();
            fs::write(switch.join("soft"), format!("{}\n", soft)).unwrap();
            fs::write(switch.join("hard"), "0\n").unwrap();
        }

        let switches = read_rfkill(dir.path());

        assert_eq!(switches.len(), 2);
        assert_eq!(switches[0].kind, "wifi");
        assert!(!switches[0].soft_blocked);
        assert_eq!(switches[1].kind, "bluetooth");
        assert!(switches[1].soft_blocked);
    }
}
