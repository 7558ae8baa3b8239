//! Sensor probe: IIO devices (light, proximity, IMU, magnetometer
//! and the SoC ADC).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::probes::sysfs;

const IIO_DIR: &str = "/sys/bus/iio/devices";

/// stk3310 combined ambient light / proximity sensor.
const LIGHT_DEVICE: &str = "iio:device0";
/// af8133j magnetometer.
const MAGNETOMETER_DEVICE: &str = "iio:device1";
/// rockchip-saradc, six channels.
const ADC_DEVICE: &str = "iio:device2";
/// mpu6500 accelerometer + gyroscope.
const IMU_DEVICE: &str = "iio:device3";

const ADC_CHANNEL_COUNT: u32 = 6;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Ambient light reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbientLightInfo {
    pub illuminance_raw: i64,
    pub illuminance_scale: f64,
    /// Raw value times scale, in lux
    pub illuminance_lux: f64,
}

impl Default for AmbientLightInfo {
    fn default() -> Self {
        Self {
            illuminance_raw: 0,
            illuminance_scale: 1.0,
            illuminance_lux: 0.0,
        }
    }
}

/// Proximity reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProximityInfo {
    pub proximity_raw: i64,
    pub proximity_scale: f64,
    /// Threshold above which something is considered near
    pub near_level: i64,
    pub is_near: bool,
}

impl Default for ProximityInfo {
    fn default() -> Self {
        Self {
            proximity_raw: 0,
            proximity_scale: 1.0,
            near_level: 100,
            is_near: false,
        }
    }
}

/// Accelerometer reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccelerometerInfo {
    pub raw: Vector3,
    pub scale: f64,
    /// Scaled acceleration vector
    pub acceleration: Vector3,
    /// Euclidean magnitude of the scaled vector
    pub magnitude: f64,
}

impl Default for AccelerometerInfo {
    fn default() -> Self {
        Self {
            raw: Vector3::default(),
            scale: 1.0,
            acceleration: Vector3::default(),
            magnitude: 0.0,
        }
    }
}

/// Gyroscope reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GyroscopeInfo {
    pub raw: Vector3,
    pub scale: f64,
    /// Scaled angular velocity vector
    pub angular_velocity: Vector3,
    pub magnitude: f64,
}

impl Default for GyroscopeInfo {
    fn default() -> Self {
        Self {
            raw: Vector3::default(),
            scale: 1.0,
            angular_velocity: Vector3::default(),
            magnitude: 0.0,
        }
    }
}

/// Magnetometer reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagnetometerInfo {
    pub raw: Vector3,
    pub scale: f64,
    /// Scaled magnetic field vector
    pub magnetic_field: Vector3,
    /// Compass heading in degrees, 0-360
    pub heading: f64,
}

impl Default for MagnetometerInfo {
    fn default() -> Self {
        Self {
            raw: Vector3::default(),
            scale: 1.0,
            magnetic_field: Vector3::default(),
            heading: 0.0,
        }
    }
}

/// One ADC channel reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdcChannelInfo {
    pub channel: u32,
    pub raw: i64,
    pub scale: f64,
    /// Raw value times scale
    pub voltage: f64,
}

/// Sensors telemetry fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorsInfo {
    pub ambient_light: AmbientLightInfo,
    pub proximity: ProximityInfo,
    pub accelerometer: AccelerometerInfo,
    pub gyroscope: GyroscopeInfo,
    pub magnetometer: MagnetometerInfo,
    pub adc_channels: Vec<AdcChannelInfo>,
}

/// Collect all IIO sensor readings.
pub async fn collect() -> Result<SensorsInfo> {
    let root = Path::new(IIO_DIR);
    if sysfs::list_dir(root).is_empty() {
        return Err(AgentError::probe_error(format!(
            "no IIO devices under {}",
            IIO_DIR
        )));
    }
    Ok(SensorsInfo {
        ambient_light: read_ambient_light(&root.join(LIGHT_DEVICE)),
        proximity: read_proximity(&root.join(LIGHT_DEVICE)),
        accelerometer: read_accelerometer(&root.join(IMU_DEVICE)),
        gyroscope: read_gyroscope(&root.join(IMU_DEVICE)),
        magnetometer: read_magnetometer(&root.join(MAGNETOMETER_DEVICE)),
        adc_channels: read_adc(&root.join(ADC_DEVICE)),
    })
}

pub(crate) fn read_ambient_light(dir: &Path) -> AmbientLightInfo {
    let raw = sysfs::read_int(&dir.join("in_illuminance_raw")).unwrap_or(0);
    let scale = sysfs::read_number(&dir.join("in_illuminance_scale")).unwrap_or(1.0);
    AmbientLightInfo {
        illuminance_raw: raw,
        illuminance_scale: scale,
        illuminance_lux: raw as f64 * scale,
    }
}

pub(crate) fn read_proximity(dir: &Path) -> ProximityInfo {
    let raw = sysfs::read_int(&dir.join("in_proximity_raw")).unwrap_or(0);
    let near_level = sysfs::read_int(&dir.join("in_proximity_nearlevel")).unwrap_or(100);
    ProximityInfo {
        proximity_raw: raw,
        proximity_scale: sysfs::read_number(&dir.join("in_proximity_scale")).unwrap_or(1.0),
        near_level,
        is_near: raw > near_level,
    }
}

pub(crate) fn read_accelerometer(dir: &Path) -> AccelerometerInfo {
    let raw = read_vector(dir, "accel");
    let scale = sysfs::read_number(&dir.join("in_accel_scale")).unwrap_or(1.0);
    let acceleration = scale_vector(&raw, scale);
    AccelerometerInfo {
        magnitude: magnitude(&acceleration),
        raw,
        scale,
        acceleration,
    }
}

pub(crate) fn read_gyroscope(dir: &Path) -> GyroscopeInfo {
    let raw = read_vector(dir, "anglvel");
    let scale = sysfs::read_number(&dir.join("in_anglvel_scale")).unwrap_or(1.0);
    let angular_velocity = scale_vector(&raw, scale);
    GyroscopeInfo {
        magnitude: magnitude(&angular_velocity),
        raw,
        scale,
        angular_velocity,
    }
}

pub(crate) fn read_magnetometer(dir: &Path) -> MagnetometerInfo {
    let raw = read_vector(dir, "magn");
    let scale = sysfs::read_number(&dir.join("in_magn_scale")).unwrap_or(1.0);
    let magnetic_field = scale_vector(&raw, scale);
    MagnetometerInfo {
        heading: heading(&magnetic_field),
        raw,
        scale,
        magnetic_field,
    }
}

/// ADC channels are numbered sequentially; a channel without a raw
/// attribute is skipped.
pub(crate) fn read_adc(dir: &Path) -> Vec<AdcChannelInfo> {
    let scale = sysfs::read_number(&dir.join("in_voltage_scale")).unwrap_or(1.0);
    (0..ADC_CHANNEL_COUNT)
        .filter_map(|channel| {
            let raw = sysfs::read_int(&dir.join(format!("in_voltage{}_raw", channel)))?;
            Some(AdcChannelInfo {
                channel,
                raw,
                scale,
                voltage: raw as f64 * scale,
            })
        })
        .collect()
}

fn read_vector(dir: &Path, kind: &str) -> Vector3 {
    let axis = |name: &str| {
        sysfs::read_int(&dir.join(format!("in_{}_{}_raw", kind, name))).unwrap_or(0) as f64
    };
    Vector3 {
        x: axis("x"),
        y: axis("y"),
        z: axis("z"),
    }
}

fn scale_vector(raw: &Vector3, scale: f64) -> Vector3 {
    Vector3 {
        x: raw.x * scale,
        y: raw.y * scale,
        z: raw.z * scale,
    }
}

fn magnitude(v: &Vector3) -> f64 {
    (v.x * v.x + v.y * v.y + v.z * v.z).sqrt()
}

/// Compass heading from the horizontal field components, normalized
/// to 0-360 degrees.
fn heading(field: &Vector3) -> f64 {
    let degrees = field.y.atan2(field.x).to_degrees();
    if degrees < 0.0 {
        degrees + 360.0
    } else {
        degrees
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_read_accelerometer_scales_and_measures() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("in_accel_x_raw"), "0\n").unwrap();
        fs::write(dir.path().join("in_accel_y_raw"), "0\n").unwrap();
        fs::write(dir.path().join("in_accel_z_raw"), "16384\n").unwrap();
        fs::write(dir.path().join("in_accel_scale"), "0.000598\n").unwrap();

        let accel = read_accelerometer(dir.path());

        assert_eq!(accel.raw.z, 16384.0);
        assert!((accel.acceleration.z - 16384.0 * 0.000598).abs() < 1e-9);
        assert!((accel.magnitude - accel.acceleration.z).abs() < 1e-9);
    }

    #[test]
    fn test_magnetometer_heading_normalization() {
        // Field pointing along -y: atan2 gives -90, normalized to 270.
        let south = Vector3 {
            x: 0.0,
            y: -1.0,
            z: 0.0,
        };
        assert!((heading(&south) - 270.0).abs() < 1e-9);

        let east = Vector3 {
            x: 0.0,
            y: 1.0,
            z: 0.0,
        };
        assert!((heading(&east) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_proximity_near_detection() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("in_proximity_raw"), "180\n").unwrap();
        fs::write(dir.path().join("in_proximity_nearlevel"), "100\n").unwrap();

        let proximity = read_proximity(dir.path());

        assert_eq!(proximity.proximity_raw, 180);
        assert_eq!(proximity.near_level, 100);
        assert!(proximity.is_near);
    }

    #[test]
    fn test_read_adc_skips_missing_channels() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("in_voltage_scale"), "0.439453125\n").unwrap();
        fs::write(dir.path().join("in_voltage0_raw"), "1024\n").unwrap();
        fs::write(dir.path().join("in_voltage3_raw"), "512\n").unwrap();

        let channels = read_adc(dir.path());

        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].channel, 0);
        assert!((channels[0].voltage - 1024.0 * 0.439453125).abs() < 1e-9);
        assert_eq!(channels[1].channel, 3);
    }

    #[test]
    fn test_ambient_light_defaults_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let light = read_ambient_light(dir.path());

        assert_eq!(light.illuminance_raw, 0);
        assert_eq!(light.illuminance_scale, 1.0);
        assert_eq!(light.illuminance_lux, 0.0);
    }
}
