//! Storage probe: block device I/O accounting from `/proc/diskstats`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::probes::sysfs;

const PROC_DISKSTATS: &str = "/proc/diskstats";
const BLOCK_DIR: &str = "/sys/block";
const SECTOR_SIZE: u64 = 512;

/// Whole devices worth tracking on this phone: eMMC, SD card and the
/// zram swap device. Partitions are skipped.
const TRACKED_DEVICES: [&str; 3] = ["mmcblk1", "mmcblk2", "zram0"];

/// Raw `/proc/diskstats` counters for one device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDeviceStats {
    pub reads_completed: u64,
    pub reads_merged: u64,
    pub sectors_read: u64,
    pub read_time_ms: u64,
    pub writes_completed: u64,
    pub writes_merged: u64,
    pub sectors_written: u64,
    pub write_time_ms: u64,
    pub ios_in_progress: u64,
    pub io_time_ms: u64,
    pub weighted_io_time_ms: u64,
}

/// One tracked block device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDeviceInfo {
    pub name: String,
    /// Device class derived from its name ("emmc", "sdcard", "zram")
    #[serde(rename = "type")]
    pub kind: String,
    /// Device size in bytes
    pub size: u64,
    pub stats: BlockDeviceStats,
    /// Bytes read since boot
    pub bytes_read: u64,
    /// Bytes written since boot
    pub bytes_written: u64,
}

/// Storage telemetry fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub devices: Vec<BlockDeviceInfo>,
    pub total_bytes_read: u64,
    pub total_bytes_written: u64,
    pub total_io_time_ms: u64,
}

/// Collect I/O accounting for the tracked block devices.
pub async fn collect() -> Result<StorageInfo> {
    let Some(content) = sysfs::read_string(Path::new(PROC_DISKSTATS)) else {
        return Err(AgentError::probe_error("/proc/diskstats is unreadable"));
    };
    Ok(build_storage(&content, Path::new(BLOCK_DIR)))
}

pub(crate) fn build_storage(diskstats: &str, block_dir: &Path) -> StorageInfo {
    let mut storage = StorageInfo::default();

    for (name, stats) in parse_diskstats(diskstats) {
        if !TRACKED_DEVICES.contains(&name.as_str()) {
            continue;
        }
        let sectors = sysfs::read_int(&block_dir.join(&name).join("size")).unwrap_or(0) as u64;
        let device = BlockDeviceInfo {
            kind: classify_device(&name).to_string(),
            size: sectors * SECTOR_SIZE,
            bytes_read: stats.sectors_read * SECTOR_SIZE,
            bytes_written: stats.sectors_written * SECTOR_SIZE,
            stats,
            name,
        };
        storage.total_bytes_read += device.bytes_read;
        storage.total_bytes_written += device.bytes_written;
        storage.total_io_time_ms += device.stats.io_time_ms;
        storage.devices.push(device);
    }

    storage
}

/// Parse `/proc/diskstats` lines into device name and counters.
/// Lines with fewer than the 14 classic fields are skipped.
pub(crate) fn parse_diskstats(content: &str) -> Vec<(String, BlockDeviceStats)> {
    content
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 14 {
                return None;
            }
            let value = |index: usize| parts[index].parse::<u64>().unwrap_or(0);
            let stats = BlockDeviceStats {
                reads_completed: value(3),
                reads_merged: value(4),
                sectors_read: value(5),
                read_time_ms: value(6),
                writes_completed: value(7),
                writes_merged: value(8),
                sectors_written: value(9),
                write_time_ms: value(10),
                ios_in_progress: value(11),
                io_time_ms: value(12),
                weighted_io_time_ms: value(13),
            };
            Some((parts[2].to_string(), stats))
        })
        .collect()
}

pub(crate) fn classify_device(name: &str) -> &'static str {
    if name.starts_with("mmcblk2") {
        "emmc"
    } else if name.starts_with("mmcblk1") {
        "sdcard"
    } else if name.starts_with("zram") {
        "zram"
    } else if name.starts_with("loop") {
        "loop"
    } else {
        "other"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SAMPLE: &str = "\
 179       0 mmcblk2 5028 1650 382910 4280 1453 2022 122312 12922 0 9787 17202
 179       1 mmcblk2p1 120 0 8000 90 10 0 512 12 0 80 102
 179      32 mmcblk1 200 10 16000 150 0 0 0 0 0 140 150
 254       0 zram0 9000 0 72000 300 4000 0 32000 250 0 500 550
   7       0 loop0 30 0 240 5 0 0 0 0 0 4 5
";

    #[test]
    fn test_parse_diskstats_reads_all_counters() {
        let parsed = parse_diskstats(SAMPLE);

        assert_eq!(parsed.len(), 5);
        let (name, stats) = &parsed[0];
        assert_eq!(name, "mmcblk2");
        assert_eq!(stats.reads_completed, 5028);
        assert_eq!(stats.reads_merged, 1650);
        assert_eq!(stats.sectors_read, 382_910);
        assert_eq!(stats.read_time_ms, 4280);
        assert_eq!(stats.writes_completed, 1453);
        assert_eq!(stats.sectors_written, 122_312);
        assert_eq!(stats.write_time_ms, 12_922);
        assert_eq!(stats.ios_in_progress, 0);
        assert_eq!(stats.io_time_ms, 9787);
        assert_eq!(stats.weighted_io_time_ms, 17_202);
    }

    #[test]
    fn test_parse_diskstats_skips_short_lines() {
        assert!(parse_diskstats("179 0 mmcblk2 5028\n\n").is_empty());
    }

    #[test]
    fn test_build_storage_tracks_whole_devices_only() {
        let dir = tempfile::tempdir().unwrap();
        let emmc = dir.path().join("mmcblk2");
        fs::create_dir_all(&emmc).unwrap();
        fs::write(emmc.join("size"), "30535680\n").unwrap();

        let storage = build_storage(SAMPLE, dir.path());
        let names: Vec<&str> = storage.devices.iter().map(|d| d.name.as_str()).collect();

        // The partition and the loop device are filtered out.
        assert_eq!(names, vec!["mmcblk2", "mmcblk1", "zram0"]);
        assert_eq!(storage.devices[0].kind, "emmc");
        assert_eq!(storage.devices[0].size, 30_535_680 * SECTOR_SIZE);
        assert_eq!(storage.devices[0].bytes_read, 382_910 * SECTOR_SIZE);
        // mmcblk1 has no size attribute in this fixture.
        assert_eq!(storage.devices[1].size, 0);
    }

    #[test]
    fn test_build_storage_accumulates_totals() {
        let dir = tempfile::tempdir().unwrap();
        let storage = build_storage(SAMPLE, dir.path());

        assert_eq!(
            storage.total_bytes_read,
            (382_910 + 16_000 + 72_000) * SECTOR_SIZE
        );
        assert_eq!(
            storage.total_bytes_written,
            (122_312 + 32_000) * SECTOR_SIZE
        );
        assert_eq!(storage.total_io_time_ms, 9787 + 140 + 500);
    }

    #[test]
    fn test_classify_device() {
        assert_eq!(classify_device("mmcblk2"), "emmc");
        assert_eq!(classify_device("mmcblk1"), "sdcard");
        assert_eq!(classify_device("zram0"), "zram");
        assert_eq!(classify_device("loop3"), "loop");
        assert_eq!(classify_device("sda"), "other");
    }
}
