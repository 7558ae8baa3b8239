//! Network probe: per-interface counters from `/sys/class/net`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::probes::sysfs;

const NET_CLASS_DIR: &str = "/sys/class/net";

/// Interface counters since boot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceStats {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
    pub rx_dropped: u64,
    pub tx_dropped: u64,
    pub rx_fifo: u64,
    pub tx_fifo: u64,
    pub rx_frame: u64,
    pub tx_carrier: u64,
    pub collisions: u64,
}

/// One network interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceInfo {
    pub name: String,
    /// MAC address, zeroed when the kernel does not expose one
    pub address: String,
    /// Physical link detected
    pub carrier: bool,
    pub carrier_changes: u64,
    /// RFC 2863 operational state (e.g. "up", "down", "dormant")
    pub operstate: String,
    pub mtu: u32,
    pub stats: NetworkInterfaceStats,
    /// Interface class derived from its name ("wifi", "cellular", ...)
    #[serde(rename = "type")]
    pub kind: String,
}

/// Network telemetry fragment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub interfaces: Vec<NetworkInterfaceInfo>,
    /// Bytes received across all interfaces except loopback
    pub total_rx_bytes: u64,
    /// Bytes sent across all interfaces except loopback
    pub total_tx_bytes: u64,
}

/// Collect all network interfaces.
pub async fn collect() -> Result<NetworkInfo> {
    let dir = Path::new(NET_CLASS_DIR);
    if sysfs::list_dir(dir).is_empty() {
        return Err(AgentError::probe_error(format!(
            "no interfaces under {}",
            NET_CLASS_DIR
        )));
    }
    Ok(read_network(dir))
}

pub(crate) fn read_network(dir: &Path) -> NetworkInfo {
    let interfaces: Vec<NetworkInterfaceInfo> = sysfs::list_dir(dir)
        .into_iter()
        .filter(|name| !name.starts_with('.'))
        .map(|name| read_interface(dir, &name))
        .collect();

    let total_rx_bytes = interfaces
        .iter()
        .filter(|iface| iface.kind != "loopback")
        .map(|iface| iface.stats.rx_bytes)
        .sum();
    let total_tx_bytes = interfaces
        .iter()
        .filter(|iface| iface.kind != "loopback")
        .map(|iface| iface.stats.tx_bytes)
        .sum();

    NetworkInfo {
        interfaces,
        total_rx_bytes,
        total_tx_bytes,
    }
}

fn read_interface(dir: &Path, name: &str) -> NetworkInterfaceInfo {
    let iface_dir = dir.join(name);
    NetworkInterfaceInfo {
        name: name.to_string(),
        address: sysfs::read_string(&iface_dir.join("address"))
            .unwrap_or_else(|| "00:00:00:00:00:00".to_string()),
        // Reading carrier on an administratively down interface
        // fails with EINVAL; that counts as no link.
        carrier: sysfs::read_bool(&iface_dir.join("carrier")).unwrap_or(false),
        carrier_changes: sysfs::read_int(&iface_dir.join("carrier_changes")).unwrap_or(0) as u64,
        operstate: sysfs::read_string(&iface_dir.join("operstate"))
            .unwrap_or_else(|| "unknown".to_string()),
        mtu: sysfs::read_int(&iface_dir.join("mtu")).unwrap_or(0) as u32,
        stats: read_interface_stats(&iface_dir.join("statistics")),
        kind: classify_interface(name).to_string(),
    }
}

fn read_interface_stats(dir: &Path) -> NetworkInterfaceStats {
    let counter = |name: &str| sysfs::read_int(&dir.join(name)).unwrap_or(0) as u64;
    NetworkInterfaceStats {
        rx_bytes: counter("rx_bytes"),
        tx_bytes: counter("tx_bytes"),
        rx_packets: counter("rx_packets"),
        tx_packets: counter("tx_packets"),
        rx_errors: counter("rx_errors"),
        tx_errors: counter("tx_errors"),
        rx_dropped: counter("rx_dropped"),
        tx_dropped: counter("tx_dropped"),
        rx_fifo: counter("rx_fifo_errors"),
        tx_fifo: counter("tx_fifo_errors"),
        rx_frame: counter("rx_frame_errors"),
        tx_carrier: counter("tx_carrier_errors"),
        collisions: counter("collisions"),
    }
}

pub(crate) fn classify_interface(name: &str) -> &'static str {
    if name == "lo" {
        "loopback"
    } else if name.starts_with("wlan") {
        "wifi"
    } else if name.starts_with("wwan") {
        "cellular"
    } else if name.starts_with("usb") {
        "usb"
    } else {
        "other"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_interface(dir: &Path, name: &str, rx: u64, tx: u64) {
        let stats = dir.join(name).join("statistics");
        fs::create_dir_all(&stats).unwrap();
        fs::write(stats.join("rx_bytes"), format!("{}\n", rx)).unwrap();
        fs::write(stats.join("tx_bytes"), format!("{}\n", tx)).unwrap();
    }

    #[test]
    fn test_classify_interface() {
        assert_eq!(classify_interface("lo"), "loopback");
        assert_eq!(classify_interface("wlan0"), "wifi");
        assert_eq!(classify_interface("wwan0"), "cellular");
        assert_eq!(classify_interface("usb0"), "usb");
        assert_eq!(classify_interface("eth0"), "other");
    }

    #[test]
    fn test_totals_exclude_loopback() {
        let dir = tempfile::tempdir().unwrap();
        write_interface(dir.path(), "wlan0", 1000, 400);
        write_interface(dir.path(), "wwan0", 200, 100);
        write_interface(dir.path(), "lo", 50_000, 50_000);

        let network = read_network(dir.path());

        assert_eq!(network.interfaces.len(), 3);
        assert_eq!(network.total_rx_bytes, 1200);
        assert_eq!(network.total_tx_bytes, 500);
    }

    #[test]
    fn test_read_interface_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("wlan0")).unwrap();

        let network = read_network(dir.path());
        let iface = &network.interfaces[0];

        assert_eq!(iface.name, "wlan0");
        assert_eq!(iface.address, "00:00:00:00:00:00");
        assert!(!iface.carrier);
        assert_eq!(iface.operstate, "unknown");
        assert_eq!(iface.mtu, 0);
        assert_eq!(iface.kind, "wifi");
        assert_eq!(iface.stats.rx_bytes, 0);
    }

    #[test]
    fn test_interface_attributes_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let iface_dir = dir.path().join("wlan0");
        fs::create_dir_all(iface_dir.join("statistics")).unwrap();
        fs::write(iface_dir.join("address"), "02:ba:7c:11:22:33\n").unwrap();
        fs::write(iface_dir.join("carrier"), "1\n").unwrap();
        fs::write(iface_dir.join("carrier_changes"), "4\n").unwrap();
        fs::write(iface_dir.join("operstate"), "up\n").unwrap();
        fs::write(iface_dir.join("mtu"), "1500\n").unwrap();
        fs::write(iface_dir.join("statistics/rx_packets"), "981\n").unwrap();

        let network = read_network(dir.path());
        let iface = &network.interfaces[0];

        assert_eq!(iface.address, "02:ba:7c:11:22:33");
        assert!(iface.carrier);
        assert_eq!(iface.carrier_changes, 4);
        assert_eq!(iface.operstate, "up");
        assert_eq!(iface.mtu, 1500);
        assert_eq!(iface.stats.rx_packets, 981);
    }
}
