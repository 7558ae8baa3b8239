//! Low-level sysfs and procfs read helpers.
//!
//! Kernel attribute files are tiny, so reads go through blocking
//! `std::fs` calls. Every helper returns `Option`: a missing or
//! malformed attribute is an expected condition on this hardware
//! (drivers come and go with kernel versions), not an error.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Read a sysfs attribute as a trimmed string.
pub fn read_string(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|raw| raw.trim().to_string())
}

/// Read a sysfs attribute as a float.
pub fn read_number(path: &Path) -> Option<f64> {
    read_string(path)?.parse().ok()
}

/// Read a sysfs attribute as a signed integer.
pub fn read_int(path: &Path) -> Option<i64> {
    read_string(path)?.parse().ok()
}

/// Read a sysfs attribute as a boolean. The kernel is not consistent
/// here, so `1`, `true` and `yes` (any case) all count as true.
pub fn read_bool(path: &Path) -> Option<bool> {
    let raw = read_string(path)?;
    Some(matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    ))
}

/// List the entry names of a sysfs directory, sorted for stable output.
/// Returns an empty list when the directory is missing or unreadable.
pub fn list_dir(path: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(path) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    names
}

/// Parse `/proc/meminfo` content into a map of field name to bytes.
/// Values reported in `kB` are scaled; bare counters (e.g. huge page
/// counts) are kept as-is. Parenthesized names like `Active(anon)`
/// are preserved verbatim.
pub fn parse_meminfo(content: &str) -> HashMap<String, u64> {
    let mut values = HashMap::new();
    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let mut parts = rest.split_whitespace();
        let Some(raw) = parts.next().and_then(|v| v.parse::<u64>().ok()) else {
            continue;
        };
        let bytes = match parts.next() {
            Some("kB") => raw * 1024,
            _ => raw,
        };
        values.insert(key.trim().to_string(), bytes);
    }
    values
}

/// Parse one `cpu`-prefixed line of `/proc/stat` into its label and
/// the raw jiffy counters that follow it.
pub fn parse_cpu_stat_line(line: &str) -> Option<(String, Vec<u64>)> {
    let mut parts = line.split_whitespace();
    let label = parts.next()?;
    if !label.starts_with("cpu") {
        return None;
    }
    let values = parts.filter_map(|v| v.parse().ok()).collect();
    Some((label.to_string(), values))
}

/// Extract the active entry from a kernel choice-list attribute,
/// where the selected option is bracketed: `"none [heartbeat] timer"`.
pub fn selected_option(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw[start..].find(']')? + start;
    Some(&raw[start + 1..end])
}

/// Microvolts to volts.
pub fn uv_to_v(uv: f64) -> f64 {
    uv / 1_000_000.0
}

/// Microamps to amps.
pub fn ua_to_a(ua: f64) -> f64 {
    ua / 1_000_000.0
}

/// Millidegrees Celsius to degrees Celsius.
pub fn mc_to_c(mc: f64) -> f64 {
    mc / 1000.0
}

/// Kilohertz to megahertz.
pub fn khz_to_mhz(khz: f64) -> f64 {
    khz / 1000.0
}

/// Hertz to megahertz.
pub fn hz_to_mhz(hz: f64) -> f64 {
    hz / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn write_attr(dir: &Path, name: &str, content: &str) {
        let mut file = File::create(dir.join(name)).unwrap();
        write!(file, "{}", content).unwrap();
    }

    #[test]
    fn test_read_string_trims_newline() {
        let dir = tempfile::tempdir().unwrap();
        write_attr(dir.path(), "status", "Charging\n");

        assert_eq!(
            read_string(&dir.path().join("status")),
            Some("Charging".to_string())
        );
    }

    #[test]
    fn test_read_missing_attribute_is_none() {
        let dir = tempfile::tempdir().unwrap();

        assert_eq!(read_string(&dir.path().join("nope")), None);
        assert_eq!(read_number(&dir.path().join("nope")), None);
        assert_eq!(read_int(&dir.path().join("nope")), None);
        assert_eq!(read_bool(&dir.path().join("nope")), None);
    }

    #[test]
    fn test_read_int_handles_negative_values() {
        let dir = tempfile::tempdir().unwrap();
        write_attr(dir.path(), "current_now", "-421000\n");

        assert_eq!(read_int(&dir.path().join("current_now")), Some(-421_000));
    }

    #[test]
    fn test_read_bool_accepts_kernel_spellings() {
        let dir = tempfile::tempdir().unwrap();
        write_attr(dir.path(), "a", "1\n");
        write_attr(dir.path(), "b", "Yes\n");
        write_attr(dir.path(), "c", "true\n");
        write_attr(dir.path(), "d", "0\n");

        assert_eq!(read_bool(&dir.path().join("a")), Some(true));
        assert_eq!(read_bool(&dir.path().join("b")), Some(true));
        assert_eq!(read_bool(&dir.path().join("c")), Some(true));
        assert_eq!(read_bool(&dir.path().join("d")), Some(false));
    }

    #[test]
    fn test_list_dir_sorts_and_survives_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_attr(dir.path(), "zebra", "");
        write_attr(dir.path(), "alpha", "");

        assert_eq!(list_dir(dir.path()), vec!["alpha", "zebra"]);
        assert!(list_dir(&dir.path().join("missing")).is_empty());
    }

    #[test]
    fn test_parse_meminfo_scales_kb_and_keeps_paren_keys() {
        let content = "MemTotal:        3915776 kB\n\
                       MemFree:          233472 kB\n\
                       Active(anon):     102400 kB\n\
                       HugePages_Total:       0\n";
        let values = parse_meminfo(content);

        assert_eq!(values.get("MemTotal"), Some(&(3_915_776 * 1024)));
        assert_eq!(values.get("Active(anon)"), Some(&(102_400 * 1024)));
        assert_eq!(values.get("HugePages_Total"), Some(&0));
    }

    #[test]
    fn test_parse_cpu_stat_line() {
        let (label, values) =
            parse_cpu_stat_line("cpu0 4705 150 1120 16372 279 0 45 0").unwrap();

        assert_eq!(label, "cpu0");
        assert_eq!(values, vec![4705, 150, 1120, 16372, 279, 0, 45, 0]);
        assert!(parse_cpu_stat_line("intr 123 456").is_none());
        assert!(parse_cpu_stat_line("").is_none());
    }

    #[test]
    fn test_selected_option_extracts_bracketed_entry() {
        assert_eq!(selected_option("none [heartbeat] timer"), Some("heartbeat"));
        assert_eq!(selected_option("C [PD] PD_DRP"), Some("PD"));
        assert_eq!(selected_option("none timer"), None);
        assert_eq!(selected_option(""), None);
    }

    #[test]
    fn test_unit_conversions() {
        assert!((uv_to_v(3_850_000.0) - 3.85).abs() < f64::EPSILON);
        assert!((ua_to_a(-421_000.0) + 0.421).abs() < f64::EPSILON);
        assert!((mc_to_c(42_500.0) - 42.5).abs() < f64::EPSILON);
        assert!((khz_to_mhz(1_416_000.0) - 1416.0).abs() < f64::EPSILON);
        assert!((hz_to_mhz(800_000_000.0) - 800.0).abs() < f64::EPSILON);
    }
}
