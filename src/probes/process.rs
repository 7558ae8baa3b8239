//! Process probe: per-process accounting from `/proc`, trimmed to the
//! busiest entries, plus kernel-wide scheduler counters.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::probes::sysfs;

const PROC_DIR: &str = "/proc";

/// Milliseconds per jiffy; USER_HZ is 100 on this kernel.
const JIFFY_MS: u64 = 10;
const CLOCK_TICKS: f64 = 100.0;
const PAGE_SIZE: u64 = 4096;

/// One process, read from `/proc/<pid>/stat` and friends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub pid: u32,
    /// Executable name from the stat comm field
    pub name: String,
    /// Single-letter scheduler state (R, S, D, Z, T, ...)
    pub state: String,
    pub ppid: u32,
    pub pgrp: u32,
    pub session: u32,
    /// User-mode CPU time in milliseconds
    pub user_time_ms: u64,
    /// Kernel-mode CPU time in milliseconds
    pub system_time_ms: u64,
    /// Combined CPU time in milliseconds
    pub total_cpu_time_ms: u64,
    /// Virtual memory size in bytes
    pub vsize: u64,
    /// Resident set size in bytes
    pub rss: u64,
    /// Resident set limit in bytes
    pub rss_limit: u64,
    /// Resident set as a share of MemTotal, in percent
    pub memory_percent: f64,
    pub num_threads: u32,
    pub nice: i64,
    pub priority: i64,
    /// Process start, in seconds after boot
    pub start_time: f64,
    /// Full command line, falling back to the comm name
    pub cmdline: String,
    pub oom_score: i64,
}

/// Scheduler-state counts across all scanned processes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessSummary {
    pub total: u64,
    pub running: u64,
    pub sleeping: u64,
    pub zombie: u64,
    pub stopped: u64,
}

/// Processes telemetry fragment. The process list holds only the top
/// consumers by CPU time; the summary covers everything scanned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessesInfo {
    pub processes: Vec<ProcessInfo>,
    pub summary: ProcessSummary,
    /// All-cores CPU time since boot in milliseconds
    pub total_cpu_time: u64,
    pub context_switches: u64,
    pub processes_created: u64,
}

/// Collect the process table, keeping the `max_processes` busiest.
pub async fn collect(max_processes: usize) -> Result<ProcessesInfo> {
    let proc_dir = Path::new(PROC_DIR);
    if list_pids(proc_dir).is_empty() {
        return Err(AgentError::probe_error("no process entries under /proc"));
    }
    Ok(read_processes(proc_dir, max_processes))
}

pub(crate) fn read_processes(proc_dir: &Path, max_processes: usize) -> ProcessesInfo {
    let mem_total = sysfs::read_string(&proc_dir.join("meminfo"))
        .map(|content| {
            sysfs::parse_meminfo(&content)
                .get("MemTotal")
                .copied()
                .unwrap_or(0)
        })
        .unwrap_or(0);

    let mut processes: Vec<ProcessInfo> = list_pids(proc_dir)
        .into_iter()
        .filter_map(|pid| read_process(proc_dir, pid, mem_total))
        .collect();

    let summary = summarize(&processes);
    processes.sort_by(|a, b| b.total_cpu_time_ms.cmp(&a.total_cpu_time_ms));
    processes.truncate(max_processes);

    let (total_cpu_time, context_switches, processes_created) =
        read_kernel_counters(&proc_dir.join("stat"));

    ProcessesInfo {
        processes,
        summary,
        total_cpu_time,
        context_switches,
        processes_created,
    }
}

fn list_pids(proc_dir: &Path) -> Vec<u32> {
    sysfs::list_dir(proc_dir)
        .into_iter()
        .filter_map(|name| name.parse().ok())
        .collect()
}

fn read_process(proc_dir: &Path, pid: u32, mem_total: u64) -> Option<ProcessInfo> {
    let pid_dir = proc_dir.join(pid.to_string());
    let stat_line = sysfs::read_string(&pid_dir.join("stat"))?;
    let mut process = parse_process_stat(&stat_line, mem_total)?;
    if let Some(cmdline) = read_cmdline(&pid_dir.join("cmdline")) {
        process.cmdline = cmdline;
    }
    process.oom_score = sysfs::read_int(&pid_dir.join("oom_score")).unwrap_or(0);
    Some(process)
}

/// Parse one `/proc/<pid>/stat` line. The comm field is delimited by
/// the first `(` and the last `)`, which keeps names containing
/// spaces or parentheses intact.
pub(crate) fn parse_process_stat(line: &str, mem_total: u64) -> Option<ProcessInfo> {
    let open = line.find('(')?;
    let close = line.rfind(')')?;
    let pid: u32 = line[..open].trim().parse().ok()?;
    let name = line[open + 1..close].to_string();

    // rest[0] is the state flag; the numbered stat fields follow.
    let rest: Vec<&str> = line[close + 1..].split_whitespace().collect();
    let state = (*rest.first()?).to_string();
    let field = |index: usize| {
        rest.get(index)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
    };
    let signed = |index: usize| {
        rest.get(index)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0)
    };

    let user_time_ms = field(11) * JIFFY_MS;
    let system_time_ms = field(12) * JIFFY_MS;
    let rss = field(21) * PAGE_SIZE;
    let memory_percent = if mem_total > 0 {
        rss as f64 / mem_total as f64 * 100.0
    } else {
        0.0
    };

    Some(ProcessInfo {
        pid,
        cmdline: name.clone(),
        name,
        state,
        ppid: field(1) as u32,
        pgrp: field(2) as u32,
        session: field(3) as u32,
        user_time_ms,
        system_time_ms,
        total_cpu_time_ms: user_time_ms + system_time_ms,
        vsize: field(20),
        rss,
        rss_limit: field(22),
        memory_percent,
        num_threads: field(17) as u32,
        nice: signed(16),
        priority: signed(15),
        start_time: field(19) as f64 / CLOCK_TICKS,
        oom_score: 0,
    })
}

/// The kernel separates cmdline arguments with NUL bytes. An empty
/// cmdline (kernel threads) yields `None`.
fn read_cmdline(path: &Path) -> Option<String> {
    let raw = sysfs::read_string(path)?;
    let cmdline = raw.replace('\0', " ").trim().to_string();
    if cmdline.is_empty() {
        None
    } else {
        Some(cmdline)
    }
}

fn summarize(processes: &[ProcessInfo]) -> ProcessSummary {
    let mut summary = ProcessSummary {
        total: processes.len() as u64,
        ..Default::default()
    };
    for process in processes {
        match process.state.as_str() {
            "R" => summary.running += 1,
            "S" | "D" => summary.sleeping += 1,
            "Z" => summary.zombie += 1,
            "T" | "t" => summary.stopped += 1,
            _ => {}
        }
    }
    summary
}

/// Returns `(total_cpu_time_ms, context_switches, processes_created)`
/// from `/proc/stat`.
fn read_kernel_counters(path: &Path) -> (u64, u64, u64) {
    let Some(content) = sysfs::read_string(path) else {
        return (0, 0, 0);
    };
    let mut total_cpu_time = 0;
    let mut context_switches = 0;
    let mut processes_created = 0;
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("ctxt ") {
            context_switches = rest.trim().parse().unwrap_or(0);
        } else if let Some(rest) = line.strip_prefix("processes ") {
            processes_created = rest.trim().parse().unwrap_or(0);
        } else if line.starts_with("cpu ") {
            if let Some((_, jiffies)) = sysfs::parse_cpu_stat_line(line) {
                total_cpu_time = jiffies.iter().sum::<u64>() * JIFFY_MS;
            }
        }
    }
    (total_cpu_time, context_switches, processes_created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn stat_line(pid: u32, name: &str, state: &str, utime: u64, stime: u64) -> String {
        format!(
            "{} ({}) {} 1 2 3 0 -1 4194560 0 0 0 0 {} {} 0 0 20 -2 4 0 12345 1048576 256 18446744073709551615",
            pid, name, state, utime, stime
        )
    }

    #[test]
    fn test_parse_process_stat_fields() {
        let line = stat_line(1234, "phonehome", "S", 500, 250);
        let process = parse_process_stat(&line, 4 * 1024 * 1024 * 1024).unwrap();

        assert_eq!(process.pid, 1234);
        assert_eq!(process.name, "phonehome");
        assert_eq!(process.state, "S");
        assert_eq!(process.ppid, 1);
        assert_eq!(process.pgrp, 2);
        assert_eq!(process.session, 3);
        assert_eq!(process.user_time_ms, 5000);
        assert_eq!(process.system_time_ms, 2500);
        assert_eq!(process.total_cpu_time_ms, 7500);
        assert_eq!(process.priority, 20);
        assert_eq!(process.nice, -2);
        assert_eq!(process.num_threads, 4);
        assert!((process.start_time - 123.45).abs() < 1e-9);
        assert_eq!(process.vsize, 1_048_576);
        assert_eq!(process.rss, 256 * PAGE_SIZE);
        assert_eq!(process.rss_limit, u64::MAX);
        // 1 MiB resident of 4 GiB total.
        assert!((process.memory_percent - 0.0244140625).abs() < 1e-9);
    }

    #[test]
    fn test_parse_process_stat_comm_with_spaces_and_parens() {
        let line = stat_line(42, "Web (Content)", "R", 0, 0);
        let process = parse_process_stat(&line, 0).unwrap();

        assert_eq!(process.name, "Web (Content)");
        assert_eq!(process.state, "R");
        assert_eq!(process.memory_percent, 0.0);
    }

    #[test]
    fn test_read_processes_top_n_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("meminfo"), "MemTotal: 1024 kB\n").unwrap();
        fs::write(
            dir.path().join("stat"),
            "cpu  100 0 50 1000 0 0 0 0 0 0\nctxt 5555\nprocesses 777\n",
        )
        .unwrap();

        for (pid, utime, state) in [(1, 900, "S"), (2, 100, "R"), (3, 500, "Z")] {
            let pid_dir = dir.path().join(pid.to_string());
            fs::create_dir_all(&pid_dir).unwrap();
            fs::write(
                pid_dir.join("stat"),
                stat_line(pid, &format!("proc{}", pid), state, utime, 0),
            )
            .unwrap();
        }

        let info = read_processes(dir.path(), 2);

        // Top two by CPU time, busiest first.
        assert_eq!(info.processes.len(), 2);
        assert_eq!(info.processes[0].pid, 1);
        assert_eq!(info.processes[1].pid, 3);
        // Summary still covers all three.
        assert_eq!(info.summary.total, 3);
        assert_eq!(info.summary.running, 1);
        assert_eq!(info.summary.sleeping, 1);
        assert_eq!(info.summary.zombie, 1);
        assert_eq!(info.summary.stopped, 0);
        assert_eq!(info.total_cpu_time, 11_500);
        assert_eq!(info.context_switches, 5555);
        assert_eq!(info.processes_created, 777);
    }

    #[test]
    fn test_cmdline_replaces_nul_separators() {
        let dir = tempfile::tempdir().unwrap();
        let pid_dir = dir.path().join("7");
        fs::create_dir_all(&pid_dir).unwrap();
        fs::write(pid_dir.join("stat"), stat_line(7, "agent", "S", 1, 1)).unwrap();
        fs::write(pid_dir.join("cmdline"), "/usr/bin/agent\0--run\0\0").unwrap();
        fs::write(pid_dir.join("oom_score"), "123\n").unwrap();

        let info = read_processes(dir.path(), 10);

        assert_eq!(info.processes[0].cmdline, "/usr/bin/agent --run");
        assert_eq!(info.processes[0].oom_score, 123);
    }

    #[test]
    fn test_kernel_thread_falls_back_to_comm() {
        let dir = tempfile::tempdir().unwrap();
        let pid_dir = dir.path().join("9");
        fs::create_dir_all(&pid_dir).unwrap();
        fs::write(pid_dir.join("stat"), stat_line(9, "kworker/0:1", "I", 0, 0)).unwrap();
        fs::write(pid_dir.join("cmdline"), "").unwrap();

        let info = read_processes(dir.path(), 10);

        assert_eq!(info.processes[0].cmdline, "kworker/0:1");
    }
}
