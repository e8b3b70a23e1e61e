//! Reads memory, swap, pressure and process figures from the OS.
//!
//! Every source is optional. Each `read_*` call degrades to an empty or zero
//! value on failure so one missing source never hides the others.

use std::path::Path;

use sysinfo::{ProcessesToUpdate, System};

use crate::command::{CommandRunner, SystemRunner};
use crate::config::{ProcessBackend, Sources};
use crate::error::{Error, Result};
use crate::snapshot::{
    display_name, MemInfoTable, MemorySnapshot, PressureSample, ProcessEntry, StallAverages,
    SwapPartition,
};

const FREE_ARGV: &[&str] = &["free", "-m"];
const PS_ARGV: &[&str] = &["ps", "aux", "--sort=-%mem"];

pub struct Sampler<R = SystemRunner> {
    sources: Sources,
    runner: R,
}

impl<R: CommandRunner> Sampler<R> {
    pub fn with_runner(sources: Sources, runner: R) -> Self {
        Self { sources, runner }
    }

    pub fn read_memory_snapshot(&self) -> MemorySnapshot {
        let table = read_source(&self.sources.meminfo)
            .map(|text| parse_meminfo(&text))
            .unwrap_or_else(|e| {
                tracing::debug!("memory counters unavailable: {e}");
                MemInfoTable::new()
            });
        MemorySnapshot::from_table(&table)
    }

    /// Shared memory in MB as reported by `free -m`, 0 when unknown.
    pub fn read_shared_memory(&self) -> u64 {
        self.run(FREE_ARGV)
            .and_then(|stdout| {
                parse_free_shared(&stdout)
                    .ok_or_else(|| Error::Parse("no shared column in free output".into()))
            })
            .unwrap_or_else(|e| {
                tracing::debug!("shared memory unavailable: {e}");
                0
            })
    }

    pub fn read_swap_partitions(&self) -> Vec<SwapPartition> {
        read_source(&self.sources.swaps)
            .map(|text| parse_swaps(&text))
            .unwrap_or_else(|e| {
                tracing::debug!("swap areas unavailable: {e}");
                Vec::new()
            })
    }

    /// `None` on kernels without pressure-stall accounting.
    pub fn read_pressure(&self) -> Option<PressureSample> {
        match read_source(&self.sources.pressure) {
            Ok(text) => parse_pressure(&text),
            Err(e) => {
                tracing::debug!("memory pressure unavailable: {e}");
                None
            }
        }
    }

    /// Up to `limit` processes, largest memory share first.
    pub fn read_top_processes(&self, limit: usize) -> Vec<ProcessEntry> {
        if limit == 0 {
            return Vec::new();
        }
        match self.sources.process_backend {
            ProcessBackend::Ps => self
                .run(PS_ARGV)
                .map(|stdout| parse_ps(&stdout, limit))
                .unwrap_or_else(|e| {
                    tracing::debug!("process listing unavailable: {e}");
                    Vec::new()
                }),
            ProcessBackend::Native => native_top_processes(limit),
        }
    }

    fn run(&self, argv: &[&str]) -> Result<String> {
        let output = self.runner.run(argv)?;
        if !output.success() {
            return Err(Error::CommandFailed {
                program: argv.first().copied().unwrap_or_default().to_string(),
                code: output.exit_code,
            });
        }
        Ok(output.stdout)
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Parses `Key: value [kB]` lines. Lines without a numeric first field are
/// skipped.
pub fn parse_meminfo(text: &str) -> MemInfoTable {
    let mut table = MemInfoTable::new();
    for line in text.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        match value.parse::<u64>() {
            Ok(v) => {
                table.insert(key.trim_end_matches(':').to_string(), v);
            }
            Err(_) => tracing::trace!("skipping meminfo line {line:?}"),
        }
    }
    table
}

/// Column 5 of the `Mem:` row of `free -m`.
pub fn parse_free_shared(text: &str) -> Option<u64> {
    text.lines()
        .find(|line| line.starts_with("Mem:"))
        .and_then(|line| line.split_whitespace().nth(4))
        .and_then(|field| field.parse().ok())
}

/// Parses `/proc/swaps`: one header line, then
/// `Filename Type Size Used Priority` rows with sizes in KB.
pub fn parse_swaps(text: &str) -> Vec<SwapPartition> {
    text.lines()
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 5 {
                return None;
            }
            let size_kb: u64 = parts[2].parse().ok()?;
            let used_kb: u64 = parts[3].parse().ok()?;
            Some(SwapPartition {
                device: parts[0].rsplit('/').next().unwrap_or(parts[0]).to_string(),
                kind: parts[1].to_string(),
                size_mb: size_kb / 1024,
                used_mb: used_kb / 1024,
                priority: parts[4].to_string(),
            })
        })
        .collect()
}

/// Parses `some avg10=.. avg60=.. avg300=.. total=..` and the matching
/// `full` line. Returns `None` if neither line yields an average.
pub fn parse_pressure(text: &str) -> Option<PressureSample> {
    let mut sample = PressureSample::default();
    for line in text.lines() {
        let mut fields = line.split_whitespace();
        let target = match fields.next() {
            Some("some") => &mut sample.some,
            Some("full") => &mut sample.full,
            _ => continue,
        };
        for field in fields {
            parse_stall_field(field, target);
        }
    }
    (!sample.is_empty()).then_some(sample)
}

fn parse_stall_field(field: &str, target: &mut StallAverages) {
    if let Some(v) = field.strip_prefix("avg10=") {
        target.avg10 = Some(v.to_string());
    } else if let Some(v) = field.strip_prefix("avg60=") {
        target.avg60 = Some(v.to_string());
    }
}

/// Parses `ps aux` output:
/// `USER PID %CPU %MEM VSZ RSS TTY STAT START TIME COMMAND...`.
/// The header and any malformed row are skipped.
pub fn parse_ps(text: &str, limit: usize) -> Vec<ProcessEntry> {
    text.lines()
        .skip(1)
        .filter_map(parse_ps_row)
        .take(limit)
        .collect()
}

fn parse_ps_row(line: &str) -> Option<ProcessEntry> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 11 {
        return None;
    }
    let resident_kb: u64 = parts[5].parse().ok()?;
    Some(ProcessEntry {
        pid: parts[1].parse().ok()?,
        name: display_name(parts[10]),
        resident_mb: resident_kb / 1024,
        percent: parts[3].parse().ok()?,
    })
}

fn native_top_processes(limit: usize) -> Vec<ProcessEntry> {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let total = sys.total_memory();
    let mut entries: Vec<ProcessEntry> = sys
        .processes()
        .iter()
        .map(|(pid, process)| {
            let resident = process.memory();
            ProcessEntry {
                pid: pid.as_u32(),
                name: display_name(&process.name().to_string_lossy()),
                resident_mb: resident / 1_048_576,
                percent: if total > 0 {
                    resident as f64 / total as f64 * 100.0
                } else {
                    0.0
                },
            }
        })
        .collect();

    entries.sort_by(|a, b| b.percent.total_cmp(&a.percent));
    entries.truncate(limit);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutput;
    use crate::snapshot::MAX_PROCESS_NAME;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const MEMINFO: &str = "\
MemTotal:       16384000 kB
MemFree:         4096000 kB
MemAvailable:    9000000 kB
Buffers:          512000 kB
Cached:          3584000 kB
SwapCached:            0 kB
Active:          6000000 kB
Inactive:        2000000 kB
SwapTotal:       2048000 kB
SwapFree:        1024000 kB
Dirty:              1024 kB
Slab:             409600 kB
HugePages_Total:       0
HugePages_Free:        0
HugePages_Rsvd:        0
Hugepagesize:       2048 kB
";

    const PS: &str = "\
USER         PID %CPU %MEM    VSZ   RSS TTY      STAT START   TIME COMMAND
alice       4242 12.0 21.5 9000000 3522560 ?    Sl   09:00  10:00 /usr/lib/firefox/firefox -contentproc
alice       1337  3.1  8.25 4000000 1351680 ?   Sl   09:01   2:00 /opt/code/code --type=renderer
root           1  0.0  0.1 170000 13000 ?        Ss   08:00   0:02 /sbin/init splash
";

    #[derive(Default)]
    struct FakeRunner {
        outputs: HashMap<String, CommandOutput>,
    }

    impl FakeRunner {
        fn with(mut self, program: &str, stdout: &str, code: i32) -> Self {
            self.outputs.insert(
                program.to_string(),
                CommandOutput {
                    stdout: stdout.to_string(),
                    exit_code: Some(code),
                },
            );
            self
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, argv: &[&str]) -> Result<CommandOutput> {
            self.outputs
                .get(argv[0])
                .cloned()
                .ok_or_else(|| Error::Spawn {
                    program: argv[0].to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                })
        }
    }

    fn sources_in(dir: &TempDir) -> Sources {
        Sources {
            meminfo: dir.path().join("meminfo"),
            swaps: dir.path().join("swaps"),
            pressure: dir.path().join("pressure"),
            ..Sources::default()
        }
    }

    #[test]
    fn meminfo_parses_and_skips_garbage() {
        let table = parse_meminfo("MemTotal: 1024 kB\nbogus\nCached: lots kB\nDirty: 2048 kB\n");
        assert_eq!(table.get("MemTotal"), Some(&1024));
        assert_eq!(table.get("Dirty"), Some(&2048));
        assert!(!table.contains_key("Cached"));
        assert!(!table.contains_key("bogus"));
    }

    #[test]
    fn snapshot_from_fixture_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("meminfo"), MEMINFO).unwrap();
        let sampler = Sampler::with_runner(sources_in(&dir), FakeRunner::default());
        let snap = sampler.read_memory_snapshot();
        assert_eq!(snap.total, 16000);
        assert_eq!(snap.used, 16000 - 4000 - 500 - 3500);
        assert_eq!(snap.used_percent(), 50);
        assert_eq!(snap.swap_total, 2000);
        assert_eq!(snap.swap_used, 1000);
        assert_eq!(snap.swap_percent(), 50);
        assert_eq!(snap.slab, 400);
        assert_eq!(snap.dirty, 1);
    }

    #[test]
    fn missing_sources_degrade_to_defaults() {
        let dir = TempDir::new().unwrap();
        let sampler = Sampler::with_runner(sources_in(&dir), FakeRunner::default());
        assert_eq!(sampler.read_memory_snapshot(), MemorySnapshot::default());
        assert_eq!(sampler.read_shared_memory(), 0);
        assert!(sampler.read_swap_partitions().is_empty());
        assert!(sampler.read_pressure().is_none());
        assert!(sampler.read_top_processes(10).is_empty());
    }

    #[test]
    fn shared_memory_from_free() {
        let free = "\
               total        used        free      shared  buff/cache   available
Mem:           15883        7034        1871         611        6977        7871
Swap:           2047           0        2047
";
        let runner = FakeRunner::default().with("free", free, 0);
        let sampler = Sampler::with_runner(Sources::default(), runner);
        assert_eq!(sampler.read_shared_memory(), 611);
    }

    #[test]
    fn failed_command_is_treated_as_missing() {
        let runner = FakeRunner::default()
            .with("free", "Mem: 1 2 3 4 5\n", 1)
            .with("ps", PS, 1);
        let sampler = Sampler::with_runner(Sources::default(), runner);
        assert_eq!(sampler.read_shared_memory(), 0);
        assert!(sampler.read_top_processes(5).is_empty());
    }

    #[test]
    fn swaps_table() {
        let text = "\
Filename\t\t\t\tType\t\tSize\t\tUsed\t\tPriority
/dev/nvme0n1p3                          partition\t8388604\t\t1048576\t\t-2
/swapfile                               file\t\t2097148\t\t0\t\t-3
/dev/broken                             partition\tnan\t\t0\t\t-4
";
        let parts = parse_swaps(text);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].device, "nvme0n1p3");
        assert_eq!(parts[0].kind, "partition");
        assert_eq!(parts[0].size_mb, 8191);
        assert_eq!(parts[0].used_mb, 1024);
        assert_eq!(parts[0].priority, "-2");
        assert_eq!(parts[1].device, "swapfile");
        assert_eq!(parts[1].kind, "file");
    }

    #[test]
    fn swaps_header_only_is_empty() {
        assert!(parse_swaps("Filename Type Size Used Priority\n").is_empty());
    }

    #[test]
    fn pressure_lines() {
        let text = "some avg10=1.25 avg60=0.50 avg300=0.10 total=12345\n\
                    full avg10=0.00 avg60=0.10 avg300=0.02 total=678\n";
        let sample = parse_pressure(text).unwrap();
        assert_eq!(sample.some.avg10.as_deref(), Some("1.25"));
        assert_eq!(sample.some.avg60.as_deref(), Some("0.50"));
        assert_eq!(sample.full.avg10.as_deref(), Some("0.00"));
        assert_eq!(sample.full.avg60.as_deref(), Some("0.10"));
    }

    #[test]
    fn pressure_without_full_line() {
        let sample = parse_pressure("some avg10=2.00 avg60=1.00 avg300=0.00 total=1\n").unwrap();
        assert!(sample.full.avg10.is_none());
        assert_eq!(sample.some.avg10.as_deref(), Some("2.00"));
    }

    #[test]
    fn pressure_garbage_is_absent() {
        assert!(parse_pressure("").is_none());
        assert!(parse_pressure("nothing to see\n").is_none());
    }

    #[test]
    fn ps_rows_are_parsed_in_order() {
        let procs = parse_ps(PS, 10);
        assert_eq!(procs.len(), 3);
        assert_eq!(procs[0].pid, 4242);
        assert_eq!(procs[0].name, "firefox");
        assert_eq!(procs[0].resident_mb, 3440);
        assert_eq!(procs[0].percent, 21.5);
        assert_eq!(procs[1].name, "code");
        assert_eq!(procs[2].name, "init");
    }

    #[test]
    fn ps_limit_and_malformed_rows() {
        let text = format!("{PS}short row\nbob x 1.0 2.0 3 4 ? S 0 0 cmd\n");
        assert_eq!(parse_ps(&text, 1).len(), 1);
        assert_eq!(parse_ps(&text, 10).len(), 3);
        assert!(parse_ps("", 10).is_empty());
    }

    #[test]
    fn native_backend_sorted_and_limited() {
        let sources = Sources {
            process_backend: ProcessBackend::Native,
            ..Sources::default()
        };
        // the runner must never be consulted
        let sampler = Sampler::with_runner(sources, FakeRunner::default());
        let top = sampler.read_top_processes(3);
        assert!(!top.is_empty());
        assert!(top.len() <= 3);
        assert!(top.windows(2).all(|w| w[0].percent >= w[1].percent));
        for p in &top {
            assert!(p.name.chars().count() <= MAX_PROCESS_NAME);
            assert!((0.0..=100.0).contains(&p.percent));
        }
        assert!(sampler.read_top_processes(0).is_empty());
    }

    #[test]
    fn top_processes_through_runner() {
        let runner = FakeRunner::default().with("ps", PS, 0);
        let sampler = Sampler::with_runner(Sources::default(), runner);
        let top = sampler.read_top_processes(1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].pid, 4242);
        assert!(sampler.read_top_processes(0).is_empty());
    }
}
