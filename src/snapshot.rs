use std::collections::HashMap;

use serde::Serialize;

/// Raw `/proc/meminfo` values keyed without the trailing colon: kilobytes
/// for sized counters, plain counts for the `HugePages_*` lines.
pub type MemInfoTable = HashMap<String, u64>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemorySnapshot {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub available: u64,
    pub buffers: u64,
    pub cached: u64,
    pub active: u64,
    pub inactive: u64,
    pub dirty: u64,
    pub slab: u64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub huge_pages_total: u64,
    pub huge_pages_free: u64,
    pub huge_pages_reserved: u64,
    pub huge_page_size_kb: u64,
}

impl MemorySnapshot {
    /// Builds a snapshot from a parsed meminfo table. Missing keys count as
    /// zero. `used` and `swap_used` saturate at zero when counters disagree.
    pub fn from_table(table: &MemInfoTable) -> Self {
        let raw = |key: &str| table.get(key).copied().unwrap_or(0);
        let get = |key: &str| raw(key) / 1024;

        let total = get("MemTotal");
        let free = get("MemFree");
        let buffers = get("Buffers");
        let cached = get("Cached");
        let swap_total = get("SwapTotal");

        Self {
            total,
            used: total.saturating_sub(free + buffers + cached),
            free,
            available: get("MemAvailable"),
            buffers,
            cached,
            active: get("Active"),
            inactive: get("Inactive"),
            dirty: get("Dirty"),
            slab: get("Slab"),
            swap_total,
            swap_used: swap_total.saturating_sub(get("SwapFree")),
            huge_pages_total: raw("HugePages_Total"),
            huge_pages_free: raw("HugePages_Free"),
            huge_pages_reserved: raw("HugePages_Rsvd"),
            huge_page_size_kb: raw("Hugepagesize"),
        }
    }

    pub fn used_percent(&self) -> u64 {
        rounded_percent(self.used, self.total)
    }

    pub fn swap_percent(&self) -> u64 {
        rounded_percent(self.swap_used, self.swap_total)
    }

    pub fn swap_configured(&self) -> bool {
        self.swap_total > 0
    }

    pub fn swap_free(&self) -> u64 {
        self.swap_total.saturating_sub(self.swap_used)
    }

    /// Share of total RAM, truncated.
    pub fn share_of_total(&self, part: u64) -> u64 {
        truncated_percent(part, self.total)
    }
}

/// `round(part * 100 / whole)` with ties to even, 0 when `whole` is 0.
pub fn rounded_percent(part: u64, whole: u64) -> u64 {
    if whole == 0 {
        return 0;
    }
    (part as f64 * 100.0 / whole as f64).round_ties_even() as u64
}

pub fn truncated_percent(part: u64, whole: u64) -> u64 {
    if whole == 0 {
        return 0;
    }
    part * 100 / whole
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapPartition {
    pub device: String,
    pub kind: String,
    pub size_mb: u64,
    pub used_mb: u64,
    pub priority: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
    pub resident_mb: u64,
    pub percent: f64,
}

/// Longest command name shown in process tables.
pub const MAX_PROCESS_NAME: usize = 20;

/// Strips any directory prefix and caps the result at
/// [`MAX_PROCESS_NAME`] characters.
pub fn display_name(command: &str) -> String {
    let base = command.rsplit('/').next().unwrap_or(command);
    let base = if base.is_empty() { "unknown" } else { base };
    base.chars().take(MAX_PROCESS_NAME).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StallAverages {
    pub avg10: Option<String>,
    pub avg60: Option<String>,
}

impl StallAverages {
    fn is_empty(&self) -> bool {
        self.avg10.is_none() && self.avg60.is_none()
    }
}

/// Memory pressure-stall averages. `some` covers any stalled task, `full`
/// covers all tasks stalled at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PressureSample {
    pub some: StallAverages,
    pub full: StallAverages,
}

impl PressureSample {
    pub fn is_empty(&self) -> bool {
        self.some.is_empty() && self.full.is_empty()
    }
}

/// Everything sampled during one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sample {
    pub memory: MemorySnapshot,
    pub shared_mb: u64,
    pub swap_partitions: Vec<SwapPartition>,
    pub processes: Vec<ProcessEntry>,
    /// Largest process, set only when the kill action may be offered.
    pub kill_candidate: Option<ProcessEntry>,
    pub pressure: Option<PressureSample>,
}
