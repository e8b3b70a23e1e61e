//! Rolling per-metric history kept in small flat files.
//!
//! Each file holds at most `window` integers, one per line, oldest first.
//! Reads and writes are best effort: a missing or corrupt file starts a
//! fresh history and a failed write only loses persistence for this run.
//! There is no locking; concurrent runs resolve as last writer wins.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    MemoryPercent,
    SwapPercent,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::MemoryPercent, Metric::SwapPercent];

    pub fn file_name(self) -> &'static str {
        match self {
            Metric::MemoryPercent => "memory-usage.txt",
            Metric::SwapPercent => "swap-usage.txt",
        }
    }
}

/// Trailing window of samples, oldest first. Displays comma-joined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistorySeries(Vec<i64>);

impl HistorySeries {
    pub fn values(&self) -> &[i64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for HistorySeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, metric: Metric) -> PathBuf {
        self.dir.join(metric.file_name())
    }

    /// Appends `value`, keeps the newest `window` samples, persists them and
    /// returns the kept window. A `window` of 0 is treated as 1.
    pub fn record_and_read(&self, metric: Metric, value: i64, window: usize) -> HistorySeries {
        let path = self.path(metric);
        let mut values = self.load(&path);
        values.push(value);
        let excess = values.len().saturating_sub(window.max(1));
        values.drain(..excess);

        if let Err(e) = self.save(&path, &values) {
            tracing::debug!("history not persisted: {e}");
        }
        HistorySeries(values)
    }

    /// Removes every metric file. Files that are already gone are fine.
    pub fn clear(&self) -> Result<()> {
        for metric in Metric::ALL {
            let path = self.path(metric);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(path, e)),
            }
        }
        Ok(())
    }

    fn load(&self, path: &Path) -> Vec<i64> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!("history unreadable at {}: {e}", path.display());
                }
                return Vec::new();
            }
        };
        parse_history(&text).unwrap_or_else(|e| {
            tracing::debug!("discarding history at {}: {e}", path.display());
            Vec::new()
        })
    }

    fn save(&self, path: &Path, values: &[i64]) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| Error::io(&self.dir, e))?;
        let mut text = String::with_capacity(values.len() * 4);
        for v in values {
            text.push_str(&v.to_string());
            text.push('\n');
        }
        std::fs::write(path, text).map_err(|e| Error::io(path, e))
    }
}

/// Blank lines are ignored; decimals are truncated. Any other unparseable
/// line invalidates the whole file.
fn parse_history(text: &str) -> Result<Vec<i64>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| v.trunc() as i64)
                .ok_or_else(|| Error::Parse(format!("bad history sample {line:?}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, HistoryStore) {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("serverhub"));
        (dir, store)
    }

    #[test]
    fn first_sample_on_empty_store() {
        let (_dir, store) = store();
        let series = store.record_and_read(Metric::MemoryPercent, 42, 10);
        assert_eq!(series.to_string(), "42");
        assert_eq!(
            std::fs::read_to_string(store.path(Metric::MemoryPercent)).unwrap(),
            "42\n"
        );
    }

    #[test]
    fn oldest_sample_is_evicted() {
        let (_dir, store) = store();
        let mut last = HistorySeries::default();
        for v in (10..=110).step_by(10) {
            last = store.record_and_read(Metric::MemoryPercent, v, 10);
        }
        assert_eq!(last.len(), 10);
        assert_eq!(last.values()[0], 20);
        assert_eq!(last.to_string(), "20,30,40,50,60,70,80,90,100,110");
    }

    #[test]
    fn malformed_file_restarts_history() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.path(Metric::SwapPercent), "12\nabc\n14\n").unwrap();
        let series = store.record_and_read(Metric::SwapPercent, 7, 10);
        assert_eq!(series.to_string(), "7");
    }

    #[test]
    fn decimals_and_blank_lines_are_tolerated() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.path(Metric::MemoryPercent), "12.7\n\n 13 \n").unwrap();
        let series = store.record_and_read(Metric::MemoryPercent, 14, 10);
        assert_eq!(series.values(), &[12, 13, 14]);
    }

    #[test]
    fn shrinking_window_truncates_file() {
        let (_dir, store) = store();
        for v in 0..30 {
            store.record_and_read(Metric::MemoryPercent, v, 30);
        }
        let series = store.record_and_read(Metric::MemoryPercent, 99, 10);
        assert_eq!(series.values(), &[21, 22, 23, 24, 25, 26, 27, 28, 29, 99]);
        let text = std::fs::read_to_string(store.path(Metric::MemoryPercent)).unwrap();
        assert_eq!(text.lines().count(), 10);
    }

    #[test]
    fn metrics_are_independent() {
        let (_dir, store) = store();
        store.record_and_read(Metric::MemoryPercent, 1, 10);
        let swap = store.record_and_read(Metric::SwapPercent, 2, 10);
        assert_eq!(swap.to_string(), "2");
    }

    #[test]
    fn unwritable_dir_still_returns_series() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let store = HistoryStore::new(blocker.join("nested"));
        let series = store.record_and_read(Metric::MemoryPercent, 5, 10);
        assert_eq!(series.to_string(), "5");
    }

    #[test]
    fn clear_removes_files() {
        let (_dir, store) = store();
        store.record_and_read(Metric::MemoryPercent, 1, 10);
        store.clear().unwrap();
        assert!(!store.path(Metric::MemoryPercent).exists());
        // second clear with nothing left is fine
        store.clear().unwrap();
    }
}
