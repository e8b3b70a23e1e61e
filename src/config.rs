use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: General,
    pub history: History,
    pub sources: Sources,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct General {
    pub title: String,
    pub refresh_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct History {
    pub dir: Option<String>,
    pub compact_samples: usize,
    pub extended_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sources {
    pub meminfo: PathBuf,
    pub swaps: PathBuf,
    pub pressure: PathBuf,
    pub process_backend: ProcessBackend,
    pub process_limit: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessBackend {
    /// `ps aux --sort=-%mem`
    #[default]
    Ps,
    /// In-process listing through `sysinfo`.
    Native,
}

/// Percent thresholds. Status is `ok` below `warn_percent`, `warn` below
/// `error_percent`, `error` otherwise. Actions fire strictly above theirs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub warn_percent: u64,
    pub error_percent: u64,
    pub kill_percent: u64,
    pub swap_clear_percent: u64,
}

impl Default for General {
    fn default() -> Self {
        Self {
            title: "Memory Usage".into(),
            refresh_secs: 2,
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self {
            dir: None,
            compact_samples: 10,
            extended_samples: 30,
        }
    }
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            meminfo: "/proc/meminfo".into(),
            swaps: "/proc/swaps".into(),
            pressure: "/proc/pressure/memory".into(),
            process_backend: ProcessBackend::Ps,
            process_limit: 10,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warn_percent: 70,
            error_percent: 90,
            kill_percent: 90,
            swap_clear_percent: 50,
        }
    }
}

impl History {
    pub fn samples(&self, extended: bool) -> usize {
        let n = if extended {
            self.extended_samples
        } else {
            self.compact_samples
        };
        n.max(1)
    }
}

impl Config {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("memwidget")
            .join("config.toml")
    }

    /// Directory holding the rolling history files.
    pub fn history_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.history.dir {
            PathBuf::from(shellexpand(dir))
        } else {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("serverhub")
        }
    }

    /// Loads `path`, or the default location when `None`. Never fails: a
    /// missing file means defaults, a broken one is reported and ignored.
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);
        match Self::try_load(&path) {
            Ok(Some(cfg)) => cfg,
            Ok(None) => {
                tracing::debug!("no config found at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("{e}; falling back to defaults");
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Option<Self>> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(path, e)),
        };
        toml::from_str(&contents)
            .map(Some)
            .map_err(|source| Error::Config {
                path: path.to_path_buf(),
                source,
            })
    }

    pub fn generate_default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

fn shellexpand(s: &str) -> String {
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().into_owned();
        }
    }
    s.to_string()
}
