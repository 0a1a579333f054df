use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::scheduler::Paging;

/// Run configuration. Fields left out of a config file take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// 一行一个 URL
    pub seed_file: PathBuf,

    /// First and last seed line used (0-based, inclusive).
    pub from_line: usize,
    pub to_line: usize,

    /// Page size: requests sent concurrently per page.
    pub requests_per_second: usize,

    /// Pause after every page, in seconds.
    pub spare_time: f64,

    pub verbose: bool,

    pub paging: Paging,

    /// Per-request transport timeout in ms (0 = none).
    pub timeout_ms: u64,

    /// Base name of the trace files; `test-run-<unix-seconds>` when unset.
    pub output: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed_file: PathBuf::from("urls.txt"),
            from_line: 0,
            to_line: 9,
            requests_per_second: 10,
            spare_time: 3.0,
            verbose: false,
            paging: Paging::Contiguous,
            timeout_ms: 0,
            output: None,
        }
    }
}

impl RunConfig {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse config: {}", path.display()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.requests_per_second >= 1,
            "requests_per_second must be at least 1"
        );
        anyhow::ensure!(
            self.spare_time.is_finite() && self.spare_time >= 0.0,
            "spare_time must be a non-negative number of seconds (got {})",
            self.spare_time
        );
        anyhow::ensure!(
            Duration::try_from_secs_f64(self.spare_time).is_ok(),
            "spare_time is too large (got {})",
            self.spare_time
        );
        anyhow::ensure!(
            self.from_line <= self.to_line,
            "from_line ({}) must not be after to_line ({})",
            self.from_line,
            self.to_line
        );
        Ok(())
    }

    pub fn spare_time(&self) -> Duration {
        Duration::from_secs_f64(self.spare_time)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}
