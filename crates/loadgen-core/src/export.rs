// crates/loadgen-core/src/export.rs
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::store::TraceStore;
use crate::trace::TraceRecord;
use crate::util::unix_seconds;

pub const START_TAG: &str = "REQSTART";
pub const END_TAG: &str = "REQEND";

/// `REQSTART|<request_id>|<start_time>`
pub fn start_line(r: &TraceRecord) -> String {
    format!("{START_TAG}|{}|{}", r.request_id(), r.start_time())
}

/// `REQEND|<start_time>|<request_id>|<elapsed_time>|<response_status>`
pub fn end_line(r: &TraceRecord) -> String {
    format!(
        "{END_TAG}|{}|{}|{}|{}",
        r.start_time(),
        r.request_id(),
        r.elapsed_time(),
        r.response_status()
    )
}

/// Two parallel line sequences, one entry per record, same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceLines {
    pub start: Vec<String>,
    pub end: Vec<String>,
}

pub fn render(sorted: &[TraceRecord]) -> TraceLines {
    TraceLines {
        start: sorted.iter().map(start_line).collect(),
        end: sorted.iter().map(end_line).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracePaths {
    pub start: PathBuf,
    pub end: PathBuf,
}

impl TracePaths {
    /// `<base>-start.csv` / `<base>-end.csv`
    pub fn for_base(base: &str) -> Self {
        Self {
            start: PathBuf::from(format!("{base}-start.csv")),
            end: PathBuf::from(format!("{base}-end.csv")),
        }
    }
}

pub fn default_base_name() -> String {
    format!("test-run-{}", unix_seconds())
}

/// Writes the store, sorted by start time, to the two trace files. `base`
/// falls back to [`default_base_name`] when `None` or empty.
pub fn write_trace(store: &TraceStore, base: Option<&str>) -> anyhow::Result<TracePaths> {
    let base = match base {
        Some(b) if !b.is_empty() => b.to_string(),
        _ => default_base_name(),
    };
    let paths = TracePaths::for_base(&base);
    let lines = render(&store.sorted());

    write_lines(&paths.start, &lines.start)?;
    write_lines(&paths.end, &lines.end)?;

    tracing::info!(
        records = store.len(),
        start = %paths.start.display(),
        end = %paths.end.display(),
        "trace written"
    );
    Ok(paths)
}

fn write_lines(path: &Path, lines: &[String]) -> anyhow::Result<()> {
    // ensure output dir exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    std::fs::write(path, lines.join("\n"))
        .with_context(|| format!("write trace file: {}", path.display()))
}
