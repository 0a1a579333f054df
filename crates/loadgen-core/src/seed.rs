// crates/loadgen-core/src/seed.rs
use std::path::Path;

use anyhow::Context;

/// Lines `from_line..=to_line` (0-based) of `text`, trimmed, blanks dropped.
/// `to_line` is clamped to the end of the text.
pub fn select_lines(text: &str, from_line: usize, to_line: usize) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let end = lines.len().min(to_line.saturating_add(1));
    if from_line >= end {
        return Vec::new();
    }
    lines[from_line..end]
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Loads the request list for a run. Fails before anything is sent when the
/// file is unreadable or the range selects no URL.
pub fn load_requests(path: &Path, from_line: usize, to_line: usize) -> anyhow::Result<Vec<String>> {
    anyhow::ensure!(
        from_line <= to_line,
        "invalid line range: from {from_line} is after to {to_line}"
    );

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read seed file: {}", path.display()))?;
    let requests = select_lines(&text, from_line, to_line);

    anyhow::ensure!(
        !requests.is_empty(),
        "seed file {} has no urls in lines {from_line}..={to_line} ({} lines total)",
        path.display(),
        text.lines().count()
    );
    tracing::debug!(
        seed = %path.display(),
        from_line,
        to_line,
        selected = requests.len(),
        "request list loaded"
    );
    Ok(requests)
}
