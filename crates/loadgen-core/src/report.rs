//! Reading trace files back.
//!
//! Parses `REQSTART`/`REQEND` lines (the two files, or both concatenated on a
//! single stream the way the chart script reads them), pairs each end line
//! with its start line, and summarizes the run. Ends are matched on the
//! `(start_time, request_id)` pair because `request_id` alone repeats on
//! every page.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io::BufRead;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use hdrhistogram::Histogram;

use crate::export::{END_TAG, START_TAG};
use crate::trace::{STATUS_NOT_COMPLETED, SUCCESS_STATUS};
use crate::util::secs_to_us;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraceLine {
    Start {
        request_id: usize,
        start_time: f64,
    },
    End {
        start_time: f64,
        request_id: usize,
        elapsed_time: f64,
        response_status: i32,
    },
}

impl FromStr for TraceLine {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> anyhow::Result<Self> {
        let fields: Vec<&str> = line.trim().split('|').collect();
        match fields.as_slice() {
            [tag, id, start] if *tag == START_TAG => Ok(TraceLine::Start {
                request_id: id.parse().with_context(|| format!("bad request id: {id}"))?,
                start_time: parse_secs(start)?,
            }),
            [tag, start, id, elapsed, status] if *tag == END_TAG => Ok(TraceLine::End {
                start_time: parse_secs(start)?,
                request_id: id.parse().with_context(|| format!("bad request id: {id}"))?,
                elapsed_time: parse_secs(elapsed)?,
                response_status: status
                    .parse()
                    .with_context(|| format!("bad status: {status}"))?,
            }),
            _ => Err(anyhow!("not a trace line: {line}")),
        }
    }
}

fn parse_secs(s: &str) -> anyhow::Result<f64> {
    let v: f64 = s.parse().with_context(|| format!("bad time value: {s}"))?;
    anyhow::ensure!(v.is_finite(), "bad time value: {s}");
    Ok(v)
}

/// Parses every non-blank line; errors carry the 1-based line number.
pub fn parse_trace<R: BufRead>(reader: R) -> anyhow::Result<Vec<TraceLine>> {
    let mut out = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.context("read trace")?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed = line
            .parse::<TraceLine>()
            .with_context(|| format!("line {}", i + 1))?;
        out.push(parsed);
    }
    Ok(out)
}

pub fn parse_trace_file(path: &Path) -> anyhow::Result<Vec<TraceLine>> {
    let f = std::fs::File::open(path).with_context(|| format!("open trace: {}", path.display()))?;
    parse_trace(std::io::BufReader::new(f)).with_context(|| format!("parse trace: {}", path.display()))
}

/// One request reconstructed from the trace. Open while no end line was seen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Span {
    pub request_id: usize,
    pub start_time: f64,
    pub elapsed_time: Option<f64>,
    pub response_status: Option<i32>,
}

impl Span {
    pub fn is_open(&self) -> bool {
        self.elapsed_time.is_none()
    }

    pub fn end_time(&self) -> Option<f64> {
        self.elapsed_time.map(|e| self.start_time + e)
    }

    pub fn is_success(&self) -> bool {
        self.response_status
            .is_some_and(|s| SUCCESS_STATUS.contains(&s))
    }
}

/// Pairs end lines with start lines. Spans come out in start-line order;
/// end lines without a start are appended after them.
pub fn reconstruct(lines: &[TraceLine]) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut by_key: HashMap<(u64, usize), VecDeque<usize>> = HashMap::new();

    for line in lines {
        if let TraceLine::Start {
            request_id,
            start_time,
        } = *line
        {
            by_key
                .entry((start_time.to_bits(), request_id))
                .or_default()
                .push_back(spans.len());
            spans.push(Span {
                request_id,
                start_time,
                elapsed_time: None,
                response_status: None,
            });
        }
    }

    for line in lines {
        if let TraceLine::End {
            start_time,
            request_id,
            elapsed_time,
            response_status,
        } = *line
        {
            let slot = by_key
                .get_mut(&(start_time.to_bits(), request_id))
                .and_then(|q| q.pop_front());
            match slot {
                Some(idx) => {
                    spans[idx].elapsed_time = Some(elapsed_time);
                    spans[idx].response_status = Some(response_status);
                }
                None => spans.push(Span {
                    request_id,
                    start_time,
                    elapsed_time: Some(elapsed_time),
                    response_status: Some(response_status),
                }),
            }
        }
    }

    spans
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub requests: usize,
    pub ok: usize,
    /// answered with a non-success status
    pub err: usize,
    /// no response (sentinel status)
    pub failed: usize,
    /// started, never ended
    pub open: usize,

    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,

    /// first start to last end, seconds
    pub span_s: f64,
}

impl Summary {
    pub fn from_spans(spans: &[Span]) -> anyhow::Result<Self> {
        let mut s = Summary {
            requests: spans.len(),
            ..Default::default()
        };
        // HdrHistogram lower bound must be >= 1; we clamp 0 -> 1 when recording.
        let mut lat_us = Histogram::<u64>::new_with_bounds(1, 60_000_000, 3)?;

        let mut first_start = f64::INFINITY;
        let mut last_end = f64::NEG_INFINITY;

        for span in spans {
            first_start = first_start.min(span.start_time);
            match (span.response_status, span.end_time()) {
                (Some(status), Some(end)) => {
                    last_end = last_end.max(end);
                    if status == STATUS_NOT_COMPLETED {
                        s.failed += 1;
                        continue;
                    }
                    if span.is_success() {
                        s.ok += 1;
                    } else {
                        s.err += 1;
                    }
                    let us = secs_to_us(span.elapsed_time.unwrap_or_default());
                    lat_us.saturating_record(us.max(1));
                }
                _ => s.open += 1,
            }
        }

        if lat_us.len() > 0 {
            s.p50_us = lat_us.value_at_quantile(0.50);
            s.p95_us = lat_us.value_at_quantile(0.95);
            s.p99_us = lat_us.value_at_quantile(0.99);
            s.max_us = lat_us.max();
        }
        if last_end.is_finite() && first_start.is_finite() {
            s.span_s = (last_end - first_start).max(0.0);
        }
        Ok(s)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "requests={} ok={} err={} failed={} open={}",
            self.requests, self.ok, self.err, self.failed, self.open
        )?;
        write!(
            f,
            "latency(us): p50={} p95={} p99={} max={}  span={:.3}s",
            self.p50_us, self.p95_us, self.p99_us, self.max_us, self.span_s
        )
    }
}
