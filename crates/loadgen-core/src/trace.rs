// crates/loadgen-core/src/trace.rs
use serde::{Deserialize, Serialize};

use crate::clock::Clock;

/// Status written for a request that never got a response (connect error,
/// timeout, TLS failure, bad URL).
pub const STATUS_NOT_COMPLETED: i32 = -1;

pub const SUCCESS_STATUS: [i32; 2] = [200, 201];

/// Timing and outcome of one request. Sealed: built only by
/// [`PendingTrace::finish`] (or [`TraceRecord::new`]) and read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    start_time: f64,
    end_time: f64,
    elapsed_time: f64,
    response_status: i32,
    /// 页内序号，每页从 0 开始
    request_id: usize,
}

impl TraceRecord {
    /// `end_time` is clamped so it never precedes `start_time`.
    pub fn new(request_id: usize, start_time: f64, end_time: f64, response_status: i32) -> Self {
        let end_time = end_time.max(start_time);
        Self {
            start_time,
            end_time,
            elapsed_time: end_time - start_time,
            response_status,
            request_id,
        }
    }

    #[inline]
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    #[inline]
    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    #[inline]
    pub fn elapsed_time(&self) -> f64 {
        self.elapsed_time
    }

    #[inline]
    pub fn response_status(&self) -> i32 {
        self.response_status
    }

    #[inline]
    pub fn request_id(&self) -> usize {
        self.request_id
    }

    pub fn is_success(&self) -> bool {
        SUCCESS_STATUS.contains(&self.response_status)
    }

    /// False when the request failed below HTTP and carries the sentinel status.
    pub fn completed(&self) -> bool {
        self.response_status != STATUS_NOT_COMPLETED
    }
}

/// Per-request handle carried across the request's await points: it holds the
/// page-local id and the start reading until the request concludes.
#[derive(Debug)]
pub struct PendingTrace {
    request_id: usize,
    start_time: f64,
}

impl PendingTrace {
    pub fn start(request_id: usize, clock: &Clock) -> Self {
        Self {
            request_id,
            start_time: clock.now(),
        }
    }

    /// Seals the trace. `None` means no HTTP response was ever received.
    pub fn finish(self, clock: &Clock, status: Option<u16>) -> TraceRecord {
        let status = status.map_or(STATUS_NOT_COMPLETED, i32::from);
        TraceRecord::new(self.request_id, self.start_time, clock.now(), status)
    }
}
