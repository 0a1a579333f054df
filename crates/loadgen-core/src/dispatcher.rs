//! Single-request dispatch.
//!
//! One call to [`dispatch`] = one GET = exactly one [`TraceRecord`], whatever
//! happens on the wire. Transport errors are logged and turned into the
//! sentinel status; they never reach the scheduler.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::clock::Clock;
use crate::store::TraceSink;
use crate::trace::{PendingTrace, TraceRecord};

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

#[derive(Debug)]
pub enum FetchError {
    Timeout,
    Connect(String),
    Request(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Timeout => write!(f, "request timed out"),
            FetchError::Connect(e) => write!(f, "connect failed: {e}"),
            FetchError::Request(e) => write!(f, "request failed: {e}"),
        }
    }
}
impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() {
            FetchError::Connect(e.to_string())
        } else {
            FetchError::Request(e.to_string())
        }
    }
}

/// Transport seam: issue one GET and report the response status.
///
/// Resolves once the response head is in; the body is not awaited.
pub trait Fetch {
    fn get(&self, url: &str) -> impl Future<Output = Result<u16, FetchError>> + Send;
}

/// `reqwest`-backed transport with the fixed header set.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// `timeout` is a per-request transport policy; `None` waits forever.
    pub fn new(timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_nodelay(true);
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }

        let client = builder.build().context("build http client")?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn get(&self, url: &str) -> impl Future<Output = Result<u16, FetchError>> + Send {
        // a malformed url surfaces from send(), same as any other transport error
        let req = self.client.get(url);
        async move {
            req.send()
                .await
                .map(|resp| resp.status().as_u16())
                .map_err(FetchError::from)
        }
    }
}

/// Runs one request and hands the sealed record to `sink`. The record is also
/// returned so the caller can account for the page.
pub async fn dispatch<F: Fetch>(
    fetcher: &F,
    clock: &Clock,
    url: &str,
    request_id: usize,
    sink: &TraceSink,
) -> TraceRecord {
    let pending = PendingTrace::start(request_id, clock);

    let record = match fetcher.get(url).await {
        Ok(status) => {
            tracing::debug!(request_id, status, "request finished with status {status}");
            pending.finish(clock, Some(status))
        }
        Err(e) => {
            tracing::warn!(request_id, url, err = %e, "error while calling the backend system");
            pending.finish(clock, None)
        }
    };

    sink.append(record);
    record
}
