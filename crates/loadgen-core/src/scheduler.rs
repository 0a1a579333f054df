//! Paged batch scheduler.
//!
//! The request list is cut into pages of `page_size`. Every request of a page
//! is polled concurrently on the scheduler's own task, the page is joined as a
//! barrier, then the scheduler sleeps `spare_time` (also after the last page)
//! before the next one. There is no cancellation: with no transport timeout a
//! hung request holds its page forever.

use std::ops::Range;
use std::time::Duration;

use anyhow::Context;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::dispatcher::{dispatch, Fetch};
use crate::store::{spawn_collector, TraceSink, TraceStore};

/// How page boundaries are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Paging {
    /// `[p*size, min((p+1)*size, n))`: every request is sent exactly once.
    #[default]
    Contiguous,
    /// Boundary rule of the older tool, kept so traces stay comparable: pages
    /// after the first start one past `p*size` (skipping a request), and an
    /// empty tail page is widened back by one (re-sending a request).
    Legacy,
}

#[inline]
pub fn page_count(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size)
}

/// Index range of page `page`. `page_size` must be non-zero and `page` below
/// [`page_count`].
pub fn page_bounds(paging: Paging, page: usize, page_size: usize, total: usize) -> Range<usize> {
    match paging {
        Paging::Contiguous => {
            let start = page * page_size;
            start..(start + page_size).min(total)
        }
        Paging::Legacy => {
            let mut start = page * page_size;
            let mut end = page * page_size + page_size;
            if page > 0 {
                start += 1;
            }
            if end > total {
                end = total;
            }
            if start == end {
                start = start.saturating_sub(1);
            }
            start..end
        }
    }
}

pub fn page_plan(paging: Paging, total: usize, page_size: usize) -> Vec<Range<usize>> {
    (0..page_count(total, page_size))
        .map(|p| page_bounds(paging, p, page_size, total))
        .collect()
}

/// What happened to one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageReport {
    pub index: usize,
    pub bounds: Range<usize>,
    pub dispatched: usize,
    pub succeeded: usize,
    /// no response at all (sentinel status)
    pub failed: usize,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub store: TraceStore,
    pub pages: Vec<PageReport>,
}

impl RunOutcome {
    pub fn dispatched(&self) -> usize {
        self.pages.iter().map(|p| p.dispatched).sum()
    }
}

pub struct BatchScheduler<F> {
    fetcher: F,
    clock: Clock,
    page_size: usize,
    spare_time: Duration,
    paging: Paging,
}

impl<F: Fetch> BatchScheduler<F> {
    pub fn new(fetcher: F, page_size: usize, spare_time: Duration) -> Self {
        Self {
            fetcher,
            clock: Clock::new(),
            page_size,
            spare_time,
            paging: Paging::default(),
        }
    }

    pub fn with_paging(mut self, paging: Paging) -> Self {
        self.paging = paging;
        self
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Drives every page to completion and returns the filled store.
    pub async fn run(&self, requests: &[String]) -> anyhow::Result<RunOutcome> {
        anyhow::ensure!(self.page_size > 0, "page size must be at least 1");

        let plan = page_plan(self.paging, requests.len(), self.page_size);
        tracing::info!(
            requests = requests.len(),
            pages = plan.len(),
            page_size = self.page_size,
            spare_time_s = self.spare_time.as_secs_f64(),
            paging = ?self.paging,
            "starting run"
        );

        let (sink, collector) = spawn_collector();
        let mut pages = Vec::with_capacity(plan.len());

        for (index, bounds) in plan.into_iter().enumerate() {
            let report = self.submit_page(index, bounds, requests, &sink).await;
            tracing::info!(
                page = report.index,
                dispatched = report.dispatched,
                succeeded = report.succeeded,
                failed = report.failed,
                "page done"
            );
            pages.push(report);

            // 每页结束后固定休息 spare_time（最后一页也一样）
            tokio::time::sleep(self.spare_time).await;
        }

        drop(sink);
        let store = collector.await.context("trace collector task failed")?;

        Ok(RunOutcome { store, pages })
    }

    async fn submit_page(
        &self,
        index: usize,
        bounds: Range<usize>,
        requests: &[String],
        sink: &TraceSink,
    ) -> PageReport {
        let batch = &requests[bounds.clone()];
        tracing::debug!(
            page = index,
            start = bounds.start,
            end = bounds.end,
            size = batch.len(),
            "sending batch"
        );

        let ops = batch
            .iter()
            .enumerate()
            .map(|(request_id, url)| dispatch(&self.fetcher, &self.clock, url.trim(), request_id, sink));
        let records = join_all(ops).await;

        PageReport {
            index,
            bounds,
            dispatched: records.len(),
            succeeded: records.iter().filter(|r| r.is_success()).count(),
            failed: records.iter().filter(|r| !r.completed()).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::FetchError;
    use crate::trace::STATUS_NOT_COMPLETED;
    use std::collections::HashMap;
    use std::future::Future;

    /// url -> (latency, status or transport failure)
    #[derive(Default)]
    struct Scripted {
        replies: HashMap<String, (Duration, Option<u16>)>,
        default_latency: Duration,
    }

    impl Scripted {
        fn with(mut self, url: &str, latency_ms: u64, status: Option<u16>) -> Self {
            self.replies
                .insert(url.to_string(), (Duration::from_millis(latency_ms), status));
            self
        }
    }

    impl Fetch for Scripted {
        fn get(&self, url: &str) -> impl Future<Output = Result<u16, FetchError>> + Send {
            let (latency, status) = self
                .replies
                .get(url)
                .copied()
                .unwrap_or((self.default_latency, Some(200)));
            async move {
                tokio::time::sleep(latency).await;
                status.ok_or_else(|| FetchError::Connect("connection refused".into()))
            }
        }
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("http://t/{i}")).collect()
    }

    #[test]
    fn page_count_is_ceiling() {
        assert_eq!(page_count(0, 3), 0);
        assert_eq!(page_count(1, 3), 1);
        assert_eq!(page_count(3, 3), 1);
        assert_eq!(page_count(4, 3), 2);
        assert_eq!(page_count(5, 2), 3);
        assert_eq!(page_count(10, 1), 10);
    }

    #[test]
    fn contiguous_pages_cover_everything_once() {
        assert_eq!(page_plan(Paging::Contiguous, 5, 2), vec![0..2, 2..4, 4..5]);

        for total in 1..40 {
            for size in 1..9 {
                let plan = page_plan(Paging::Contiguous, total, size);
                assert_eq!(plan.len(), page_count(total, size));
                let flat: Vec<usize> = plan.into_iter().flatten().collect();
                assert_eq!(flat, (0..total).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn legacy_pages_reproduce_old_boundaries() {
        // page 1 skips index 2, the tail page is widened back to index 4
        assert_eq!(page_plan(Paging::Legacy, 5, 2), vec![0..2, 3..4, 4..5]);
        assert_eq!(page_plan(Paging::Legacy, 7, 3), vec![0..3, 4..6, 6..7]);
        assert_eq!(page_plan(Paging::Legacy, 10, 5), vec![0..5, 6..10]);
        // size 1 degenerates to contiguous
        assert_eq!(page_plan(Paging::Legacy, 3, 1), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn legacy_pages_are_never_empty() {
        for total in 1..40 {
            for size in 1..9 {
                for r in page_plan(Paging::Legacy, total, size) {
                    assert!(r.start < r.end, "total={total} size={size} range={r:?}");
                    assert!(r.end <= total);
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn five_urls_page_size_two() {
        let scheduler = BatchScheduler::new(Scripted::default(), 2, Duration::ZERO);
        let outcome = scheduler.run(&urls(5)).await.unwrap();

        let sizes: Vec<usize> = outcome.pages.iter().map(|p| p.dispatched).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(outcome.dispatched(), 5);
        assert_eq!(outcome.store.len(), 5);

        let mut ids: Vec<usize> = outcome.store.records().iter().map(|r| r.request_id()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 0, 0, 1, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn legacy_paging_run_sends_old_subsets() {
        let scheduler =
            BatchScheduler::new(Scripted::default(), 2, Duration::ZERO).with_paging(Paging::Legacy);
        let outcome = scheduler.run(&urls(5)).await.unwrap();

        let sizes: Vec<usize> = outcome.pages.iter().map(|p| p.dispatched).collect();
        assert_eq!(sizes, vec![2, 1, 1]);
        assert_eq!(outcome.store.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failure_does_not_hold_back_the_page() {
        let fetcher = Scripted::default()
            .with("http://t/0", 30, Some(200))
            .with("http://t/1", 5, None)
            .with("http://t/2", 60, Some(201));
        let scheduler = BatchScheduler::new(fetcher, 3, Duration::ZERO);
        let outcome = scheduler.run(&urls(3)).await.unwrap();

        assert_eq!(outcome.pages.len(), 1);
        assert_eq!(outcome.pages[0].dispatched, 3);
        assert_eq!(outcome.pages[0].succeeded, 2);
        assert_eq!(outcome.pages[0].failed, 1);

        let records = outcome.store.records();
        assert_eq!(records.len(), 3);
        // completion order: the failure lands first
        assert_eq!(records[0].response_status(), STATUS_NOT_COMPLETED);
        assert_eq!(records[0].request_id(), 1);
        assert_eq!(records[2].response_status(), 201);
    }

    #[tokio::test(start_paused = true)]
    async fn pages_are_paced_by_spare_time() {
        let fetcher = Scripted {
            default_latency: Duration::from_millis(100),
            ..Default::default()
        };
        let scheduler = BatchScheduler::new(fetcher, 2, Duration::from_secs(1));
        let clock = scheduler.clock();
        let outcome = scheduler.run(&urls(6)).await.unwrap();

        let sorted = outcome.store.sorted();
        assert_eq!(sorted.len(), 6);
        for (i, r) in sorted.iter().enumerate() {
            let page = (i / 2) as f64;
            assert!((r.start_time() - page * 1.1).abs() < 1e-6, "record {i}: {r:?}");
            assert!((r.elapsed_time() - 0.1).abs() < 1e-6);
            assert_eq!(r.elapsed_time(), r.end_time() - r.start_time());
        }

        // the pause after the last page is still taken
        assert!(clock.now() >= 3.3 - 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn page_barrier_holds_until_slowest_request() {
        let fetcher = Scripted::default()
            .with("http://t/0", 10, Some(200))
            .with("http://t/1", 900, Some(200))
            .with("http://t/2", 10, Some(200));
        let scheduler = BatchScheduler::new(fetcher, 2, Duration::ZERO);
        let outcome = scheduler.run(&urls(3)).await.unwrap();

        let sorted = outcome.store.sorted();
        let page0_end = sorted[..2]
            .iter()
            .map(|r| r.end_time())
            .fold(0.0_f64, f64::max);
        assert!(sorted[2].start_time() >= page0_end);
        assert!((sorted[2].start_time() - 0.9).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn urls_are_trimmed_before_dispatch() {
        let fetcher = Scripted::default().with("http://t/x", 1, Some(404));
        let scheduler = BatchScheduler::new(fetcher, 4, Duration::ZERO);
        let outcome = scheduler
            .run(&["  http://t/x\n".to_string()])
            .await
            .unwrap();
        assert_eq!(outcome.store.records()[0].response_status(), 404);
    }

    #[tokio::test]
    async fn zero_page_size_is_rejected() {
        let scheduler = BatchScheduler::new(Scripted::default(), 0, Duration::ZERO);
        assert!(scheduler.run(&urls(1)).await.is_err());
    }
}
