//! End-to-end run: seed file -> paged requests -> trace files.

use crate::config::RunConfig;
use crate::dispatcher::{Fetch, HttpFetcher};
use crate::export::{write_trace, TracePaths};
use crate::scheduler::{BatchScheduler, RunOutcome};
use crate::seed::load_requests;

#[derive(Debug)]
pub struct RunArtifacts {
    pub outcome: RunOutcome,
    pub paths: TracePaths,
}

pub struct LoadGenerator<F> {
    cfg: RunConfig,
    fetcher: F,
}

impl LoadGenerator<HttpFetcher> {
    pub fn new(cfg: RunConfig) -> anyhow::Result<Self> {
        let fetcher = HttpFetcher::new(cfg.timeout())?;
        Ok(Self { cfg, fetcher })
    }
}

impl<F: Fetch> LoadGenerator<F> {
    pub fn with_fetcher(cfg: RunConfig, fetcher: F) -> Self {
        Self { cfg, fetcher }
    }

    /// Configuration and seed problems fail before the first request; export
    /// problems fail after the last page.
    pub async fn run(self) -> anyhow::Result<RunArtifacts> {
        let cfg = self.cfg;
        cfg.validate()?;
        let requests = load_requests(&cfg.seed_file, cfg.from_line, cfg.to_line)?;

        let scheduler = BatchScheduler::new(self.fetcher, cfg.requests_per_second, cfg.spare_time())
            .with_paging(cfg.paging);
        let outcome = scheduler.run(&requests).await?;

        let failed: usize = outcome.pages.iter().map(|p| p.failed).sum();
        let succeeded: usize = outcome.pages.iter().map(|p| p.succeeded).sum();
        tracing::info!(
            dispatched = outcome.dispatched(),
            recorded = outcome.store.len(),
            succeeded,
            failed,
            "test finished"
        );

        let paths = write_trace(&outcome.store, cfg.output.as_deref())?;
        Ok(RunArtifacts { outcome, paths })
    }
}
