use std::fmt;
use std::time::Duration;

use apify_client::ScrapeType;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::batches::BatchStore;
use crate::classifier::Classifier;
use crate::error::{FetchError, PersistenceError};
use crate::fetcher::AccountFetcher;
use crate::record::normalize_batch;
use crate::targets::{Priority, TargetQueue};

/// Settings for a multi-target run.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeConfig {
    /// Wait between consecutive provider calls. Not applied after the last target.
    pub pacing: Duration,
    pub max_pages: u32,
    pub scrape_type: ScrapeType,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            pacing: Duration::from_secs(60),
            max_pages: 20,
            scrape_type: ScrapeType::Followers,
        }
    }
}

/// One stored batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub batch_id: String,
    pub records: usize,
    pub icp_aligned: usize,
}

impl fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Saved batch {}\nICP-aligned accounts: {}/{} ({}%)",
            self.batch_id,
            self.icp_aligned,
            self.records,
            self.icp_aligned * 100 / self.records.max(1)
        )
    }
}

/// Stats from a multi-target run.
#[derive(Debug, Default)]
pub struct ScrapeStats {
    pub targets: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub records_fetched: usize,
    pub icp_aligned: usize,
    pub stopped_early: bool,
    /// (username, reason) for every failed target.
    pub failures: Vec<(String, String)>,
}

impl fmt::Display for ScrapeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n=== Scrape Run Complete ===")?;
        writeln!(f, "Targets queued:   {}", self.targets)?;
        writeln!(f, "Targets scraped:  {}", self.succeeded)?;
        writeln!(f, "Targets failed:   {}", self.failed)?;
        writeln!(f, "Records fetched:  {}", self.records_fetched)?;
        write!(f, "ICP-aligned:      {}", self.icp_aligned)?;
        if self.stopped_early {
            write!(f, "\nStopped before finishing the queue")?;
        }
        for (username, reason) in &self.failures {
            write!(f, "\n  failed @{username}: {reason}")?;
        }
        Ok(())
    }
}

/// Walks the target queue one account at a time, storing each batch and
/// marking the target done only after its batch is safely written.
pub struct ScrapeOrchestrator<F> {
    fetcher: F,
    queue: TargetQueue,
    store: BatchStore,
    classifier: Classifier,
    config: ScrapeConfig,
    cancel: CancellationToken,
}

impl<F: AccountFetcher> ScrapeOrchestrator<F> {
    pub fn new(
        fetcher: F,
        queue: TargetQueue,
        store: BatchStore,
        classifier: Classifier,
        config: ScrapeConfig,
    ) -> Self {
        Self {
            fetcher,
            queue,
            store,
            classifier,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Share an externally owned token, e.g. one cancelled by a Ctrl-C handler.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Cancelling this token ends a run: an in-flight fetch or pacing wait is
    /// abandoned and the current target stays pending.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn queue(&self) -> &TargetQueue {
        &self.queue
    }

    /// Fetch and store one account's list. Does not touch the queue.
    pub async fn scrape_one(
        &self,
        username: &str,
        scrape_type: ScrapeType,
        max_pages: u32,
    ) -> Result<BatchOutcome, FetchError> {
        let rows = self.fetcher.fetch(username, scrape_type, max_pages).await?;
        let batch_id = self
            .store
            .save(username, scrape_type, &rows, chrono::Local::now())?;

        let (records, _) = normalize_batch(&rows, &batch_id);
        let icp_aligned = records
            .iter()
            .filter(|r| self.classifier.is_icp_aligned(&r.username, &r.full_name))
            .count();

        Ok(BatchOutcome {
            batch_id,
            records: rows.len(),
            icp_aligned,
        })
    }

    /// Scrape every pending target, optionally for one priority only.
    ///
    /// A failed target is logged and left pending. Only a failure to persist
    /// the queue itself ends the run with an error.
    pub async fn run(
        &mut self,
        priority: Option<Priority>,
    ) -> Result<ScrapeStats, PersistenceError> {
        let targets = self.queue.next_batch(priority);
        let total = targets.len();
        let mut stats = ScrapeStats {
            targets: total,
            ..Default::default()
        };

        info!(
            total,
            priority = ?priority,
            pacing_secs = self.config.pacing.as_secs(),
            "Scraping target accounts"
        );

        for (i, target) in targets.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(remaining = total - i, "Stop requested, ending run");
                stats.stopped_early = true;
                break;
            }

            info!(position = i + 1, total, username = %target.username, "Scraping target");
            let fetch =
                self.scrape_one(&target.username, self.config.scrape_type, self.config.max_pages);
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!(username = %target.username, "Stop requested, abandoning fetch");
                    stats.stopped_early = true;
                    break;
                }
                result = fetch => result,
            };

            match result {
                Ok(outcome) => {
                    info!(
                        username = %target.username,
                        batch = %outcome.batch_id,
                        records = outcome.records,
                        icp = outcome.icp_aligned,
                        "Target scraped"
                    );
                    stats.succeeded += 1;
                    stats.records_fetched += outcome.records;
                    stats.icp_aligned += outcome.icp_aligned;
                    self.queue.mark_done(&target.username)?;
                }
                Err(e) => {
                    warn!(
                        username = %target.username,
                        error = %e,
                        "Target scrape failed, leaving it pending"
                    );
                    stats.failed += 1;
                    stats.failures.push((target.username.clone(), e.to_string()));
                }
            }

            let last = i + 1 == total;
            if !last && !self.config.pacing.is_zero() && !self.cancel.is_cancelled() {
                info!(secs = self.config.pacing.as_secs(), "Waiting before next scrape");
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.config.pacing) => {}
                }
            }
        }

        info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            records = stats.records_fetched,
            "Scrape run finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_percentage_handles_empty_batch() {
        let outcome = BatchOutcome {
            batch_id: "a_followers_20260215_100000".into(),
            records: 0,
            icp_aligned: 0,
        };
        assert!(outcome.to_string().contains("0/0 (0%)"));
    }

    #[test]
    fn stats_list_failures() {
        let stats = ScrapeStats {
            targets: 2,
            succeeded: 1,
            failed: 1,
            failures: vec![("beardazur".into(), "Run failed with status: ABORTED".into())],
            ..Default::default()
        };
        let text = stats.to_string();
        assert!(text.contains("Targets failed:   1"));
        assert!(text.contains("failed @beardazur: Run failed with status: ABORTED"));
    }
}
