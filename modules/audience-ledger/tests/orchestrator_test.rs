//! Scrape orchestration tests against a scripted fetcher.
//!
//! No network: `MockFetcher` answers per username and records call order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use apify_client::ApifyError;
use async_trait::async_trait;
use audience_ledger::*;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct MockFetcher {
    responses: HashMap<String, Vec<Value>>,
    calls: Arc<Mutex<Vec<String>>>,
    // Cancel the token after this many calls.
    cancel_after: Option<(usize, CancellationToken)>,
}

impl MockFetcher {
    fn with(mut self, username: &str, rows: Vec<Value>) -> Self {
        self.responses.insert(username.to_string(), rows);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AccountFetcher for MockFetcher {
    async fn fetch(
        &self,
        username: &str,
        _scrape_type: ScrapeType,
        _max_pages: u32,
    ) -> Result<Vec<Value>, FetchError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(username.to_string());
            calls.len()
        };
        if let Some((limit, token)) = &self.cancel_after {
            if n >= *limit {
                token.cancel();
            }
        }
        self.responses
            .get(username)
            .cloned()
            .ok_or_else(|| ApifyError::RunFailed("FAILED".to_string()).into())
    }
}

// Stands in for an actor run that is still polling.
struct SlowFetcher;

#[async_trait]
impl AccountFetcher for SlowFetcher {
    async fn fetch(
        &self,
        _username: &str,
        _scrape_type: ScrapeType,
        _max_pages: u32,
    ) -> Result<Vec<Value>, FetchError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(Vec::new())
    }
}

fn seed(dir: &std::path::Path, targets: &[(&str, Priority)]) -> std::path::PathBuf {
    let path = dir.join("targets.json");
    let rows: Vec<TargetAccount> = targets
        .iter()
        .map(|(u, p)| TargetAccount {
            username: u.to_string(),
            priority: *p,
            scraped: false,
        })
        .collect();
    std::fs::write(&path, serde_json::to_vec(&rows).unwrap()).unwrap();
    path
}

fn config() -> ScrapeConfig {
    ScrapeConfig {
        pacing: Duration::ZERO,
        max_pages: 5,
        scrape_type: ScrapeType::Followers,
    }
}

#[tokio::test]
async fn failed_target_stays_pending_and_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let targets = seed(
        dir.path(),
        &[("ok1", Priority::P1), ("broken", Priority::P1), ("ok2", Priority::P2)],
    );
    let fetcher = MockFetcher::default()
        .with("ok1", vec![json!({"username": "bear_a"}), json!({"username": "b"})])
        .with("ok2", vec![json!({"username": "c"})]);

    let mut orchestrator = ScrapeOrchestrator::new(
        fetcher.clone(),
        TargetQueue::load(&targets),
        BatchStore::new(dir.path().join("data")),
        Classifier::new(["bear"]),
        config(),
    );
    let stats = orchestrator.run(None).await.unwrap();

    assert_eq!(fetcher.calls(), vec!["ok1", "broken", "ok2"]);
    assert_eq!(stats.targets, 3);
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.records_fetched, 3);
    assert_eq!(stats.icp_aligned, 1);
    assert_eq!(stats.failures[0].0, "broken");

    let reloaded = TargetQueue::load(&targets);
    let pending: Vec<_> = reloaded.next_batch(None).into_iter().map(|t| t.username).collect();
    assert_eq!(pending, vec!["broken"]);

    let batches = BatchStore::new(dir.path().join("data")).batch_ids().unwrap();
    assert_eq!(batches.len(), 2);
}

#[tokio::test]
async fn priority_run_only_touches_that_priority() {
    let dir = tempfile::tempdir().unwrap();
    let targets = seed(dir.path(), &[("p1", Priority::P1), ("p2", Priority::P2)]);
    let fetcher = MockFetcher::default()
        .with("p1", vec![])
        .with("p2", vec![]);

    let mut orchestrator = ScrapeOrchestrator::new(
        fetcher.clone(),
        TargetQueue::load(&targets),
        BatchStore::new(dir.path().join("data")),
        Classifier::default(),
        config(),
    );
    orchestrator.run(Some(Priority::P2)).await.unwrap();

    assert_eq!(fetcher.calls(), vec!["p2"]);
    assert_eq!(orchestrator.queue().pending(Priority::P1), 1);
    assert_eq!(orchestrator.queue().pending(Priority::P2), 0);
}

#[tokio::test]
async fn cancel_ends_run_between_targets_and_resume_picks_up() {
    let dir = tempfile::tempdir().unwrap();
    let targets = seed(
        dir.path(),
        &[("a", Priority::P1), ("b", Priority::P1), ("c", Priority::P1)],
    );
    let cancel = CancellationToken::new();
    let fetcher = MockFetcher {
        cancel_after: Some((1, cancel.clone())),
        ..MockFetcher::default()
    }
    .with("a", vec![json!({"username": "x"})])
    .with("b", vec![])
    .with("c", vec![]);

    let mut orchestrator = ScrapeOrchestrator::new(
        fetcher.clone(),
        TargetQueue::load(&targets),
        BatchStore::new(dir.path().join("data")),
        Classifier::default(),
        config(),
    )
    .with_cancel_token(cancel);

    let stats = orchestrator.run(None).await.unwrap();
    assert!(stats.stopped_early);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(fetcher.calls(), vec!["a"]);

    let resumed = TargetQueue::load(&targets);
    let pending: Vec<_> = resumed.next_batch(None).into_iter().map(|t| t.username).collect();
    assert_eq!(pending, vec!["b", "c"]);
}

#[tokio::test]
async fn scrape_one_stores_batch_without_marking_queue() {
    let dir = tempfile::tempdir().unwrap();
    let targets = seed(dir.path(), &[("bearlinman", Priority::P1)]);
    let fetcher = MockFetcher::default().with(
        "bearlinman",
        vec![json!({"username": "woofer"}), json!({"username": "plain"})],
    );
    let store = BatchStore::new(dir.path().join("data"));

    let orchestrator = ScrapeOrchestrator::new(
        fetcher,
        TargetQueue::load(&targets),
        store.clone(),
        Classifier::default(),
        config(),
    );
    let outcome = orchestrator
        .scrape_one("bearlinman", ScrapeType::Following, 50)
        .await
        .unwrap();

    assert_eq!(outcome.records, 2);
    assert_eq!(outcome.icp_aligned, 1);
    assert!(outcome.batch_id.starts_with("bearlinman_following_"));
    assert_eq!(store.load(&outcome.batch_id).unwrap().records.len(), 2);
    assert_eq!(TargetQueue::load(&targets).pending(Priority::P1), 1);
}

#[tokio::test(start_paused = true)]
async fn pacing_waits_between_targets_only() {
    let dir = tempfile::tempdir().unwrap();
    let targets = seed(dir.path(), &[("a", Priority::P1), ("b", Priority::P1)]);
    let fetcher = MockFetcher::default().with("a", vec![]).with("b", vec![]);

    let mut orchestrator = ScrapeOrchestrator::new(
        fetcher,
        TargetQueue::load(&targets),
        BatchStore::new(dir.path().join("data")),
        Classifier::default(),
        ScrapeConfig {
            pacing: Duration::from_secs(60),
            ..config()
        },
    );

    let started = tokio::time::Instant::now();
    orchestrator.run(None).await.unwrap();
    // One gap for two targets, none after the last.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(60));
    assert!(elapsed < Duration::from_secs(120));
}

#[tokio::test(start_paused = true)]
async fn cancel_cuts_pacing_wait_short() {
    let dir = tempfile::tempdir().unwrap();
    let targets = seed(dir.path(), &[("a", Priority::P1), ("b", Priority::P1)]);
    let fetcher = MockFetcher::default().with("a", vec![]).with("b", vec![]);

    let mut orchestrator = ScrapeOrchestrator::new(
        fetcher.clone(),
        TargetQueue::load(&targets),
        BatchStore::new(dir.path().join("data")),
        Classifier::default(),
        ScrapeConfig {
            pacing: Duration::from_secs(60),
            ..config()
        },
    );
    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        cancel.cancel();
    });

    let started = tokio::time::Instant::now();
    let stats = orchestrator.run(None).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(60));
    assert!(stats.stopped_early);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(fetcher.calls(), vec!["a"]);
    assert_eq!(orchestrator.queue().pending(Priority::P1), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_abandons_in_flight_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let targets = seed(dir.path(), &[("slow", Priority::P1)]);

    let mut orchestrator = ScrapeOrchestrator::new(
        SlowFetcher,
        TargetQueue::load(&targets),
        BatchStore::new(dir.path().join("data")),
        Classifier::default(),
        config(),
    );
    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    let stats = orchestrator.run(None).await.unwrap();
    assert!(stats.stopped_early);
    assert_eq!(stats.succeeded + stats.failed, 0);
    assert_eq!(TargetQueue::load(&targets).pending(Priority::P1), 1);
}
