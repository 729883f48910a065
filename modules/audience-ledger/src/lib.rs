pub mod analyze;
pub mod batches;
pub mod classifier;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod ledger;
pub mod orchestrator;
pub mod prospects;
pub mod reconcile;
pub mod record;
pub mod report;
mod storage;
pub mod targets;

pub use analyze::{analyze, AnalysisSummary};
pub use apify_client::ScrapeType;
pub use batches::{Batch, BatchManifest, BatchStore, MemoryManifest};
pub use classifier::{classify, Classifier, DEFAULT_KEYWORDS};
pub use config::{Credentials, FileConfig, PathsConfig, ScrapeSettings};
pub use error::{ConfigError, FetchError, PersistenceError};
pub use fetcher::{AccountFetcher, ApifyFetcher};
pub use ledger::{Action, Ledger, LedgerEntry, LedgerStore, MergeOutcome, Relationship};
pub use orchestrator::{BatchOutcome, ScrapeConfig, ScrapeOrchestrator, ScrapeStats};
pub use prospects::{ProspectEntry, ProspectFile};
pub use reconcile::{reconcile, Reconciliation};
pub use record::{normalize_batch, AccountRecord, MalformedRecord};
pub use report::AudienceReport;
pub use targets::{Priority, TargetAccount, TargetQueue, FALLBACK_TARGETS};
