//! Stored scrape batches and the manifest that declares their ingestion order.

use std::path::PathBuf;

use apify_client::ScrapeType;
use chrono::{DateTime, Local, NaiveDateTime};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::PersistenceError;
use crate::storage;

/// Raw rows returned by one scrape invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub id: String,
    pub records: Vec<Value>,
}

impl Batch {
    pub fn new(id: impl Into<String>, records: Vec<Value>) -> Self {
        Self {
            id: id.into(),
            records,
        }
    }
}

/// Which batches exist, in the order they must be reconciled.
///
/// Reconciliation keeps the first record seen per username, so the order
/// returned by `batch_ids` decides which batch's data wins.
pub trait BatchManifest {
    fn batch_ids(&self) -> Result<Vec<String>, PersistenceError>;

    fn load(&self, id: &str) -> Result<Batch, PersistenceError>;
}

/// Batches already in memory, reconciled in the order given.
#[derive(Debug, Clone, Default)]
pub struct MemoryManifest {
    batches: Vec<Batch>,
}

impl MemoryManifest {
    pub fn new(batches: Vec<Batch>) -> Self {
        Self { batches }
    }
}

impl BatchManifest for MemoryManifest {
    fn batch_ids(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.batches.iter().map(|b| b.id.clone()).collect())
    }

    fn load(&self, id: &str) -> Result<Batch, PersistenceError> {
        self.batches
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| {
                PersistenceError::io(
                    id,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no such batch"),
                )
            })
    }
}

/// One `<id>.json` file per batch in a directory, plus a `<id>.jsonl`
/// mirror with one record per line for inspection.
///
/// Ids look like `<username>_<type>_<YYYYmmdd_HHMMSS>` and are ingested in
/// lexicographic order.
#[derive(Debug, Clone)]
pub struct BatchStore {
    dir: PathBuf,
}

impl BatchStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn json_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Store a freshly fetched batch and return its id.
    pub fn save(
        &self,
        username: &str,
        scrape_type: ScrapeType,
        records: &[Value],
        at: DateTime<Local>,
    ) -> Result<String, PersistenceError> {
        let base = format!("{}_{}_{}", username, scrape_type, at.format("%Y%m%d_%H%M%S"));
        let mut id = base.clone();
        let mut n = 2;
        while self.json_path(&id).exists() {
            id = format!("{base}_{n}");
            n += 1;
        }

        let json_path = self.json_path(&id);
        storage::write_json_atomic(&json_path, records)?;

        let mut lines = Vec::new();
        for record in records {
            serde_json::to_writer(&mut lines, record)
                .map_err(|e| PersistenceError::json(&json_path, e))?;
            lines.push(b'\n');
        }
        storage::write_atomic(&self.dir.join(format!("{id}.jsonl")), &lines)?;

        info!(batch = %id, records = records.len(), path = %json_path.display(), "Saved batch");
        Ok(id)
    }
}

/// Whether `id` has the `<username>_<type>_<YYYYmmdd_HHMMSS>[_<n>]` shape
/// that [`BatchStore::save`] produces.
fn is_batch_id(id: &str) -> bool {
    let base = match id.rsplit_once('_') {
        Some((base, n)) if n.len() < 6 && n.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => id,
    };
    let mut parts = base.rsplitn(4, '_');
    let (Some(time), Some(date), Some(kind), Some(username)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    !username.is_empty()
        && kind.parse::<ScrapeType>().is_ok()
        && NaiveDateTime::parse_from_str(&format!("{date}_{time}"), "%Y%m%d_%H%M%S").is_ok()
}

impl BatchManifest for BatchStore {
    fn batch_ids(&self) -> Result<Vec<String>, PersistenceError> {
        let read = match std::fs::read_dir(&self.dir) {
            Ok(r) => r,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistenceError::io(&self.dir, e)),
        };

        let mut ids = Vec::new();
        for entry in read {
            let path = entry.map_err(|e| PersistenceError::io(&self.dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()) {
                Some(stem) if is_batch_id(stem) => ids.push(stem.to_string()),
                _ => debug!(path = %path.display(), "Ignoring non-batch file"),
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn load(&self, id: &str) -> Result<Batch, PersistenceError> {
        let path = self.json_path(id);
        let records: Vec<Value> = storage::read_json(&path)?.ok_or_else(|| {
            PersistenceError::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "batch file missing"),
            )
        })?;
        Ok(Batch::new(id, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn at(h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 2, 15, h, 0, 0).unwrap()
    }

    #[test]
    fn missing_dir_has_no_batches() {
        let dir = tempfile::tempdir().unwrap();
        let store = BatchStore::new(dir.path().join("data"));
        assert!(store.batch_ids().unwrap().is_empty());
    }

    #[test]
    fn save_writes_json_and_line_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let store = BatchStore::new(dir.path());
        let rows = vec![json!({"username": "a"}), json!({"username": "b"})];

        let id = store.save("bearlinman", ScrapeType::Followers, &rows, at(10)).unwrap();
        assert_eq!(id, "bearlinman_followers_20260215_100000");

        assert_eq!(store.load(&id).unwrap().records, rows);
        let mirror = std::fs::read_to_string(dir.path().join(format!("{id}.jsonl"))).unwrap();
        assert_eq!(mirror.lines().count(), 2);
    }

    #[test]
    fn ids_are_sorted_and_mirrors_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = BatchStore::new(dir.path());
        store.save("zeta", ScrapeType::Followers, &[], at(9)).unwrap();
        store.save("alpha", ScrapeType::Following, &[], at(11)).unwrap();
        store.save("alpha", ScrapeType::Followers, &[], at(8)).unwrap();

        assert_eq!(
            store.batch_ids().unwrap(),
            vec![
                "alpha_followers_20260215_080000",
                "alpha_following_20260215_110000",
                "zeta_followers_20260215_090000",
            ]
        );
    }

    #[test]
    fn same_second_saves_do_not_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let store = BatchStore::new(dir.path());
        let first = store
            .save("a", ScrapeType::Followers, &[json!({"username": "x"})], at(1))
            .unwrap();
        let second = store.save("a", ScrapeType::Followers, &[], at(1)).unwrap();
        assert_ne!(first, second);
        assert_eq!(store.load(&first).unwrap().records.len(), 1);
    }

    #[test]
    fn other_json_files_in_data_dir_are_not_batches() {
        let dir = tempfile::tempdir().unwrap();
        let store = BatchStore::new(dir.path());
        for name in [
            "audience_tracker.json",
            "prospects.json",
            "icp_target_venues.json",
            "cookies.json",
            "icp_target_venues.done.json",
        ] {
            std::fs::write(dir.path().join(name), "[]").unwrap();
        }
        let id = store.save("bear_linman", ScrapeType::Followers, &[], at(10)).unwrap();
        let again = store.save("bear_linman", ScrapeType::Followers, &[], at(10)).unwrap();

        assert_eq!(store.batch_ids().unwrap(), vec![id, again]);
    }

    #[test]
    fn batch_id_shape() {
        assert!(is_batch_id("dj.bearosol_following_20260215_100000"));
        assert!(is_batch_id("a_followers_20260215_100000_12"));
        assert!(!is_batch_id("audience_tracker"));
        assert!(!is_batch_id("a_friends_20260215_100000"));
        assert!(!is_batch_id("a_followers_20261399_100000"));
        assert!(!is_batch_id("_followers_20260215_100000"));
    }

    #[test]
    fn memory_manifest_keeps_declared_order() {
        let manifest = MemoryManifest::new(vec![Batch::new("z", vec![]), Batch::new("a", vec![])]);
        assert_eq!(manifest.batch_ids().unwrap(), vec!["z", "a"]);
        assert!(manifest.load("missing").is_err());
    }
}
