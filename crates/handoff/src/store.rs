//! `HandoffStore` — durable, JSON-file-backed handoff storage.
//!
//! Grounded on the teacher's `SessionStore` (`sessions/src/store.rs`):
//! a `RwLock<HashMap<..>>` in front of one JSON file on disk, loaded once
//! at construction and flushed after every mutation. Generalized from a
//! single-entry-per-user map to a handoff chain keyed by `handoff_id`,
//! with `task_id` as the chain's lookup axis.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use ac_domain::concurrency::KeyedMutex;
use ac_domain::error::{Error, Result};
use ac_domain::handoff::HandoffDocument;
use ac_domain::trace::TraceEvent;

use crate::codec;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Record {
    doc: HandoffDocument,
    stored_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct OnDisk {
    #[serde(default)]
    handoffs: HashMap<String, Record>,
}

/// Durable handoff storage, one JSON file per store, serialized writes
/// per `task_id` so two successors of the same task never race each
/// other's save.
pub struct HandoffStore {
    path: PathBuf,
    records: RwLock<HashMap<String, Record>>,
    write_lock: KeyedMutex<String>,
    markdown_export: bool,
    markdown_dir: Option<PathBuf>,
}

impl HandoffStore {
    /// Load an existing store from `path`, or start empty if the file
    /// does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_markdown(path, false, None)
    }

    pub fn open_with_markdown(
        path: impl Into<PathBuf>,
        markdown_export: bool,
        markdown_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let path = path.into();
        let records = if path.exists() {
            let text = std::fs::read_to_string(&path).map_err(Error::Io)?;
            let on_disk: OnDisk = serde_json::from_str(&text).map_err(Error::Json)?;
            tracing::info!(path = %path.display(), count = on_disk.handoffs.len(), "loaded handoff store");
            on_disk.handoffs
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            records: RwLock::new(records),
            write_lock: KeyedMutex::new(),
            markdown_export,
            markdown_dir,
        })
    }

    /// Persist `doc`, serialized with every other save for the same
    /// `task_id`. Idempotent: saving the same `handoff_id` twice
    /// overwrites in place rather than duplicating.
    pub async fn save(&self, doc: HandoffDocument) -> Result<()> {
        let task_id = doc.task_id.clone();
        let handoff_id = doc.handoff_id.clone();
        let degraded = doc.degraded;
        let predecessor = doc.predecessor_handoff_id.clone();

        self.write_lock
            .with_lock(&task_id, || async {
                {
                    let mut records = self.records.write();
                    records.insert(
                        handoff_id.clone(),
                        Record {
                            doc: doc.clone(),
                            stored_at: chrono::Utc::now(),
                        },
                    );
                }
                self.flush()?;
                if self.markdown_export {
                    self.write_markdown(&doc)?;
                }
                Ok::<(), Error>(())
            })
            .await?;

        TraceEvent::HandoffSaved {
            handoff_id,
            agent_id: doc.source_agent.agent_id.clone(),
            predecessor_handoff_id: predecessor,
            degraded,
        }
        .emit();

        Ok(())
    }

    pub fn load(&self, handoff_id: &str) -> Result<HandoffDocument> {
        self.records
            .read()
            .get(handoff_id)
            .map(|r| r.doc.clone())
            .ok_or_else(|| Error::HandoffNotFound(handoff_id.to_string()))
    }

    /// Walk the chain backwards from `handoff_id` to the root (the first
    /// handoff with no predecessor), most recent first.
    ///
    /// `handoff_id` itself missing is `HandoffNotFound` (the caller asked
    /// for something that was never stored); a predecessor missing
    /// mid-walk is `ChainBroken` (the chain existed but is incomplete).
    pub fn chain(&self, handoff_id: &str) -> Result<Vec<HandoffDocument>> {
        let records = self.records.read();
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut cursor = Some(handoff_id.to_string());
        let mut first = true;

        while let Some(id) = cursor {
            if !seen.insert(id.clone()) {
                return Err(Error::ChainCycle(id));
            }
            let record = records.get(&id).ok_or_else(|| {
                if first {
                    Error::HandoffNotFound(id.clone())
                } else {
                    Error::ChainBroken(id.clone())
                }
            })?;
            first = false;
            cursor = record.doc.predecessor_handoff_id.clone();
            out.push(record.doc.clone());
        }

        TraceEvent::HandoffLoaded {
            handoff_id: handoff_id.to_string(),
            chain_depth: out.len() as u32,
        }
        .emit();

        Ok(out)
    }

    /// All handoffs for a task, oldest first (by `source_agent.version`).
    pub fn for_task(&self, task_id: &str) -> Vec<HandoffDocument> {
        let mut docs: Vec<HandoffDocument> = self
            .records
            .read()
            .values()
            .filter(|r| r.doc.task_id == task_id)
            .map(|r| r.doc.clone())
            .collect();
        docs.sort_by_key(|d| d.source_agent.version);
        docs
    }

    /// Remove handoffs older than `retention_days` that have no successor
    /// younger than the cutoff — a handoff whose successor is still within
    /// the retention window stays, so a live chain is never broken out
    /// from under itself. Returns the number removed.
    pub fn garbage_collect(&self, retention_days: u32) -> Result<usize> {
        let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days as i64);
        let removed = {
            let mut records = self.records.write();

            // A handoff has a "younger successor" if some other record's
            // `predecessor_handoff_id` points to it and that successor is
            // still within the retention window.
            let has_young_successor: std::collections::HashSet<String> = records
                .values()
                .filter(|r| r.stored_at >= cutoff)
                .filter_map(|r| r.doc.predecessor_handoff_id.clone())
                .collect();

            let before = records.len();
            records.retain(|id, r| r.stored_at >= cutoff || has_young_successor.contains(id));
            before - records.len()
        };
        if removed > 0 {
            self.flush()?;
        }
        Ok(removed)
    }

    /// Drop all handoffs for a task beyond `max_handoffs_per_task`,
    /// keeping the most recent versions.
    pub fn enforce_chain_limit(&self, task_id: &str, max_handoffs_per_task: u32) -> Result<()> {
        let mut docs = self.for_task(task_id);
        if docs.len() <= max_handoffs_per_task as usize {
            return Ok(());
        }
        docs.sort_by_key(|d| std::cmp::Reverse(d.source_agent.version));
        let to_drop: Vec<String> = docs
            .into_iter()
            .skip(max_handoffs_per_task as usize)
            .map(|d| d.handoff_id)
            .collect();
        {
            let mut records = self.records.write();
            for id in &to_drop {
                records.remove(id);
            }
        }
        self.flush()
    }

    fn flush(&self) -> Result<()> {
        let on_disk = OnDisk {
            handoffs: self.records.read().clone(),
        };
        let text = serde_json::to_string_pretty(&on_disk).map_err(Error::Json)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }
        std::fs::write(&self.path, text).map_err(Error::Io)
    }

    fn write_markdown(&self, doc: &HandoffDocument) -> Result<()> {
        let dir = self
            .markdown_dir
            .clone()
            .unwrap_or_else(|| self.path.with_extension(""));
        std::fs::create_dir_all(&dir).map_err(Error::Io)?;
        let file = dir.join(format!("{}.md", doc.handoff_id));
        std::fs::write(file, codec::continuation_prompt(doc)).map_err(Error::Io)
    }
}

#[allow(dead_code)]
fn default_store_path(base: &Path) -> PathBuf {
    base.join("handoffs.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::sample_document;

    fn temp_store() -> (HandoffStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = HandoffStore::open(dir.path().join("handoffs.json")).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let (store, _dir) = temp_store();
        let doc = sample_document();
        store.save(doc.clone()).await.unwrap();
        let loaded = store.load(&doc.handoff_id).unwrap();
        assert_eq!(loaded.handoff_id, doc.handoff_id);
    }

    #[tokio::test]
    async fn save_is_idempotent_on_same_handoff_id() {
        let (store, _dir) = temp_store();
        let doc = sample_document();
        store.save(doc.clone()).await.unwrap();
        store.save(doc.clone()).await.unwrap();
        assert_eq!(store.for_task(&doc.task_id).len(), 1);
    }

    #[tokio::test]
    async fn chain_walks_back_to_root() {
        let (store, _dir) = temp_store();
        let mut root = sample_document();
        root.handoff_id = "h1".to_string();
        root.predecessor_handoff_id = None;
        root.source_agent.version = 1;

        let mut child = sample_document();
        child.handoff_id = "h2".to_string();
        child.predecessor_handoff_id = Some("h1".to_string());
        child.source_agent.version = 2;

        store.save(root).await.unwrap();
        store.save(child).await.unwrap();

        let chain = store.chain("h2").unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].handoff_id, "h2");
        assert_eq!(chain[1].handoff_id, "h1");
    }

    #[tokio::test]
    async fn garbage_collect_removes_expired_entries() {
        let (store, _dir) = temp_store();
        let doc = sample_document();
        store.save(doc.clone()).await.unwrap();
        {
            let mut records = store.records.write();
            records.get_mut(&doc.handoff_id).unwrap().stored_at =
                chrono::Utc::now() - chrono::Duration::days(60);
        }
        let removed = store.garbage_collect(30).unwrap();
        assert_eq!(removed, 1);
        assert!(store.load(&doc.handoff_id).is_err());
    }

    #[tokio::test]
    async fn enforce_chain_limit_keeps_most_recent_versions() {
        let (store, _dir) = temp_store();
        for v in 1..=5u32 {
            let mut doc = sample_document();
            doc.handoff_id = format!("h{v}");
            doc.source_agent.version = v;
            store.save(doc).await.unwrap();
        }
        store.enforce_chain_limit("task-1", 2).unwrap();
        let remaining = store.for_task("task-1");
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].source_agent.version, 4);
        assert_eq!(remaining[1].source_agent.version, 5);
    }

    #[test]
    fn load_unknown_handoff_errors() {
        let (store, _dir) = temp_store();
        assert!(matches!(store.load("missing"), Err(Error::HandoffNotFound(_))));
    }

    #[tokio::test]
    async fn chain_missing_start_is_not_found() {
        let (store, _dir) = temp_store();
        assert!(matches!(store.chain("missing"), Err(Error::HandoffNotFound(_))));
    }

    #[tokio::test]
    async fn chain_missing_predecessor_is_chain_broken() {
        let (store, _dir) = temp_store();
        let mut child = sample_document();
        child.handoff_id = "h3".to_string();
        child.predecessor_handoff_id = Some("h2".to_string());
        child.source_agent.version = 3;
        store.save(child).await.unwrap();

        assert!(matches!(store.chain("h3"), Err(Error::ChainBroken(id)) if id == "h2"));
    }

    #[tokio::test]
    async fn garbage_collect_keeps_predecessor_with_young_successor() {
        let (store, _dir) = temp_store();
        let mut root = sample_document();
        root.handoff_id = "h1".to_string();
        root.predecessor_handoff_id = None;
        root.source_agent.version = 1;

        let mut child = sample_document();
        child.handoff_id = "h2".to_string();
        child.predecessor_handoff_id = Some("h1".to_string());
        child.source_agent.version = 2;

        store.save(root).await.unwrap();
        store.save(child).await.unwrap();
        {
            let mut records = store.records.write();
            records.get_mut("h1").unwrap().stored_at = chrono::Utc::now() - chrono::Duration::days(60);
        }

        let removed = store.garbage_collect(30).unwrap();
        assert_eq!(removed, 0);
        assert!(store.load("h1").is_ok());
    }

    #[tokio::test]
    async fn garbage_collect_removes_old_handoff_with_no_successor() {
        let (store, _dir) = temp_store();
        let mut root = sample_document();
        root.handoff_id = "h1".to_string();
        root.predecessor_handoff_id = None;
        root.source_agent.version = 1;
        store.save(root).await.unwrap();
        {
            let mut records = store.records.write();
            records.get_mut("h1").unwrap().stored_at = chrono::Utc::now() - chrono::Duration::days(60);
        }

        let removed = store.garbage_collect(30).unwrap();
        assert_eq!(removed, 1);
        assert!(store.load("h1").is_err());
    }
}
