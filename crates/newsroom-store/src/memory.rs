//! In-memory `DocumentStore`/`ChangeFeedConsumer` implementation, backed by
//! `DashMap` for concurrent access without a global lock — the same
//! concurrency primitive `entity_resolution.rs`'s caches use. Used in tests
//! and as a drop-in for local development where no Redis is available.

use async_trait::async_trait;
use dashmap::DashMap;
use newsroom_core::error::{NewsroomError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::document_store::{ChangeBatch, ChangeEntry, ChangeFeedConsumer, Document, DocumentStore};

struct StoredDoc<D> {
    doc: D,
    etag: String,
}

/// Key for the primary document table: (container, partition, id).
type DocKey = (String, String, String);

pub struct InMemoryStore<D> {
    docs: DashMap<DocKey, StoredDoc<D>>,
    /// Append-only per-container change log, oldest first.
    changes: DashMap<String, RwLock<Vec<ChangeEntry<D>>>>,
    next_sequence: AtomicU64,
    /// Per (container, lease_prefix) cursor: sequence number already
    /// acknowledged.
    cursors: DashMap<(String, String), u64>,
}

impl<D: Document> Default for InMemoryStore<D> {
    fn default() -> Self {
        Self {
            docs: DashMap::new(),
            changes: DashMap::new(),
            next_sequence: AtomicU64::new(1),
            cursors: DashMap::new(),
        }
    }
}

impl<D: Document> InMemoryStore<D> {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_change(&self, container: &str, doc: D) {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let log = self
            .changes
            .entry(container.to_string())
            .or_insert_with(|| RwLock::new(Vec::new()));
        log.write().expect("change log lock poisoned").push(ChangeEntry { doc, sequence });
    }
}

#[async_trait]
impl<D: Document> DocumentStore<D> for InMemoryStore<D> {
    async fn get(&self, container: &str, id: &str, partition: &str) -> Result<Option<D>> {
        let key = (container.to_string(), partition.to_string(), id.to_string());
        Ok(self.docs.get(&key).map(|entry| entry.doc.clone()))
    }

    async fn get_with_etag(&self, container: &str, id: &str, partition: &str) -> Result<Option<(D, String)>> {
        let key = (container.to_string(), partition.to_string(), id.to_string());
        Ok(self.docs.get(&key).map(|entry| (entry.doc.clone(), entry.etag.clone())))
    }

    async fn query(
        &self,
        container: &str,
        partition: Option<&str>,
        predicate: &(dyn Fn(&D) -> bool + Send + Sync),
    ) -> Result<Vec<D>> {
        let results = self
            .docs
            .iter()
            .filter(|entry| {
                let (c, p, _) = entry.key();
                c == container && partition.map(|part| part == p).unwrap_or(true)
            })
            .map(|entry| entry.value().doc.clone())
            .filter(|doc| predicate(doc))
            .collect();
        Ok(results)
    }

    async fn upsert(&self, container: &str, doc: D, etag: Option<&str>) -> Result<String> {
        let key = (container.to_string(), doc.partition(), doc.doc_id());
        let new_etag = uuid::Uuid::new_v4().to_string();

        match self.docs.get(&key) {
            Some(existing) => {
                if let Some(expected) = etag {
                    if existing.etag != expected {
                        return Err(NewsroomError::PreconditionFailed {
                            container: container.to_string(),
                            id: doc.doc_id(),
                        });
                    }
                }
            }
            None => {
                if let Some(expected) = etag {
                    return Err(NewsroomError::PreconditionFailed {
                        container: container.to_string(),
                        id: expected.to_string(),
                    });
                }
            }
        }

        self.docs.insert(key, StoredDoc { doc: doc.clone(), etag: new_etag.clone() });
        self.record_change(container, doc);
        Ok(new_etag)
    }
}

#[async_trait]
impl<D: Document> ChangeFeedConsumer<D> for InMemoryStore<D> {
    async fn next_batch(
        &self,
        container: &str,
        lease_prefix: &str,
        max_items: usize,
    ) -> Result<Option<ChangeBatch<D>>> {
        let cursor_key = (container.to_string(), lease_prefix.to_string());
        let since = self.cursors.get(&cursor_key).map(|c| *c).unwrap_or(0);

        let Some(log) = self.changes.get(container) else {
            return Ok(None);
        };
        let entries: Vec<ChangeEntry<D>> = log
            .read()
            .expect("change log lock poisoned")
            .iter()
            .filter(|entry| entry.sequence > since)
            .take(max_items)
            .cloned()
            .collect();

        if entries.is_empty() {
            return Ok(None);
        }

        let checkpoint_token = entries.last().expect("non-empty").sequence.to_string();
        Ok(Some(ChangeBatch { entries, checkpoint_token }))
    }

    async fn checkpoint(&self, container: &str, lease_prefix: &str, batch: &ChangeBatch<D>) -> Result<()> {
        let cursor_key = (container.to_string(), lease_prefix.to_string());
        let sequence: u64 = batch
            .checkpoint_token
            .parse()
            .map_err(|_| NewsroomError::InvariantViolation("malformed checkpoint token".to_string()))?;
        self.cursors.insert(cursor_key, sequence);
        Ok(())
    }
}
