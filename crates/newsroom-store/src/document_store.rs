//! The document-store contract the core consumes (§6): point reads,
//! partitioned queries, atomic upsert with optimistic concurrency, and a
//! per-container change feed delivered in commit order to a single active
//! consumer per lease. Modeled as traits so the pipeline is storage-agnostic
//! — `memory::InMemoryStore` and `redis_store::RedisStore` both implement
//! them, the same shape `JobQueueService` in the teacher wraps a concrete
//! Redis connection behind an async API.

use async_trait::async_trait;
use newsroom_core::error::{NewsroomError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A document stored in a container. `id` and `partition` must be stable
/// and cheap: the store uses them as the physical key.
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn doc_id(&self) -> String;
    fn partition(&self) -> String;
}

/// `get`/`query`/`upsert` from §6. `query`'s result order is explicitly
/// unspecified — callers must sort in application code, per the "known
/// source defect" the spec asks us to reproduce as a contract (§9).
#[async_trait]
pub trait DocumentStore<D: Document>: Send + Sync {
    async fn get(&self, container: &str, id: &str, partition: &str) -> Result<Option<D>>;

    /// Same as `get`, but also returns the document's current etag so a
    /// caller can re-read-then-upsert under optimistic concurrency (§4.4's
    /// attach retry loop).
    async fn get_with_etag(&self, container: &str, id: &str, partition: &str) -> Result<Option<(D, String)>>;

    /// Returns every document in `container` (optionally scoped to one
    /// partition) for which `predicate` returns true. No ordering guarantee.
    async fn query(
        &self,
        container: &str,
        partition: Option<&str>,
        predicate: &(dyn Fn(&D) -> bool + Send + Sync),
    ) -> Result<Vec<D>>;

    /// Atomic upsert. `etag` is the caller's last-known version; `None`
    /// means "create or overwrite unconditionally" (used only for inserts
    /// where a primary-key conflict is itself the concurrency signal, e.g.
    /// article ingest). Returns the new etag on success, or
    /// `NewsroomError::PreconditionFailed` if a supplied etag is stale.
    async fn upsert(&self, container: &str, doc: D, etag: Option<&str>) -> Result<String>;

    /// Convenience for "insert if absent" semantics used by article ingest
    /// (§4.3): returns `Ok(None)` if the id already exists (duplicate,
    /// not an error), `Ok(Some(etag))` if inserted.
    async fn insert_if_absent(&self, container: &str, doc: D) -> Result<Option<String>> {
        let existing = self.get(container, &doc.doc_id(), &doc.partition()).await?;
        if existing.is_some() {
            return Ok(None);
        }
        match self.upsert(container, doc, None).await {
            Ok(etag) => Ok(Some(etag)),
            Err(NewsroomError::PreconditionFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// One change-feed entry: the document as of that commit, plus a
/// monotonically increasing per-partition sequence number used for
/// checkpointing.
#[derive(Debug, Clone)]
pub struct ChangeEntry<D> {
    pub doc: D,
    pub sequence: u64,
}

/// A batch of change-feed entries delivered to a single active consumer.
/// `checkpoint_token` is opaque to the caller and passed back to
/// `checkpoint` after the batch is fully processed.
#[derive(Debug, Clone)]
pub struct ChangeBatch<D> {
    pub entries: Vec<ChangeEntry<D>>,
    pub checkpoint_token: String,
}

/// Pull-based, explicitly checkpointed change-feed consumer (§9: "modeled
/// as a typed pull API with explicit checkpointing, not an implicit
/// callback"). `lease_prefix` identifies the consumer group; the store
/// guarantees a single active reader per lease.
#[async_trait]
pub trait ChangeFeedConsumer<D: Document>: Send + Sync {
    /// Pulls up to `max_items` undelivered entries for `lease_prefix`.
    /// Returns `Ok(None)` if there is nothing new.
    async fn next_batch(
        &self,
        container: &str,
        lease_prefix: &str,
        max_items: usize,
    ) -> Result<Option<ChangeBatch<D>>>;

    /// Acknowledges a batch so it is not redelivered. Must be called only
    /// after every entry in the batch has been durably processed.
    async fn checkpoint(&self, container: &str, lease_prefix: &str, batch: &ChangeBatch<D>) -> Result<()>;
}
