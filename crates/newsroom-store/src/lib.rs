//! The persistence abstraction the core pipeline consumes (§6), with a
//! Redis-backed implementation (matching the teacher's Redis stack) and an
//! in-memory implementation for tests and local development.

pub mod containers;
pub mod document_store;
pub mod memory;
pub mod records;
pub mod redis_store;

pub use document_store::{ChangeBatch, ChangeEntry, ChangeFeedConsumer, Document, DocumentStore};
pub use memory::InMemoryStore;
pub use records::{BatchJobStatus, BatchTracking, PollState};
pub use redis_store::RedisStore;
