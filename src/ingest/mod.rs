//! Pending-import hand-off.
//!
//! A share extension (or any other process) can drop files here while the
//! library is busy or closed; the importer flushes them later.
//!
//! ```text
//! share extension → PendingQueue::enqueue → inbox/ + pending.jsonl
//!                                                ↓
//!                          Importer::import_pending → library
//! ```

pub mod queue;

pub use queue::{
    compute_file_hash, EnqueueResult, PendingQueue, PendingQueueError, PendingRecord,
};
