//! Transaction trait for atomic storage operations.
//!
//! The task store relies on transactions for quota enforcement: a task row
//! and its per-day counter are written in one commit, and the counter write
//! is a compare-and-set against the value the store observed. Either both
//! land or neither does.
//!
//! # Example
//!
//! ```
//! use togo_storage::{MemoryBackend, StorageBackend};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let backend = MemoryBackend::new();
//!
//! let mut txn = backend.transaction().await.unwrap();
//! txn.compare_and_set(b"task-counts/day".to_vec(), None, b"1".to_vec()).unwrap();
//! txn.set(b"tasks/day/0000000000".to_vec(), b"{}".to_vec());
//! txn.commit().await.unwrap();
//!
//! let count = backend.get(b"task-counts/day").await.unwrap().unwrap();
//! assert_eq!(&count[..], b"1");
//! # });
//! ```

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageResult;

/// Transaction handle for atomic multi-operation commits.
///
/// Writes and compare-and-set operations are buffered until
/// [`commit`](Transaction::commit). Reads through the transaction see its own
/// pending writes.
///
/// # Concurrency
///
/// Isolation is optimistic. A transaction that buffered a compare-and-set
/// fails at commit with [`StorageError::Conflict`](crate::StorageError::Conflict)
/// if another writer changed that key after it was read.
#[async_trait]
pub trait Transaction: Send {
    /// Gets a value within the transaction, preferring pending writes.
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Buffers an unconditional write.
    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    /// Buffers a conditional write.
    ///
    /// `expected: None` requires the key to be absent at commit time;
    /// `expected: Some(v)` requires an exact byte match. The condition is
    /// evaluated at commit, not here. A failed condition rejects the whole
    /// transaction.
    fn compare_and_set(
        &mut self,
        key: Vec<u8>,
        expected: Option<Vec<u8>>,
        new_value: Vec<u8>,
    ) -> StorageResult<()>;

    /// Commits all buffered operations atomically.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Conflict`](crate::StorageError::Conflict) if a compare-and-set
    ///   precondition no longer holds
    /// - Other [`StorageError`](crate::StorageError) variants on backend failures
    async fn commit(self: Box<Self>) -> StorageResult<()>;
}
