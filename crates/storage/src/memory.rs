//! In-memory storage backend implementation.
//!
//! [`MemoryBackend`] is the backend the `togo` binary runs on and the one
//! every test uses. It is an ordered map behind a read-write lock:
//!
//! - **Thread-safe**: [`parking_lot::RwLock`] around a [`BTreeMap`]
//! - **Ordered**: range scans return keys in ascending byte order
//! - **Transactional**: compare-and-set preconditions and buffered writes are
//!   checked and applied under a single write lock at commit
//!
//! Data is not persisted and is lost when the process exits.
//!
//! # Fail points
//!
//! With the `failpoints` feature, `memory-get`, `memory-range` and
//! `memory-commit` can be configured through the `fail` crate to simulate an
//! unavailable store.

use std::{
    collections::BTreeMap,
    ops::{Bound, RangeBounds},
    sync::Arc,
};

use async_trait::async_trait;
use bytes::Bytes;
use fail::fail_point;
use parking_lot::RwLock;

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
    transaction::Transaction,
    types::KeyValue,
};

/// In-memory storage backend using [`BTreeMap`].
///
/// Cloning is cheap; all clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Bytes>>>,
}

impl MemoryBackend {
    /// Creates an empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` if no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    #[tracing::instrument(skip(self, key), fields(key_len = key.len()))]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        fail_point!("memory-get", |_| {
            Err(StorageError::connection("injected failure in memory-get"))
        });

        let data = self.data.read();
        Ok(data.get(key).cloned())
    }

    #[tracing::instrument(skip(self, key, value), fields(key_len = key.len()))]
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        let mut data = self.data.write();
        data.insert(key, Bytes::from(value));
        Ok(())
    }

    #[tracing::instrument(skip(self, key, expected, new_value), fields(key_len = key.len()))]
    async fn compare_and_set(
        &self,
        key: &[u8],
        expected: Option<&[u8]>,
        new_value: Vec<u8>,
    ) -> StorageResult<()> {
        let mut data = self.data.write();

        let matches = match (expected, data.get(key)) {
            (None, None) => true,
            (Some(exp), Some(cur)) => exp == &cur[..],
            _ => false,
        };

        if !matches {
            return Err(StorageError::Conflict);
        }

        data.insert(key.to_vec(), Bytes::from(new_value));
        Ok(())
    }

    #[tracing::instrument(skip(self, range))]
    async fn get_range<R>(&self, range: R) -> StorageResult<Vec<KeyValue>>
    where
        R: RangeBounds<Vec<u8>> + Send,
    {
        fail_point!("memory-range", |_| {
            Err(StorageError::connection("injected failure in memory-range"))
        });

        let start = match range.start_bound() {
            Bound::Included(b) => Bound::Included(b.as_slice()),
            Bound::Excluded(b) => Bound::Excluded(b.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };

        let end = match range.end_bound() {
            Bound::Included(b) => Bound::Included(b.as_slice()),
            Bound::Excluded(b) => Bound::Excluded(b.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };

        let data = self.data.read();
        let results = data
            .range::<[u8], _>((start, end))
            .map(|(k, v)| KeyValue::new(Bytes::copy_from_slice(k), v.clone()))
            .collect();

        Ok(results)
    }

    #[tracing::instrument(skip(self))]
    async fn transaction(&self) -> StorageResult<Box<dyn Transaction>> {
        Ok(Box::new(MemoryTransaction::new(self.clone())))
    }

    #[tracing::instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<()> {
        // Fails only if the lock is wedged.
        let _unused = self.data.read();
        Ok(())
    }
}

/// A compare-and-set operation to be verified at commit time.
#[derive(Debug, Clone)]
struct CasOperation {
    key: Vec<u8>,
    expected: Option<Vec<u8>>,
    new_value: Vec<u8>,
}

/// In-memory transaction implementation.
///
/// Buffers writes until commit, providing read-your-writes semantics.
struct MemoryTransaction {
    backend: MemoryBackend,
    pending_writes: BTreeMap<Vec<u8>, Vec<u8>>,
    pending_cas: Vec<CasOperation>,
}

impl MemoryTransaction {
    fn new(backend: MemoryBackend) -> Self {
        Self { backend, pending_writes: BTreeMap::new(), pending_cas: Vec::new() }
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        if let Some(value) = self.pending_writes.get(key) {
            return Ok(Some(Bytes::copy_from_slice(value)));
        }
        if let Some(cas) = self.pending_cas.iter().rev().find(|cas| cas.key == key) {
            return Ok(Some(Bytes::copy_from_slice(&cas.new_value)));
        }

        self.backend.get(key).await
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.pending_writes.insert(key, value);
    }

    fn compare_and_set(
        &mut self,
        key: Vec<u8>,
        expected: Option<Vec<u8>>,
        new_value: Vec<u8>,
    ) -> StorageResult<()> {
        self.pending_cas.push(CasOperation { key, expected, new_value });
        Ok(())
    }

    #[tracing::instrument(name = "commit", skip(self))]
    async fn commit(self: Box<Self>) -> StorageResult<()> {
        fail_point!("memory-commit", |_| {
            Err(StorageError::connection("injected failure in memory-commit"))
        });

        let mut data = self.backend.data.write();

        // Every precondition must hold before anything is applied.
        for cas in &self.pending_cas {
            let matches = match (&cas.expected, data.get(&cas.key)) {
                (None, None) => true,
                (Some(expected), Some(current)) => expected.as_slice() == &current[..],
                _ => false,
            };

            if !matches {
                tracing::debug!("compare-and-set precondition failed at commit");
                return Err(StorageError::Conflict);
            }
        }

        for cas in self.pending_cas {
            data.insert(cas.key, Bytes::from(cas.new_value));
        }
        for (key, value) in self.pending_writes {
            data.insert(key, Bytes::from(value));
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_basic_operations() {
        let backend = MemoryBackend::new();

        backend.set(b"key1".to_vec(), b"value1".to_vec()).await.unwrap();
        let value = backend.get(b"key1").await.unwrap();
        assert_eq!(value, Some(Bytes::from("value1")));

        assert_eq!(backend.get(b"missing").await.unwrap(), None);
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_range_operations() {
        let backend = MemoryBackend::new();

        backend.set(b"a".to_vec(), b"1".to_vec()).await.unwrap();
        backend.set(b"b".to_vec(), b"2".to_vec()).await.unwrap();
        backend.set(b"c".to_vec(), b"3".to_vec()).await.unwrap();

        let range = backend.get_range(b"a".to_vec()..b"c".to_vec()).await.unwrap();
        assert_eq!(range.len(), 2);
        assert_eq!(range[0].key, Bytes::from("a"));
        assert_eq!(range[1].key, Bytes::from("b"));
    }

    #[tokio::test]
    async fn test_transaction_commits_all_writes() {
        let backend = MemoryBackend::new();

        let mut txn = backend.transaction().await.unwrap();
        txn.set(b"key1".to_vec(), b"value1".to_vec());
        txn.compare_and_set(b"counter".to_vec(), None, b"1".to_vec()).unwrap();

        // Read-your-writes inside the transaction.
        assert_eq!(txn.get(b"key1").await.unwrap(), Some(Bytes::from("value1")));
        assert_eq!(txn.get(b"counter").await.unwrap(), Some(Bytes::from("1")));

        // Nothing visible outside before commit.
        assert_eq!(backend.get(b"key1").await.unwrap(), None);

        txn.commit().await.unwrap();

        assert_eq!(backend.get(b"key1").await.unwrap(), Some(Bytes::from("value1")));
        assert_eq!(backend.get(b"counter").await.unwrap(), Some(Bytes::from("1")));
    }

    #[tokio::test]
    async fn test_transaction_conflict_applies_nothing() {
        let backend = MemoryBackend::new();
        backend.set(b"counter".to_vec(), b"3".to_vec()).await.unwrap();

        let mut txn = backend.transaction().await.unwrap();
        txn.compare_and_set(b"counter".to_vec(), Some(b"2".to_vec()), b"3".to_vec()).unwrap();
        txn.set(b"row".to_vec(), b"payload".to_vec());

        let result = txn.commit().await;
        assert!(matches!(result, Err(StorageError::Conflict)));
        assert_eq!(backend.get(b"row").await.unwrap(), None, "row must not be written");
        assert_eq!(backend.get(b"counter").await.unwrap(), Some(Bytes::from("3")));
    }

    #[tokio::test]
    async fn test_health_check() {
        let backend = MemoryBackend::new();
        assert!(backend.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_clone_shares_data() {
        let backend = MemoryBackend::new();
        let clone = backend.clone();

        backend.set(b"shared".to_vec(), b"yes".to_vec()).await.unwrap();
        assert_eq!(clone.get(b"shared").await.unwrap(), Some(Bytes::from("yes")));
    }

    #[tokio::test]
    async fn test_compare_and_set_success() {
        let backend = MemoryBackend::new();
        backend.set(b"key".to_vec(), b"old".to_vec()).await.unwrap();

        backend.compare_and_set(b"key", Some(b"old".as_slice()), b"new".to_vec()).await.unwrap();
        assert_eq!(backend.get(b"key").await.unwrap(), Some(Bytes::from("new")));
    }

    #[tokio::test]
    async fn test_compare_and_set_conflict() {
        let backend = MemoryBackend::new();
        backend.set(b"key".to_vec(), b"actual".to_vec()).await.unwrap();

        let result = backend.compare_and_set(b"key", Some(b"stale".as_slice()), b"new".to_vec()).await;
        assert!(matches!(result, Err(StorageError::Conflict)));
        assert_eq!(backend.get(b"key").await.unwrap(), Some(Bytes::from("actual")));
    }

    #[tokio::test]
    async fn test_compare_and_set_insert_if_absent() {
        let backend = MemoryBackend::new();

        backend.compare_and_set(b"key", None, b"first".to_vec()).await.unwrap();
        let second = backend.compare_and_set(b"key", None, b"second".to_vec()).await;

        assert!(matches!(second, Err(StorageError::Conflict)));
        assert_eq!(backend.get(b"key").await.unwrap(), Some(Bytes::from("first")));
    }

    mod proptest_range {
        use proptest::prelude::*;

        use super::*;

        fn arb_sorted_keys() -> impl Strategy<Value = Vec<Vec<u8>>> {
            proptest::collection::btree_set(proptest::collection::vec(any::<u8>(), 1..16), 1..32)
                .prop_map(|set| set.into_iter().collect())
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn range_query_results_are_sorted(keys in arb_sorted_keys()) {
                let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
                let results = rt.block_on(async {
                    let backend = MemoryBackend::new();
                    for key in keys.iter().rev() {
                        backend.set(key.clone(), b"v".to_vec()).await.unwrap();
                    }
                    backend.get_range::<std::ops::RangeFull>(..).await.unwrap()
                });

                prop_assert_eq!(results.len(), keys.len());
                for window in results.windows(2) {
                    prop_assert!(window[0].key < window[1].key);
                }
            }
        }
    }
}
