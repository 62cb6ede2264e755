//! Sequence allocator: hands out monotonically increasing config indices and
//! derives the matching on-chain config address.
//!
//! The increment runs on the store's atomic counter, so two concurrent
//! launches can never observe the same index. A request that fails after
//! allocation simply burns its index; indices are never reused.

use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;

use crate::error::ApiError;
use crate::store::KvStore;

/// One allocated configuration slot. Immutable once issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigSlot {
    pub index: u64,
    pub address: Pubkey,
}

pub struct SequenceAllocator {
    store: Arc<dyn KvStore>,
    counter_key: String,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn KvStore>, counter_key: impl Into<String>) -> Self {
        Self {
            store,
            counter_key: counter_key.into(),
        }
    }

    pub async fn allocate(&self) -> Result<ConfigSlot, ApiError> {
        let index = self
            .store
            .incr(&self.counter_key)
            .await
            .map_err(ApiError::IndexAllocation)?;
        let (address, _) = tknz_sdk::dbc::derive_config_address(index);
        Ok(ConfigSlot { index, address })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use std::collections::HashSet;

    #[tokio::test]
    async fn indices_start_at_one_and_increase() {
        let store = Arc::new(MemoryStore::new());
        let allocator = SequenceAllocator::new(store, "counters:test");
        let a = allocator.allocate().await.unwrap();
        let b = allocator.allocate().await.unwrap();
        assert_eq!(a.index, 1);
        assert_eq!(b.index, 2);
        assert_ne!(a.address, b.address);
    }

    #[tokio::test]
    async fn concurrent_allocations_are_pairwise_distinct() {
        let store = Arc::new(MemoryStore::new());
        let allocator = Arc::new(SequenceAllocator::new(store, "counters:test"));

        let mut handles = Vec::new();
        for _ in 0..64 {
            let alloc = allocator.clone();
            handles.push(tokio::spawn(async move {
                alloc.allocate().await.unwrap().index
            }));
        }

        let mut seen = HashSet::new();
        for h in handles {
            let index = h.await.unwrap();
            assert!(seen.insert(index), "index {} handed out twice", index);
        }
        assert_eq!(seen.len(), 64);
    }

    #[tokio::test]
    async fn derived_address_matches_the_index_derivation() {
        let store = Arc::new(MemoryStore::new());
        let allocator = SequenceAllocator::new(store, "counters:test");
        let slot = allocator.allocate().await.unwrap();
        assert_eq!(
            slot.address,
            tknz_sdk::dbc::derive_config_address(slot.index).0
        );
    }
}
