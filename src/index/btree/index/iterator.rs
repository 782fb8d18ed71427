use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::common::types::{PageId, Rid, INVALID_PAGE_ID};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::{BTreeNode, LeafNode};
use crate::index::btree::serialization::deserialize_node;
use crate::storage::buffer::{BufferPoolManager, PinGuard};
use super::base::BTreeIndex;

/// Forward scan over the leaf chain, yielding `(key, value)` pairs in
/// ascending key order.
///
/// The iterator holds exactly one pinned leaf while live; advancing past a
/// leaf unpins it clean and follows its forward pointer. Exhaustion
/// (`next()` returning `None`) is the end position; dropping the iterator
/// releases the pin.
pub struct BTreeIterator<K> {
    buffer_pool: Arc<BufferPoolManager>,
    leaf_max_size: usize,
    internal_max_size: usize,
    current: Option<(PinGuard, LeafNode<K>)>,
    slot: usize,
}

impl<K> BTreeIndex<K>
where
    K: Clone + Ord + Default + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static,
{
    /// Scan from the smallest key.
    pub fn iter(&self) -> Result<BTreeIterator<K>, BTreeError> {
        let state = self.root.lock();
        if state.page_id == INVALID_PAGE_ID {
            return Ok(self.end_iterator());
        }

        let (guard, leaf) = self.find_leaf(state.page_id, &K::default(), true)?;
        Ok(BTreeIterator {
            buffer_pool: Arc::clone(&self.buffer_pool),
            leaf_max_size: self.leaf_max_size,
            internal_max_size: self.internal_max_size,
            current: Some((guard, leaf)),
            slot: 0,
        })
    }

    /// Scan from the first key `>= key`.
    pub fn iter_from(&self, key: &K) -> Result<BTreeIterator<K>, BTreeError> {
        let state = self.root.lock();
        if state.page_id == INVALID_PAGE_ID {
            return Ok(self.end_iterator());
        }

        let (guard, leaf) = self.find_leaf(state.page_id, key, false)?;
        let slot = leaf.key_index(key);
        Ok(BTreeIterator {
            buffer_pool: Arc::clone(&self.buffer_pool),
            leaf_max_size: self.leaf_max_size,
            internal_max_size: self.internal_max_size,
            current: Some((guard, leaf)),
            slot,
        })
    }

    fn end_iterator(&self) -> BTreeIterator<K> {
        BTreeIterator {
            buffer_pool: Arc::clone(&self.buffer_pool),
            leaf_max_size: self.leaf_max_size,
            internal_max_size: self.internal_max_size,
            current: None,
            slot: 0,
        }
    }
}

impl<K> BTreeIterator<K>
where
    K: Clone + Ord + Default + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static,
{
    fn fetch_leaf(&self, page_id: PageId) -> Result<(PinGuard, LeafNode<K>), BTreeError> {
        let guard = PinGuard::fetch(&self.buffer_pool, page_id)?;
        let node = {
            let page = guard.page().read();
            deserialize_node::<K>(&page, self.leaf_max_size, self.internal_max_size)?
        };
        match node {
            BTreeNode::Leaf(leaf) => Ok((guard, leaf)),
            // The guard unpins on drop
            BTreeNode::Internal(_) => Err(BTreeError::InvalidPageFormat),
        }
    }
}

impl<K> Iterator for BTreeIterator<K>
where
    K: Clone + Ord + Default + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static,
{
    type Item = Result<(K, Rid), BTreeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (guard, leaf) = self.current.take()?;

            if self.slot < leaf.size() {
                let entry = (leaf.keys[self.slot].clone(), leaf.values[self.slot]);
                self.slot += 1;
                self.current = Some((guard, leaf));
                return Some(Ok(entry));
            }

            // Leaf exhausted: hand the pin back and follow the chain
            let next_page_id = leaf.next_leaf_page_id;
            if let Err(e) = guard.release() {
                return Some(Err(e.into()));
            }
            if next_page_id == INVALID_PAGE_ID {
                return None;
            }

            self.slot = 0;
            match self.fetch_leaf(next_page_id) {
                Ok(current) => self.current = Some(current),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
