use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::common::types::{PageId, Rid, HEADER_PAGE_ID, INVALID_PAGE_ID};
use crate::index::btree::error::BTreeError;
use crate::index::btree::key::FromInteger;
use crate::index::btree::node::{BTreeNode, LeafNode};
use crate::index::btree::serialization::{deserialize_node, serialize_node};
use crate::storage::buffer::{BufferPoolManager, PinGuard};
use crate::storage::page::HeaderPage;

/// Root bookkeeping, guarded by the tree mutex. `registered` records
/// whether the header page already holds a record for this index, so that
/// re-growing an emptied tree updates the record instead of inserting a
/// duplicate.
pub(crate) struct RootState {
    pub page_id: PageId,
    pub registered: bool,
}

/// Disk-resident B+Tree index mapping fixed-width keys to record IDs.
///
/// Every node lives in its own buffer-pool page; the current root page id
/// is persisted in the header page under the index name. One mutex
/// serializes all public operations.
pub struct BTreeIndex<K> {
    pub(crate) index_name: String,
    pub(crate) buffer_pool: Arc<BufferPoolManager>,
    pub(crate) root: Mutex<RootState>,
    pub(crate) leaf_max_size: usize,
    pub(crate) internal_max_size: usize,
    pub(crate) _phantom: PhantomData<K>,
}

impl<K> BTreeIndex<K>
where
    K: Clone + Ord + Default + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static,
{
    /// Create a handle on the index named `name`, adopting a previously
    /// registered root from the header page if one exists. A tree with no
    /// registered root starts empty; the first insert allocates the root.
    pub fn new(
        name: impl Into<String>,
        buffer_pool: Arc<BufferPoolManager>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self, BTreeError> {
        debug_assert!(leaf_max_size >= 2 && internal_max_size >= 3);
        let index_name = name.into();

        let registered_root = {
            let guard = PinGuard::fetch(&buffer_pool, HEADER_PAGE_ID)?;
            let root = {
                let page = guard.page().read();
                HeaderPage::new().get_record(&page, &index_name)
            };
            guard.release()?;
            root
        };

        let state = match registered_root {
            Some(page_id) => RootState {
                page_id,
                registered: true,
            },
            None => RootState {
                page_id: INVALID_PAGE_ID,
                registered: false,
            },
        };

        Ok(Self {
            index_name,
            buffer_pool,
            root: Mutex::new(state),
            leaf_max_size,
            internal_max_size,
            _phantom: PhantomData,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.root.lock().page_id == INVALID_PAGE_ID
    }

    /// The current root page id (`INVALID_PAGE_ID` when empty).
    pub fn root_page_id(&self) -> PageId {
        self.root.lock().page_id
    }

    /// Point lookup: the value stored under `key`, if any.
    pub fn get_value(&self, key: &K) -> Result<Option<Rid>, BTreeError> {
        let state = self.root.lock();
        if state.page_id == INVALID_PAGE_ID {
            return Ok(None);
        }

        let (guard, leaf) = self.find_leaf(state.page_id, key, false)?;
        let value = leaf.lookup(key);
        guard.release()?;
        Ok(value)
    }

    /// Walk from the root to the leaf responsible for `key` (or the
    /// leftmost leaf), pinning one page at a time. The returned leaf is
    /// still pinned; every internal page visited has been unpinned clean.
    pub(crate) fn find_leaf(
        &self,
        root_page_id: PageId,
        key: &K,
        leftmost: bool,
    ) -> Result<(PinGuard, LeafNode<K>), BTreeError> {
        let mut page_id = root_page_id;
        loop {
            let guard = PinGuard::fetch(&self.buffer_pool, page_id)?;
            match self.read_node(&guard)? {
                BTreeNode::Leaf(leaf) => return Ok((guard, leaf)),
                BTreeNode::Internal(internal) => {
                    page_id = if leftmost {
                        internal.child_at(0)
                    } else {
                        internal.lookup(key)
                    };
                    guard.release()?;
                }
            }
        }
    }

    pub(crate) fn read_node(&self, guard: &PinGuard) -> Result<BTreeNode<K>, BTreeError> {
        let page = guard.page().read();
        deserialize_node(&page, self.leaf_max_size, self.internal_max_size)
    }

    pub(crate) fn write_node(
        &self,
        guard: &mut PinGuard,
        node: &BTreeNode<K>,
    ) -> Result<(), BTreeError> {
        {
            let mut page = guard.page().write();
            serialize_node(node, &mut page)?;
        }
        guard.mark_dirty();
        Ok(())
    }

    /// Persist the current root page id under the index name in the header
    /// page: a fresh record on first creation, an overwrite afterwards.
    pub(crate) fn update_root_page_id(
        &self,
        root_page_id: PageId,
        insert_record: bool,
    ) -> Result<(), BTreeError> {
        let mut guard = PinGuard::fetch(&self.buffer_pool, HEADER_PAGE_ID)?;
        {
            let mut page = guard.page().write();
            let header = HeaderPage::new();
            if insert_record {
                header.insert_record(&mut page, &self.index_name, root_page_id)?;
            } else {
                header.update_record(&mut page, &self.index_name, root_page_id)?;
            }
        }
        guard.mark_dirty();
        guard.release()?;
        Ok(())
    }
}

impl<K> BTreeIndex<K>
where
    K: Clone
        + Ord
        + Default
        + FromInteger
        + Serialize
        + for<'de> Deserialize<'de>
        + Send
        + Sync
        + 'static,
{
    /// Test harness hook: insert one entry per whitespace-separated decimal
    /// integer in the file, synthesizing the record id from the integer.
    pub fn insert_from_file(&self, path: impl AsRef<Path>) -> Result<(), BTreeError> {
        let contents = std::fs::read_to_string(path)?;
        for token in contents.split_whitespace() {
            let value: i64 = token
                .parse()
                .map_err(|_| BTreeError::KeyFile(format!("not an integer key: {token}")))?;
            self.insert(K::from_integer(value), Rid::from_integer(value), None)?;
        }
        Ok(())
    }

    /// Test harness hook: remove one key per whitespace-separated decimal
    /// integer in the file.
    pub fn remove_from_file(&self, path: impl AsRef<Path>) -> Result<(), BTreeError> {
        let contents = std::fs::read_to_string(path)?;
        for token in contents.split_whitespace() {
            let value: i64 = token
                .parse()
                .map_err(|_| BTreeError::KeyFile(format!("not an integer key: {token}")))?;
            self.remove(&K::from_integer(value), None)?;
        }
        Ok(())
    }
}
