use serde::{Deserialize, Serialize};

use crate::common::types::{PageId, Rid, Transaction, INVALID_PAGE_ID};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::{BTreeNode, InternalNode, LeafNode};
use crate::storage::buffer::PinGuard;
use super::base::{BTreeIndex, RootState};

impl<K> BTreeIndex<K>
where
    K: Clone + Ord + Default + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static,
{
    /// Insert a key/value pair. Returns false if the key already exists
    /// (unique-key constraint). The transaction handle is reserved for a
    /// future lock manager and is ignored.
    pub fn insert(&self, key: K, rid: Rid, _txn: Option<&Transaction>) -> Result<bool, BTreeError> {
        let mut state = self.root.lock();
        if state.page_id == INVALID_PAGE_ID {
            self.start_new_tree(&mut state, key, rid)?;
            return Ok(true);
        }
        self.insert_into_leaf(&mut state, key, rid)
    }

    /// Allocate the first leaf, make it the root, and register the root id
    /// in the header page.
    fn start_new_tree(&self, state: &mut RootState, key: K, rid: Rid) -> Result<(), BTreeError> {
        let mut guard = PinGuard::allocate(&self.buffer_pool)?;
        log::debug!(
            "index {}: starting new tree at page {}",
            self.index_name,
            guard.page_id()
        );

        let mut leaf = LeafNode::new(guard.page_id(), INVALID_PAGE_ID, self.leaf_max_size);
        leaf.insert(key, rid);

        state.page_id = guard.page_id();
        let insert_record = !state.registered;
        self.update_root_page_id(state.page_id, insert_record)?;
        state.registered = true;

        self.write_node(&mut guard, &BTreeNode::Leaf(leaf))?;
        guard.release()?;
        Ok(())
    }

    /// Insert into the leaf responsible for `key`, splitting on overflow.
    fn insert_into_leaf(
        &self,
        state: &mut RootState,
        key: K,
        rid: Rid,
    ) -> Result<bool, BTreeError> {
        let (mut guard, mut leaf) = self.find_leaf(state.page_id, &key, false)?;

        if !leaf.insert(key, rid) {
            log::debug!("index {}: duplicate key rejected", self.index_name);
            guard.release()?;
            return Ok(false);
        }

        let mut node = BTreeNode::Leaf(leaf);
        if node.size() >= self.leaf_max_size {
            self.split(state, &mut node, &mut guard)?;
        } else {
            self.write_node(&mut guard, &node)?;
        }
        guard.release()?;
        Ok(true)
    }

    /// Split an overflowed node: allocate a right sibling of the same kind,
    /// move the upper half of the entries across, and push the sibling's
    /// first key into the parent.
    ///
    /// On return, `node`'s final bytes are on its page. `node`'s in-memory
    /// parent pointer may be stale after a cascading parent split; the
    /// page is authoritative and must not be rewritten from `node`.
    pub(crate) fn split(
        &self,
        state: &mut RootState,
        node: &mut BTreeNode<K>,
        node_guard: &mut PinGuard,
    ) -> Result<(), BTreeError> {
        debug_assert!(node.size() >= node.max_size());

        let mut right_guard = PinGuard::allocate(&self.buffer_pool)?;
        let right_page_id = right_guard.page_id();

        let (mut right, push_up_key) = match node {
            BTreeNode::Leaf(leaf) => {
                let mut right =
                    LeafNode::new(right_page_id, leaf.header.parent_page_id, self.leaf_max_size);
                leaf.move_half_to(&mut right);
                // Splice the new leaf into the chain
                right.next_leaf_page_id = leaf.next_leaf_page_id;
                leaf.next_leaf_page_id = right_page_id;
                let push_up_key = right.first_key().clone();
                (BTreeNode::Leaf(right), push_up_key)
            }
            BTreeNode::Internal(internal) => {
                let mut right = InternalNode::new(
                    right_page_id,
                    internal.header.parent_page_id,
                    self.internal_max_size,
                );
                let moved = internal.move_half_to(&mut right);
                self.reparent(&moved, right_page_id)?;
                let push_up_key = right.key_at(0).clone();
                (BTreeNode::Internal(right), push_up_key)
            }
        };

        // Both halves hit their pages before the parent is touched, so a
        // cascading parent split observes current child contents.
        self.write_node(&mut right_guard, &right)?;
        self.write_node(node_guard, node)?;

        self.insert_into_parent(state, node, push_up_key, &mut right, node_guard, &mut right_guard)?;
        right_guard.release()?;
        Ok(())
    }

    /// Register a freshly split-off right sibling with the parent of the
    /// pair, growing a new root when `left` was the root.
    fn insert_into_parent(
        &self,
        state: &mut RootState,
        left: &mut BTreeNode<K>,
        key: K,
        right: &mut BTreeNode<K>,
        left_guard: &mut PinGuard,
        right_guard: &mut PinGuard,
    ) -> Result<(), BTreeError> {
        if left.is_root() {
            // The root itself overflowed; grow the tree by one level
            let mut root_guard = PinGuard::allocate(&self.buffer_pool)?;
            let new_root_id = root_guard.page_id();

            let mut new_root =
                InternalNode::new(new_root_id, INVALID_PAGE_ID, self.internal_max_size);
            new_root.populate_new_root(left.page_id(), key, right.page_id());

            left.header_mut().parent_page_id = new_root_id;
            right.header_mut().parent_page_id = new_root_id;
            self.write_node(left_guard, left)?;
            self.write_node(right_guard, right)?;

            state.page_id = new_root_id;
            self.update_root_page_id(state.page_id, false)?;

            self.write_node(&mut root_guard, &BTreeNode::Internal(new_root))?;
            root_guard.release()?;
            return Ok(());
        }

        let mut parent_guard = PinGuard::fetch(&self.buffer_pool, left.parent_page_id())?;
        let mut parent = match self.read_node(&parent_guard)? {
            BTreeNode::Internal(internal) => internal,
            BTreeNode::Leaf(_) => return Err(BTreeError::InvalidPageFormat),
        };

        parent.insert_node_after(left.page_id(), key, right.page_id());

        let mut parent_node = BTreeNode::Internal(parent);
        if parent_node.size() >= self.internal_max_size {
            self.split(state, &mut parent_node, &mut parent_guard)?;
        } else {
            self.write_node(&mut parent_guard, &parent_node)?;
        }
        parent_guard.release()?;
        Ok(())
    }

    /// Rewrite the parent pointer of each child page through the buffer
    /// pool. Used whenever children change owners (splits, merges,
    /// borrows).
    pub(crate) fn reparent(
        &self,
        children: &[PageId],
        new_parent: PageId,
    ) -> Result<(), BTreeError> {
        for &child_id in children {
            let mut guard = PinGuard::fetch(&self.buffer_pool, child_id)?;
            let mut child = self.read_node(&guard)?;
            child.header_mut().parent_page_id = new_parent;
            self.write_node(&mut guard, &child)?;
            guard.release()?;
        }
        Ok(())
    }
}
