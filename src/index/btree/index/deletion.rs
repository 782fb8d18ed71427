use serde::{Deserialize, Serialize};

use crate::common::types::{Transaction, INVALID_PAGE_ID};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::BTreeNode;
use crate::storage::buffer::PinGuard;
use super::base::{BTreeIndex, RootState};

impl<K> BTreeIndex<K>
where
    K: Clone + Ord + Default + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static,
{
    /// Remove the entry for `key`, rebalancing as needed. Removing a key
    /// that is not present is a no-op. The transaction handle is reserved
    /// for a future lock manager and is ignored.
    pub fn remove(&self, key: &K, _txn: Option<&Transaction>) -> Result<(), BTreeError> {
        let mut state = self.root.lock();
        if state.page_id == INVALID_PAGE_ID {
            return Ok(());
        }

        let (guard, leaf) = self.find_leaf(state.page_id, key, false)?;
        self.delete_entry(&mut state, guard, BTreeNode::Leaf(leaf), key.clone())
    }

    /// Remove `key` from `node` and restore the tree invariants, walking up
    /// the parent chain as merges cascade. Takes over the caller's pin on
    /// `node` and releases it on every path.
    fn delete_entry(
        &self,
        state: &mut RootState,
        mut guard: PinGuard,
        mut node: BTreeNode<K>,
        key: K,
    ) -> Result<(), BTreeError> {
        let removed = match &mut node {
            BTreeNode::Leaf(leaf) => leaf.remove(&key),
            BTreeNode::Internal(internal) => {
                // For internal nodes the key names a separator; drop the
                // child pointer it guards.
                let child = internal.lookup(&key);
                let idx = internal
                    .value_index(child)
                    .expect("separator child must be linked");
                internal.remove_at(idx);
                true
            }
        };

        if !removed {
            // Nothing changed; the page stays clean
            guard.release()?;
            return Ok(());
        }

        if node.is_root() {
            if self.adjust_root(state, &node)? {
                let page_id = node.page_id();
                guard.mark_dirty();
                guard.release()?;
                self.buffer_pool.delete_page(page_id)?;
            } else {
                self.write_node(&mut guard, &node)?;
                guard.release()?;
            }
            return Ok(());
        }

        if node.size() >= node.min_size() {
            self.write_node(&mut guard, &node)?;
            guard.release()?;
            return Ok(());
        }

        // Underflow: rebalance against a sibling, preferring the
        // predecessor.
        let mut parent_guard = PinGuard::fetch(&self.buffer_pool, node.parent_page_id())?;
        let mut parent = match self.read_node(&parent_guard)? {
            BTreeNode::Internal(internal) => internal,
            BTreeNode::Leaf(_) => return Err(BTreeError::InvalidPageFormat),
        };

        let idx = parent
            .value_index(node.page_id())
            .expect("underflowed child must be linked in its parent");
        let sibling_idx = if idx == 0 { 1 } else { idx - 1 };
        // The separator between the pair sits at the greater of the two
        // slots.
        let middle_idx = idx.max(sibling_idx);
        let middle_key = parent.key_at(middle_idx).clone();

        let mut sibling_guard = PinGuard::fetch(&self.buffer_pool, parent.child_at(sibling_idx))?;
        let mut sibling = self.read_node(&sibling_guard)?;

        if node.size() + sibling.size() <= node.max_size() {
            // Coalesce: the left node of the pair absorbs the right one
            let (mut left, mut left_guard, mut right, mut right_guard) = if idx < sibling_idx {
                (node, guard, sibling, sibling_guard)
            } else {
                (sibling, sibling_guard, node, guard)
            };

            match (&mut left, &mut right) {
                (BTreeNode::Leaf(left), BTreeNode::Leaf(right)) => {
                    right.move_all_to(left);
                }
                (BTreeNode::Internal(left), BTreeNode::Internal(right)) => {
                    let moved = right.move_all_to(left, middle_key.clone());
                    self.reparent(&moved, left.header.page_id)?;
                }
                _ => return Err(BTreeError::InvalidPageFormat),
            }

            let right_page_id = right.page_id();
            self.write_node(&mut left_guard, &left)?;
            left_guard.release()?;
            right_guard.mark_dirty();
            right_guard.release()?;
            self.buffer_pool.delete_page(right_page_id)?;

            // The separator that guarded the emptied node comes out of the
            // parent next.
            return self.delete_entry(state, parent_guard, BTreeNode::Internal(parent), middle_key);
        }

        // Redistribute: borrow a single entry through the separator.
        let new_separator = match (&mut sibling, &mut node) {
            (BTreeNode::Leaf(sibling), BTreeNode::Leaf(node)) => {
                if sibling_idx < idx {
                    sibling.move_last_to_front_of(node);
                    node.first_key().clone()
                } else {
                    sibling.move_first_to_end_of(node);
                    sibling.first_key().clone()
                }
            }
            (BTreeNode::Internal(sibling), BTreeNode::Internal(node)) => {
                if sibling_idx < idx {
                    let rotated = sibling.move_last_to_front_of(node, &middle_key);
                    self.reparent(&[node.child_at(0)], node.header.page_id)?;
                    rotated
                } else {
                    let rotated = sibling.move_first_to_end_of(node, &middle_key);
                    let adopted = node.child_at(node.size() - 1);
                    self.reparent(&[adopted], node.header.page_id)?;
                    rotated
                }
            }
            _ => return Err(BTreeError::InvalidPageFormat),
        };
        parent.set_key_at(middle_idx, new_separator);

        self.write_node(&mut guard, &node)?;
        guard.release()?;
        self.write_node(&mut sibling_guard, &sibling)?;
        sibling_guard.release()?;
        self.write_node(&mut parent_guard, &BTreeNode::Internal(parent))?;
        parent_guard.release()?;
        Ok(())
    }

    /// Handle the root after a removal: an internal root down to a single
    /// child hands the root over to that child; an emptied leaf root
    /// empties the whole tree. Returns whether the old root page should be
    /// deleted.
    fn adjust_root(&self, state: &mut RootState, node: &BTreeNode<K>) -> Result<bool, BTreeError> {
        match node {
            BTreeNode::Internal(internal) if internal.size() == 1 => {
                state.page_id = internal.child_at(0);

                let mut child_guard = PinGuard::fetch(&self.buffer_pool, state.page_id)?;
                let mut child = self.read_node(&child_guard)?;
                child.header_mut().parent_page_id = INVALID_PAGE_ID;
                self.write_node(&mut child_guard, &child)?;
                child_guard.release()?;

                self.update_root_page_id(state.page_id, false)?;
                Ok(true)
            }
            BTreeNode::Leaf(leaf) if leaf.size() == 0 => {
                state.page_id = INVALID_PAGE_ID;
                self.update_root_page_id(state.page_id, false)?;
                log::debug!("index {}: tree emptied", self.index_name);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
