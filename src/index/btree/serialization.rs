use std::any::TypeId;
use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::common::types::{Page, Rid, PAGE_SIZE};
use crate::index::btree::error::BTreeError;
use crate::index::btree::node::{BTreeNode, InternalNode, LeafNode, NodeHeader};

// On-page node layout (little-endian):
// - is_leaf: u8 (1 byte)
// - size: u16 (2 bytes; leaf entries or internal pointers)
// - parent_page_id: u32 (4 bytes)
// - next_leaf_page_id: u32 (4 bytes; 0 for internal nodes)
// - values_offset: u16 (2 bytes; where values/children start)
const HEADER_SIZE: usize = 13;

const IS_LEAF_OFFSET: usize = 0;
const SIZE_OFFSET: usize = 1;
const PARENT_OFFSET: usize = 3;
const NEXT_LEAF_OFFSET: usize = 7;
const VALUES_OFFSET_OFFSET: usize = 11;

const RID_SIZE: usize = 8;

/// Serialize a node into a page buffer.
pub fn serialize_node<K>(node: &BTreeNode<K>, page: &mut Page) -> Result<(), BTreeError>
where
    K: Serialize + Clone + Ord + Default + 'static,
{
    page.data.fill(0);

    let (is_leaf, size, parent_page_id, next_leaf, keys) = match node {
        BTreeNode::Leaf(leaf) => (
            true,
            leaf.size(),
            leaf.header.parent_page_id,
            leaf.next_leaf_page_id,
            &leaf.keys,
        ),
        BTreeNode::Internal(internal) => {
            debug_assert_eq!(internal.keys.len(), internal.children.len());
            (
                false,
                internal.size(),
                internal.header.parent_page_id,
                0,
                &internal.keys,
            )
        }
    };

    page.data[IS_LEAF_OFFSET] = if is_leaf { 1 } else { 0 };
    LittleEndian::write_u16(&mut page.data[SIZE_OFFSET..SIZE_OFFSET + 2], size as u16);
    LittleEndian::write_u32(&mut page.data[PARENT_OFFSET..PARENT_OFFSET + 4], parent_page_id);
    LittleEndian::write_u32(&mut page.data[NEXT_LEAF_OFFSET..NEXT_LEAF_OFFSET + 4], next_leaf);

    // Serialize the keys
    let mut offset = HEADER_SIZE;

    // Special case for i32 keys to avoid bincode overhead
    if TypeId::of::<K>() == TypeId::of::<i32>() {
        let keys = unsafe { &*(keys.as_slice() as *const [K] as *const [i32]) };
        for &key in keys {
            if offset + 4 > PAGE_SIZE {
                return Err(BTreeError::NodeTooLarge);
            }
            LittleEndian::write_i32(&mut page.data[offset..offset + 4], key);
            offset += 4;
        }
    } else {
        for key in keys {
            let key_bytes = bincode::serialize(key)
                .map_err(|_| BTreeError::SerializationError("Failed to serialize key".to_string()))?;

            if offset + key_bytes.len() + 2 > PAGE_SIZE {
                return Err(BTreeError::NodeTooLarge);
            }

            LittleEndian::write_u16(&mut page.data[offset..offset + 2], key_bytes.len() as u16);
            offset += 2;

            page.data[offset..offset + key_bytes.len()].copy_from_slice(&key_bytes);
            offset += key_bytes.len();
        }
    }

    // Record where the values/children section starts
    let values_offset = offset;
    LittleEndian::write_u16(
        &mut page.data[VALUES_OFFSET_OFFSET..VALUES_OFFSET_OFFSET + 2],
        values_offset as u16,
    );

    match node {
        BTreeNode::Leaf(leaf) => {
            for value in &leaf.values {
                if offset + RID_SIZE > PAGE_SIZE {
                    return Err(BTreeError::NodeTooLarge);
                }
                LittleEndian::write_u32(&mut page.data[offset..offset + 4], value.page_id);
                LittleEndian::write_u32(&mut page.data[offset + 4..offset + 8], value.slot_num);
                offset += RID_SIZE;
            }
        }
        BTreeNode::Internal(internal) => {
            for &child in &internal.children {
                if offset + 4 > PAGE_SIZE {
                    return Err(BTreeError::NodeTooLarge);
                }
                LittleEndian::write_u32(&mut page.data[offset..offset + 4], child);
                offset += 4;
            }
        }
    }

    Ok(())
}

/// Deserialize a node from a page buffer. The fan-out limits are runtime
/// configuration, not persisted, so the caller supplies them.
pub fn deserialize_node<K>(
    page: &Page,
    leaf_max_size: usize,
    internal_max_size: usize,
) -> Result<BTreeNode<K>, BTreeError>
where
    K: for<'de> Deserialize<'de> + Clone + Ord + 'static,
{
    let is_leaf = page.data[IS_LEAF_OFFSET] == 1;
    let size = LittleEndian::read_u16(&page.data[SIZE_OFFSET..SIZE_OFFSET + 2]) as usize;
    let parent_page_id = LittleEndian::read_u32(&page.data[PARENT_OFFSET..PARENT_OFFSET + 4]);
    let next_leaf = LittleEndian::read_u32(&page.data[NEXT_LEAF_OFFSET..NEXT_LEAF_OFFSET + 4]);
    let values_offset =
        LittleEndian::read_u16(&page.data[VALUES_OFFSET_OFFSET..VALUES_OFFSET_OFFSET + 2]) as usize;

    // Read the keys
    let mut offset = HEADER_SIZE;
    let mut keys = Vec::with_capacity(size);

    // Special case for i32 keys to avoid bincode overhead
    if TypeId::of::<K>() == TypeId::of::<i32>() {
        for _ in 0..size {
            let key_value = LittleEndian::read_i32(&page.data[offset..offset + 4]);
            // Safety: the TypeId check above guarantees K is i32
            let key = unsafe { std::mem::transmute_copy::<i32, K>(&key_value) };
            keys.push(key);
            offset += 4;
        }
    } else {
        for _ in 0..size {
            let key_len = LittleEndian::read_u16(&page.data[offset..offset + 2]) as usize;
            offset += 2;

            if offset + key_len > PAGE_SIZE {
                return Err(BTreeError::DeserializationError(
                    "Key runs past the end of the page".to_string(),
                ));
            }

            let key = bincode::deserialize(&page.data[offset..offset + key_len]).map_err(|_| {
                BTreeError::DeserializationError("Failed to deserialize key".to_string())
            })?;
            keys.push(key);
            offset += key_len;
        }
    }

    let mut offset = values_offset;

    if is_leaf {
        let mut values = Vec::with_capacity(size);
        for _ in 0..size {
            let page_id = LittleEndian::read_u32(&page.data[offset..offset + 4]);
            let slot_num = LittleEndian::read_u32(&page.data[offset + 4..offset + 8]);
            values.push(Rid::new(page_id, slot_num));
            offset += RID_SIZE;
        }

        Ok(BTreeNode::Leaf(LeafNode {
            header: NodeHeader::new(page.page_id, parent_page_id, leaf_max_size),
            keys,
            values,
            next_leaf_page_id: next_leaf,
        }))
    } else {
        let mut children = Vec::with_capacity(size);
        for _ in 0..size {
            children.push(LittleEndian::read_u32(&page.data[offset..offset + 4]));
            offset += 4;
        }

        Ok(BTreeNode::Internal(InternalNode {
            header: NodeHeader::new(page.page_id, parent_page_id, internal_max_size),
            keys,
            children,
        }))
    }
}
