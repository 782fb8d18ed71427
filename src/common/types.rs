use std::sync::Arc;
use parking_lot::RwLock;

/// Page size in bytes (8KB)
pub const PAGE_SIZE: usize = 8192;

/// Page ID type
pub type PageId = u32;

/// Transaction ID type
pub type TxnId = u32;

/// Buffer pool frame ID type
pub type FrameId = u32;

/// Sentinel page ID denoting "no page"
pub const INVALID_PAGE_ID: PageId = 0;

/// Reserved page holding the (index name -> root page id) registry.
/// The disk manager sets this page aside when the database file is created.
pub const HEADER_PAGE_ID: PageId = 1;

/// Record ID: the location of a tuple as (page, slot)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rid {
    pub page_id: PageId,
    pub slot_num: u32,
}

impl Rid {
    pub fn new(page_id: PageId, slot_num: u32) -> Self {
        Self { page_id, slot_num }
    }

    /// Synthesize a record ID from a single integer: high half is the page,
    /// low half the slot. Used by the file-driven test helpers.
    pub fn from_integer(value: i64) -> Self {
        Self {
            page_id: (value >> 32) as PageId,
            slot_num: value as u32,
        }
    }
}

/// Opaque transaction handle accepted by the mutating index operations.
/// Reserved for a future lock manager; the index serializes everything on
/// its own mutex and does not inspect it.
#[derive(Debug, Clone, Copy)]
pub struct Transaction {
    id: TxnId,
}

impl Transaction {
    pub fn new(id: TxnId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }
}

/// Page structure
#[derive(Debug, Clone)]
pub struct Page {
    pub data: [u8; PAGE_SIZE],
    pub page_id: PageId,
}

impl Page {
    pub fn new(page_id: PageId) -> Self {
        Self {
            data: [0; PAGE_SIZE],
            page_id,
        }
    }
}

/// Smart pointer to a page
pub type PagePtr = Arc<RwLock<Page>>;

/// Buffer pool frame structure
#[derive(Debug)]
pub struct Frame {
    pub page: PagePtr,
    pub frame_id: FrameId,
    pub is_dirty: bool,
    pub pin_count: u32,
}

impl Frame {
    pub fn new(frame_id: FrameId, page: PagePtr) -> Self {
        Self {
            page,
            frame_id,
            is_dirty: false,
            pin_count: 0,
        }
    }
}

/// Smart pointer to a frame
pub type FramePtr = Arc<RwLock<Frame>>;
