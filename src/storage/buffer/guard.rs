use std::sync::Arc;

use crate::common::types::{PageId, PagePtr};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::manager::BufferPoolManager;

/// Scoped wrapper around a pinned page.
///
/// Each guard owns exactly one pin and gives it back exactly once: either
/// through `release`, which surfaces unpin errors, or on drop, so early
/// returns and `?` propagation cannot leak a pin. The dirty flag travels
/// with the guard; `mark_dirty` must be called whenever the page bytes are
/// mutated.
pub struct PinGuard {
    buffer_pool: Arc<BufferPoolManager>,
    page: PagePtr,
    page_id: PageId,
    dirty: bool,
    released: bool,
}

impl PinGuard {
    /// Fetch and pin an existing page.
    pub fn fetch(
        buffer_pool: &Arc<BufferPoolManager>,
        page_id: PageId,
    ) -> Result<Self, BufferPoolError> {
        let page = buffer_pool.fetch_page(page_id)?;
        Ok(Self {
            buffer_pool: Arc::clone(buffer_pool),
            page,
            page_id,
            dirty: false,
            released: false,
        })
    }

    /// Allocate and pin a brand-new page. New pages are born dirty.
    pub fn allocate(buffer_pool: &Arc<BufferPoolManager>) -> Result<Self, BufferPoolError> {
        let (page, page_id) = buffer_pool.new_page()?;
        Ok(Self {
            buffer_pool: Arc::clone(buffer_pool),
            page,
            page_id,
            dirty: true,
            released: false,
        })
    }

    pub fn page(&self) -> &PagePtr {
        &self.page
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Record that the page bytes were mutated under this pin.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Unpin the page with the recorded dirty flag, surfacing any error.
    pub fn release(mut self) -> Result<(), BufferPoolError> {
        self.released = true;
        self.buffer_pool.unpin_page(self.page_id, self.dirty)
    }
}

impl Drop for PinGuard {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.buffer_pool.unpin_page(self.page_id, self.dirty) {
                log::warn!("failed to unpin page {} on drop: {}", self.page_id, e);
            }
        }
    }
}
