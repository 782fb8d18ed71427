use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use parking_lot::RwLock;

use crate::common::types::{Frame, FrameId, FramePtr, Page, PageId, PagePtr, INVALID_PAGE_ID};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::buffer::replacer::LRUReplacer;
use crate::storage::disk::DiskManager;

/// The buffer pool caches disk pages in a fixed set of frames. Every page a
/// caller holds must be pinned; a pinned frame is never evicted. Unpinning
/// with the dirty flag schedules the page for write-back on eviction.
pub struct BufferPoolManager {
    pool_size: usize,
    frames: Vec<FramePtr>,
    page_table: RwLock<HashMap<PageId, FrameId>>,
    free_list: RwLock<VecDeque<FrameId>>,
    replacer: RwLock<LRUReplacer>,
    disk_manager: Arc<DiskManager>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, db_path: impl AsRef<Path>) -> Result<Self, BufferPoolError> {
        let disk_manager = Arc::new(DiskManager::new(db_path)?);
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = i as FrameId;
            let frame = Frame::new(frame_id, Arc::new(RwLock::new(Page::new(INVALID_PAGE_ID))));
            frames.push(Arc::new(RwLock::new(frame)));
            free_list.push_back(frame_id);
        }

        Ok(Self {
            pool_size,
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: RwLock::new(free_list),
            replacer: RwLock::new(LRUReplacer::new(pool_size)),
            disk_manager,
        })
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Fetch a page, pinning it. The caller must unpin it exactly once.
    pub fn fetch_page(&self, page_id: PageId) -> Result<PagePtr, BufferPoolError> {
        if page_id == INVALID_PAGE_ID {
            return Err(BufferPoolError::InvalidOperation(
                "Cannot fetch invalid page ID".to_string(),
            ));
        }

        // Already resident: pin and return
        if let Some(&frame_id) = self.page_table.read().get(&page_id) {
            let frame = &self.frames[frame_id as usize];
            let (page, newly_pinned) = {
                let mut frame_guard = frame.write();
                frame_guard.pin_count += 1;
                (frame_guard.page.clone(), frame_guard.pin_count == 1)
            };
            if newly_pinned {
                // No longer an eviction candidate
                self.replacer.write().remove(frame_id);
            }
            return Ok(page);
        }

        // Not resident: claim a frame and load from disk
        let frame_id = self.allocate_frame()?;

        let mut new_page = Page::new(page_id);
        self.disk_manager.read_page(page_id, &mut new_page)?;

        let frame = &self.frames[frame_id as usize];
        let page = {
            let mut frame_guard = frame.write();
            {
                let mut page_guard = frame_guard.page.write();
                *page_guard = new_page;
            }
            frame_guard.pin_count = 1;
            frame_guard.is_dirty = false;
            frame_guard.page.clone()
        };

        self.page_table.write().insert(page_id, frame_id);

        Ok(page)
    }

    /// Allocate a brand-new page on disk and pin it in a frame. The page is
    /// born dirty so it reaches disk even if the caller never writes it.
    pub fn new_page(&self) -> Result<(PagePtr, PageId), BufferPoolError> {
        let page_id = self.disk_manager.allocate_page()?;
        let frame_id = self.allocate_frame()?;

        let frame = &self.frames[frame_id as usize];
        let page = {
            let mut frame_guard = frame.write();
            {
                let mut page_guard = frame_guard.page.write();
                *page_guard = Page::new(page_id);
            }
            frame_guard.pin_count = 1;
            frame_guard.is_dirty = true;
            frame_guard.page.clone()
        };

        self.page_table.write().insert(page_id, frame_id);

        Ok((page, page_id))
    }

    /// Unpin a page, optionally marking it dirty. Must be called exactly
    /// once per successful fetch or allocation.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<(), BufferPoolError> {
        let frame_id = self.frame_of(page_id)?;

        let frame = &self.frames[frame_id as usize];
        let now_evictable = {
            let mut frame_guard = frame.write();

            if frame_guard.pin_count == 0 {
                return Err(BufferPoolError::InvalidOperation(format!(
                    "Page {} is not pinned",
                    page_id
                )));
            }

            frame_guard.pin_count -= 1;
            if is_dirty {
                frame_guard.is_dirty = true;
            }
            frame_guard.pin_count == 0
        };

        if now_evictable {
            self.replacer.write().record_access(frame_id);
        }

        Ok(())
    }

    /// Flush a specific page to disk if it is dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        let frame_id = self.frame_of(page_id)?;

        let frame = &self.frames[frame_id as usize];
        let page_copy = {
            let frame_guard = frame.read();
            if !frame_guard.is_dirty {
                return Ok(());
            }
            let page_guard = frame_guard.page.read();
            page_guard.clone()
        };

        self.disk_manager.write_page(&page_copy)?;
        frame.write().is_dirty = false;

        Ok(())
    }

    /// Flush every resident page to disk.
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let page_ids: Vec<PageId> = self.page_table.read().keys().copied().collect();
        for page_id in page_ids {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Drop a page from the pool. The page must be unpinned; the caller is
    /// responsible for having unlinked it from any on-disk structure first.
    pub fn delete_page(&self, page_id: PageId) -> Result<(), BufferPoolError> {
        if page_id == INVALID_PAGE_ID {
            return Err(BufferPoolError::InvalidOperation(
                "Cannot delete invalid page ID".to_string(),
            ));
        }

        let frame_id_opt = self.page_table.write().remove(&page_id);

        if let Some(frame_id) = frame_id_opt {
            let frame = &self.frames[frame_id as usize];
            let mut frame_guard = frame.write();

            if frame_guard.pin_count > 0 {
                // Put the mapping back; the page stays resident
                self.page_table.write().insert(page_id, frame_id);
                return Err(BufferPoolError::PagePinned(page_id));
            }

            {
                let mut page_guard = frame_guard.page.write();
                *page_guard = Page::new(INVALID_PAGE_ID);
            }
            frame_guard.is_dirty = false;

            drop(frame_guard);
            self.replacer.write().remove(frame_id);
            self.free_list.write().push_back(frame_id);
        }

        // The disk-side slot is not reclaimed; a freelist is future work for
        // the disk manager.

        Ok(())
    }

    /// Pin count of a resident page. Returns None if the page is not in the
    /// pool. Exposed so tests can audit pin accounting.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let frame_id = *self.page_table.read().get(&page_id)?;
        Some(self.frames[frame_id as usize].read().pin_count)
    }

    /// Number of frames currently holding a pinned page. A quiesced caller
    /// should always observe zero.
    pub fn pinned_page_count(&self) -> usize {
        self.frames
            .iter()
            .filter(|frame| frame.read().pin_count > 0)
            .count()
    }

    fn frame_of(&self, page_id: PageId) -> Result<FrameId, BufferPoolError> {
        match self.page_table.read().get(&page_id) {
            Some(&frame_id) => Ok(frame_id),
            None => Err(BufferPoolError::PageNotFound(page_id)),
        }
    }

    /// Claim a frame from the free list, or evict the least recently used
    /// unpinned page, flushing it first if dirty.
    fn allocate_frame(&self) -> Result<FrameId, BufferPoolError> {
        if let Some(frame_id) = self.free_list.write().pop_front() {
            return Ok(frame_id);
        }

        let victim_id = match self.replacer.write().victim() {
            Some(id) => id,
            None => return Err(BufferPoolError::BufferPoolFull),
        };

        let frame = &self.frames[victim_id as usize];
        let (victim_page_id, dirty_page) = {
            let frame_guard = frame.read();
            debug_assert_eq!(frame_guard.pin_count, 0, "replacer produced a pinned victim");
            let page_guard = frame_guard.page.read();
            let dirty_page = frame_guard.is_dirty.then(|| page_guard.clone());
            (page_guard.page_id, dirty_page)
        };

        if let Some(page) = dirty_page {
            self.disk_manager.write_page(&page)?;
            frame.write().is_dirty = false;
        }

        if victim_page_id != INVALID_PAGE_ID {
            self.page_table.write().remove(&victim_page_id);
        }

        Ok(victim_id)
    }
}
