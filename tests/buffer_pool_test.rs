use anyhow::Result;

use brambledb::storage::buffer::{BufferPoolError, PinGuard};

mod common;
use common::create_test_buffer_pool;

#[test]
fn test_new_page() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(10)?;

    let (page, page_id) = buffer_pool.new_page()?;

    // Page 1 is the reserved header page, so allocations start above it
    assert!(page_id > 1);

    {
        let page_guard = page.read();
        assert_eq!(page_guard.page_id, page_id);
    }

    buffer_pool.unpin_page(page_id, false)?;

    Ok(())
}

#[test]
fn test_fetch_page() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(10)?;

    let (_, page_id) = buffer_pool.new_page()?;
    buffer_pool.unpin_page(page_id, false)?;

    let fetched_page = buffer_pool.fetch_page(page_id)?;

    {
        let page_guard = fetched_page.read();
        assert_eq!(page_guard.page_id, page_id);
    }

    buffer_pool.unpin_page(page_id, false)?;

    Ok(())
}

#[test]
fn test_page_modification_persists() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(10)?;

    let (page, page_id) = buffer_pool.new_page()?;

    {
        let mut page_guard = page.write();
        let test_data = b"Test Data";
        page_guard.data[100..100 + test_data.len()].copy_from_slice(test_data);
    }

    buffer_pool.unpin_page(page_id, true)?;

    let fetched_page = buffer_pool.fetch_page(page_id)?;
    {
        let page_guard = fetched_page.read();
        assert_eq!(&page_guard.data[100..109], b"Test Data");
    }
    buffer_pool.unpin_page(page_id, false)?;

    Ok(())
}

#[test]
fn test_eviction_round_trips_through_disk() -> Result<()> {
    // Three frames, five pages: the early pages must be evicted
    let (buffer_pool, _temp_file) = create_test_buffer_pool(3)?;

    let mut page_ids = Vec::new();
    for i in 0..5u8 {
        let (page, page_id) = buffer_pool.new_page()?;
        {
            let mut page_guard = page.write();
            page_guard.data[0] = i;
        }
        buffer_pool.unpin_page(page_id, true)?;
        page_ids.push(page_id);
    }

    // The first page was evicted and written back; fetch reloads it
    let page = buffer_pool.fetch_page(page_ids[0])?;
    {
        let page_guard = page.read();
        assert_eq!(page_guard.data[0], 0);
    }
    buffer_pool.unpin_page(page_ids[0], false)?;

    Ok(())
}

#[test]
fn test_full_pool_of_pinned_pages() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(3)?;

    let mut page_ids = Vec::new();
    for _ in 0..3 {
        let (_, page_id) = buffer_pool.new_page()?;
        page_ids.push(page_id);
    }

    // Every frame is pinned; there is nothing to evict
    assert!(matches!(
        buffer_pool.new_page(),
        Err(BufferPoolError::BufferPoolFull)
    ));

    // Releasing one pin frees a frame for the next allocation
    buffer_pool.unpin_page(page_ids[0], false)?;
    let (_, page_id) = buffer_pool.new_page()?;
    buffer_pool.unpin_page(page_id, false)?;

    for &page_id in &page_ids[1..] {
        buffer_pool.unpin_page(page_id, false)?;
    }

    Ok(())
}

#[test]
fn test_delete_page() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(10)?;

    let (_, page_id) = buffer_pool.new_page()?;

    // Pinned pages cannot be deleted
    assert!(matches!(
        buffer_pool.delete_page(page_id),
        Err(BufferPoolError::PagePinned(_))
    ));

    buffer_pool.unpin_page(page_id, false)?;
    buffer_pool.delete_page(page_id)?;

    assert_eq!(buffer_pool.pin_count(page_id), None);

    Ok(())
}

#[test]
fn test_pin_accounting() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(10)?;

    let (_, page_id) = buffer_pool.new_page()?;
    assert_eq!(buffer_pool.pin_count(page_id), Some(1));

    buffer_pool.fetch_page(page_id)?;
    assert_eq!(buffer_pool.pin_count(page_id), Some(2));

    buffer_pool.unpin_page(page_id, false)?;
    buffer_pool.unpin_page(page_id, false)?;
    assert_eq!(buffer_pool.pin_count(page_id), Some(0));
    assert_eq!(buffer_pool.pinned_page_count(), 0);

    // A third unpin has no pin to give back
    assert!(buffer_pool.unpin_page(page_id, false).is_err());

    Ok(())
}

#[test]
fn test_pin_guard_releases_on_drop() -> Result<()> {
    let (buffer_pool, _temp_file) = create_test_buffer_pool(10)?;

    let (_, page_id) = buffer_pool.new_page()?;
    buffer_pool.unpin_page(page_id, false)?;

    {
        let _guard = PinGuard::fetch(&buffer_pool, page_id)?;
        assert_eq!(buffer_pool.pin_count(page_id), Some(1));
    }
    assert_eq!(buffer_pool.pin_count(page_id), Some(0));

    let guard = PinGuard::fetch(&buffer_pool, page_id)?;
    guard.release()?;
    assert_eq!(buffer_pool.pin_count(page_id), Some(0));

    Ok(())
}
