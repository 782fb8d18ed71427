use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::{Page, PageId, PAGE_SIZE};
use crate::storage::page::error::PageError;

/// Maximum length of an index name stored in the header page.
pub const MAX_NAME_LEN: usize = 32;

const RECORD_COUNT_SIZE: usize = 4;
const RECORD_SIZE: usize = MAX_NAME_LEN + 4; // name + root page id
const MAX_RECORDS: usize = (PAGE_SIZE - RECORD_COUNT_SIZE) / RECORD_SIZE;

/// Accessor for the reserved header page, which persists one
/// `(index_name, root_page_id)` record per index.
///
/// Layout: a `u32` record count followed by fixed-size records, each a
/// zero-padded name of `MAX_NAME_LEN` bytes and a `u32` root page id.
/// The methods operate on a caller-pinned `Page`; the caller owns the
/// pin/unpin and the dirty flag.
pub struct HeaderPage;

impl HeaderPage {
    pub fn new() -> Self {
        Self
    }

    /// Root page id registered under `name`, if any.
    pub fn get_record(&self, page: &Page, name: &str) -> Option<PageId> {
        let slot = self.find_slot(page, name)?;
        let offset = Self::record_offset(slot);
        Some(LittleEndian::read_u32(
            &page.data[offset + MAX_NAME_LEN..offset + RECORD_SIZE],
        ))
    }

    /// Append a new record. Fails if the name is already registered or the
    /// page is out of record slots.
    pub fn insert_record(
        &self,
        page: &mut Page,
        name: &str,
        root_page_id: PageId,
    ) -> Result<(), PageError> {
        let name_bytes = Self::encode_name(name)?;

        if self.find_slot(page, name).is_some() {
            return Err(PageError::DuplicateRecord);
        }

        let count = self.record_count(page);
        if count as usize >= MAX_RECORDS {
            return Err(PageError::InsufficientSpace);
        }

        let offset = Self::record_offset(count as usize);
        page.data[offset..offset + MAX_NAME_LEN].copy_from_slice(&name_bytes);
        LittleEndian::write_u32(
            &mut page.data[offset + MAX_NAME_LEN..offset + RECORD_SIZE],
            root_page_id,
        );
        LittleEndian::write_u32(&mut page.data[0..RECORD_COUNT_SIZE], count + 1);

        Ok(())
    }

    /// Overwrite the root page id of an existing record.
    pub fn update_record(
        &self,
        page: &mut Page,
        name: &str,
        root_page_id: PageId,
    ) -> Result<(), PageError> {
        let slot = match self.find_slot(page, name) {
            Some(slot) => slot,
            None => return Err(PageError::RecordNotFound),
        };

        let offset = Self::record_offset(slot);
        LittleEndian::write_u32(
            &mut page.data[offset + MAX_NAME_LEN..offset + RECORD_SIZE],
            root_page_id,
        );

        Ok(())
    }

    pub fn record_count(&self, page: &Page) -> u32 {
        LittleEndian::read_u32(&page.data[0..RECORD_COUNT_SIZE])
    }

    fn find_slot(&self, page: &Page, name: &str) -> Option<usize> {
        let name_bytes = Self::encode_name(name).ok()?;
        let count = self.record_count(page) as usize;

        (0..count.min(MAX_RECORDS)).find(|&slot| {
            let offset = Self::record_offset(slot);
            page.data[offset..offset + MAX_NAME_LEN] == name_bytes
        })
    }

    fn record_offset(slot: usize) -> usize {
        RECORD_COUNT_SIZE + slot * RECORD_SIZE
    }

    fn encode_name(name: &str) -> Result<[u8; MAX_NAME_LEN], PageError> {
        let bytes = name.as_bytes();
        if bytes.len() > MAX_NAME_LEN {
            return Err(PageError::NameTooLong(MAX_NAME_LEN));
        }
        let mut encoded = [0u8; MAX_NAME_LEN];
        encoded[..bytes.len()].copy_from_slice(bytes);
        Ok(encoded)
    }
}

impl Default for HeaderPage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::HEADER_PAGE_ID;

    #[test]
    fn test_insert_and_get_record() {
        let mut page = Page::new(HEADER_PAGE_ID);
        let header = HeaderPage::new();

        header.insert_record(&mut page, "orders_pk", 7).unwrap();
        header.insert_record(&mut page, "users_pk", 12).unwrap();

        assert_eq!(header.get_record(&page, "orders_pk"), Some(7));
        assert_eq!(header.get_record(&page, "users_pk"), Some(12));
        assert_eq!(header.get_record(&page, "missing"), None);
        assert_eq!(header.record_count(&page), 2);
    }

    #[test]
    fn test_update_record() {
        let mut page = Page::new(HEADER_PAGE_ID);
        let header = HeaderPage::new();

        header.insert_record(&mut page, "orders_pk", 7).unwrap();
        header.update_record(&mut page, "orders_pk", 42).unwrap();

        assert_eq!(header.get_record(&page, "orders_pk"), Some(42));
        assert_eq!(header.record_count(&page), 1);
    }

    #[test]
    fn test_update_missing_record_fails() {
        let mut page = Page::new(HEADER_PAGE_ID);
        let header = HeaderPage::new();

        assert!(matches!(
            header.update_record(&mut page, "missing", 1),
            Err(PageError::RecordNotFound)
        ));
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let mut page = Page::new(HEADER_PAGE_ID);
        let header = HeaderPage::new();

        header.insert_record(&mut page, "orders_pk", 7).unwrap();
        assert!(matches!(
            header.insert_record(&mut page, "orders_pk", 8),
            Err(PageError::DuplicateRecord)
        ));
    }

    #[test]
    fn test_name_too_long() {
        let mut page = Page::new(HEADER_PAGE_ID);
        let header = HeaderPage::new();
        let long_name = "x".repeat(MAX_NAME_LEN + 1);

        assert!(matches!(
            header.insert_record(&mut page, &long_name, 1),
            Err(PageError::NameTooLong(_))
        ));
    }
}
