// Export public modules
pub mod common;
pub mod index;
pub mod storage;

// Re-export key items for convenient access
pub use index::btree::{BTreeError, BTreeIndex, BTreeIterator};
pub use storage::buffer::{BufferPoolError, BufferPoolManager, PinGuard};
pub use storage::page::{HeaderPage, PageError};
