pub mod error;
pub mod index;
pub mod key;
pub mod node;
pub mod serialization;

pub use error::BTreeError;
pub use index::{BTreeIndex, BTreeIterator};
pub use key::{FromInteger, GenericKey};
pub use node::{BTreeNode, InternalNode, LeafNode, NodeHeader};
pub use serialization::{deserialize_node, serialize_node};
