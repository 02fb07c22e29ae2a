pub mod catalog;
pub mod memory;
pub mod table;

pub use catalog::Catalog;
pub use memory::{MemoryStore, StoreStats};
pub use table::Table;
