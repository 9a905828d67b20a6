/*!
 * Memory Module
 * Flat and paging allocators, the backing store, and the memory manager facade
 */

pub mod backing_store;
pub mod flat;
pub mod manager;
pub mod paging;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use backing_store::BackingStore;
pub use flat::FlatAllocator;
pub use manager::MemoryManager;
pub use paging::PagingAllocator;
pub use traits::*;
pub use types::*;
