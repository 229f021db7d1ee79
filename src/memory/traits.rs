/*!
 * Memory Traits
 * Heap management abstractions
 */

use super::types::*;
use crate::core::types::{Address, Size};
use std::rc::Rc;

/// Holder of a reference to a heap block
///
/// Compaction moves blocks; the registered owner of a moved block is told its
/// new address before the compactor touches the next block.
pub trait Owner {
    fn relocate(&self, new_address: Address);
}

/// Heap allocator interface
pub trait HeapAllocator {
    /// Allocate `size` bytes
    fn allocate(&mut self, size: Size) -> HeapResult<Address>;

    /// Allocate `size` bytes and register `owner` for relocation notices
    fn allocate_owned(&mut self, size: Size, owner: Rc<dyn Owner>) -> HeapResult<Address>;

    /// Release the block at `address`
    fn free(&mut self, address: Address, size: Size) -> HeapResult<()>;

    /// Resize the block at `address`, moving it if needed
    fn realloc(&mut self, address: Address, old_size: Size, new_size: Size) -> HeapResult<Address>;

    /// Check if an address is the start of a live block
    fn is_allocated(&self, address: Address) -> bool;

    /// Get the recorded size of a live block
    fn block_size(&self, address: Address) -> Option<Size>;
}

/// Heap statistics provider
pub trait HeapInfo {
    /// Get a full statistics snapshot
    fn stats(&self) -> HeapStats;

    fn capacity(&self) -> Size;

    fn free_bytes(&self) -> Size;

    fn used_bytes(&self) -> Size {
        self.capacity() - self.free_bytes()
    }

    /// Get memory pressure level
    fn pressure(&self) -> MemoryPressure {
        self.stats().memory_pressure()
    }
}

/// Compaction interface
pub trait Compactor {
    /// Move every live block down to the heap start; returns bytes reclaimed
    fn collect(&mut self) -> HeapResult<Size>;

    /// Check if a collect would reclaim anything
    fn should_collect(&self) -> bool;
}
