/*!
 * Heap Statistics
 * Usage accounting, block listing, and invariant checks
 */

use super::Heap;
use crate::core::types::Size;
use crate::device::RemoteMemory;
use crate::memory::types::{Block, BlockState, HeapError, HeapResult, HeapStats, MemoryPressure};

impl<D: RemoteMemory> Heap<D> {
    /// Total managed bytes
    pub fn capacity(&self) -> Size {
        self.config.heap_size
    }

    /// Untouched bytes above the bump pointer
    pub fn tail_bytes(&self) -> Size {
        self.heap_end.get() - self.next_free.get()
    }

    /// Tail plus every free range
    pub fn free_bytes(&self) -> Size {
        self.tail_bytes() + self.free_list.total_bytes()
    }

    pub fn used_bytes(&self) -> Size {
        self.capacity() - self.free_bytes()
    }

    /// Live allocation count
    pub fn block_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of free-list entries
    pub fn free_block_count(&self) -> usize {
        self.free_list.len()
    }

    /// Memory pressure against the configured thresholds
    pub fn memory_pressure(&self) -> MemoryPressure {
        let ratio = self.used_bytes() as f64 / self.capacity() as f64;
        MemoryPressure::classify(
            ratio,
            self.config.medium_threshold,
            self.config.warning_threshold,
            self.config.critical_threshold,
        )
    }

    /// Get detailed heap statistics
    pub fn stats(&self) -> HeapStats {
        let used = self.used_bytes();
        HeapStats {
            capacity: self.capacity(),
            used_bytes: used,
            free_bytes: self.free_bytes(),
            tail_bytes: self.tail_bytes(),
            free_blocks: self.free_list.len(),
            largest_free_block: self.free_list.largest().max(self.tail_bytes()),
            live_blocks: self.registry.len(),
            leaked_bytes: self.leaked_bytes,
            usage_percentage: (used as f64 / self.capacity() as f64) * 100.0,
            pressure: self.memory_pressure(),
        }
    }

    /// Every block record, free and allocated, ascending by address
    pub fn blocks(&self) -> Vec<Block> {
        let mut blocks: Vec<Block> = self
            .registry
            .entries()
            .iter()
            .map(|e| Block::new(e.address, e.size, BlockState::Allocated))
            .chain(
                self.free_list
                    .iter()
                    .map(|b| Block::new(b.address, b.size, BlockState::Free)),
            )
            .collect();
        blocks.sort_by_key(|b| b.address);
        blocks
    }

    /// Check the structural invariants of the block table
    ///
    /// - the bump pointer lies inside the heap
    /// - blocks are non-empty, disjoint, and below the bump pointer
    /// - blocks plus leaked bytes exactly cover the touched prefix
    /// - no two free ranges touch, and none touches the tail
    pub fn verify(&self) -> HeapResult<()> {
        if self.next_free < self.heap_start || self.next_free > self.heap_end {
            return Err(HeapError::corrupted(format!(
                "bump pointer {} outside heap [{}, {})",
                self.next_free, self.heap_start, self.heap_end
            )));
        }

        let blocks = self.blocks();
        let mut covered: Size = 0;

        for (i, block) in blocks.iter().enumerate() {
            if block.size == 0 {
                return Err(HeapError::corrupted(format!("empty block at {}", block.address)));
            }
            if block.address < self.heap_start || block.end() > self.next_free {
                return Err(HeapError::corrupted(format!(
                    "{:?} block at {} (+{}) outside touched prefix [{}, {})",
                    block.state, block.address, block.size, self.heap_start, self.next_free
                )));
            }
            if let Some(next) = blocks.get(i + 1) {
                if block.end() > next.address {
                    return Err(HeapError::corrupted(format!(
                        "blocks at {} and {} overlap",
                        block.address, next.address
                    )));
                }
                if block.state == BlockState::Free
                    && next.state == BlockState::Free
                    && block.end() == next.address
                {
                    return Err(HeapError::corrupted(format!(
                        "adjacent free ranges at {} and {} were not coalesced",
                        block.address, next.address
                    )));
                }
            }
            if block.state == BlockState::Free && block.end() == self.next_free {
                return Err(HeapError::corrupted(format!(
                    "free range at {} touches the tail",
                    block.address
                )));
            }
            covered += block.size;
        }

        let touched = self.next_free.get() - self.heap_start.get();
        if covered + self.leaked_bytes != touched {
            return Err(HeapError::corrupted(format!(
                "blocks cover {} bytes plus {} leaked, touched prefix is {}",
                covered, self.leaked_bytes, touched
            )));
        }
        Ok(())
    }
}
