/*!
 * Heap Allocator Implementation
 * Allocation, deallocation, and reallocation logic
 */

use super::free_list::FreeBlock;
use super::registry::BlockId;
use super::{not_allocated, Heap};
use crate::core::types::{round_up, Address, Size};
use crate::device::RemoteMemory;
use crate::memory::config::CompactionPolicy;
use crate::memory::traits::Owner;
use crate::memory::types::{AllocatorMode, HeapError, HeapResult, MemoryPressure};
use std::rc::Rc;
use tracing::{debug, error, warn};

impl<D: RemoteMemory> Heap<D> {
    /// Allocate `size` bytes, rounded up to the transport unit
    ///
    /// Reuses the first free range that fits, otherwise bump-allocates from
    /// the tail. Never compacts on failure: callers free and/or `collect()`
    /// and retry.
    pub fn allocate(&mut self, size: Size) -> HeapResult<Address> {
        self.allocate_block(size, None).map(|(address, _)| address)
    }

    /// Allocate and register `owner`, which is told the block's address
    pub fn allocate_owned(&mut self, size: Size, owner: Rc<dyn Owner>) -> HeapResult<Address> {
        let (address, _) = self.allocate_block(size, Some(owner.clone()))?;
        owner.relocate(address);
        Ok(address)
    }

    /// Release the block at `address`
    ///
    /// `size` may be smaller than the recorded block size but never larger;
    /// the whole block is released. A zero size is a no-op, as is the null
    /// address when the heap does not start at 0. Freeing the block
    /// at the top of the heap shrinks the tail without touching the free
    /// list; otherwise the range is coalesced into the free list and, under
    /// [`CompactionPolicy::OnFree`], the heap is compacted.
    pub fn free(&mut self, address: Address, size: Size) -> HeapResult<()> {
        self.ensure_ready()?;
        match self.validate_free(address, size)? {
            Some(recorded) => self.release_block(address, recorded),
            None => Ok(()),
        }
    }

    /// Resize the block at `address`
    ///
    /// Shrinking, or growing within the rounding slack, is a no-op. A block
    /// at the top of the heap grows in place when the tail has room.
    /// Otherwise the contents move to a new block, the old block is freed, and
    /// its owner (if any) follows the data. If the free compacts and the
    /// transport fails, the owner has already been told about the new block.
    pub fn realloc(&mut self, address: Address, old_size: Size, new_size: Size) -> HeapResult<Address> {
        self.ensure_ready()?;
        if new_size == 0 {
            return Err(HeapError::invalid_argument("realloc to zero bytes"));
        }
        let current = self
            .validate_free(address, old_size)?
            .ok_or_else(|| HeapError::invalid_argument("realloc of a null address or zero old size"))?;
        let wanted = self.round(new_size)?;

        if wanted <= current {
            debug!(address = %address, current, wanted, "Realloc fits in place");
            return Ok(address);
        }

        let at_tail = address.get() + current == self.next_free.get();
        if at_tail && wanted - current <= self.tail_bytes() {
            self.next_free = Address::new(address.get() + wanted);
            if let Some(entry) = self.registry.get_mut(address) {
                entry.size = wanted;
            }
            debug!(address = %address, current, wanted, "Realloc grew tail block in place");
            return Ok(address);
        }

        let (new_address, id) = self.allocate_block(wanted, None)?;
        let mut staging = vec![0u8; self.config.staging_chunk.min(current)];
        if let Err(e) = self.copy_range(address, new_address, current, &mut staging) {
            self.discard_block(new_address, wanted);
            return Err(e);
        }

        // Attach the owner to the new block first; the release may compact
        if let Some(owner) = self.registry.get_mut(address).and_then(|e| e.owner.take()) {
            owner.relocate(new_address);
            if let Some(entry) = self.registry.get_mut(new_address) {
                entry.owner = Some(owner);
            }
        }
        self.release_block(address, current)?;

        // The release may have compacted and moved the new block
        let final_address = self.registry.address_of(id).ok_or_else(|| {
            HeapError::corrupted(format!("reallocated block {} vanished from the registry", id))
        })?;

        debug!(from = %address, to = %final_address, current, wanted, "Realloc moved block");
        Ok(final_address)
    }

    /// Check if an address is the start of a live block
    pub fn is_allocated(&self, address: Address) -> bool {
        self.registry.get(address).is_some()
    }

    /// Get the recorded size of a live block
    pub fn block_size(&self, address: Address) -> Option<Size> {
        self.registry.get(address).map(|e| e.size)
    }

    pub(super) fn allocate_block(
        &mut self,
        size: Size,
        owner: Option<Rc<dyn Owner>>,
    ) -> HeapResult<(Address, BlockId)> {
        self.ensure_ready()?;
        if size == 0 {
            return Err(HeapError::invalid_argument("zero-size allocation"));
        }
        let size = self.round(size)?;

        let address = match self.free_list.take_first_fit(size) {
            Some(address) => {
                debug!(address = %address, size, "Recycled free range");
                address
            }
            None => self.bump(size)?,
        };

        let id = self.registry.register(address, size, owner);
        self.log_allocation(address, size);
        Ok((address, id))
    }

    /// Return a validated block to the heap
    ///
    /// In Finalizing mode only the tail shrink is attempted; anything else is
    /// leaked until the next compaction so no bookkeeping grows.
    pub(super) fn release_block(&mut self, address: Address, size: Size) -> HeapResult<()> {
        self.registry.unregister(address);

        if self.shrink_tail(address, size) {
            debug!(address = %address, size, next_free = %self.next_free, "Freed block at tail");
            return Ok(());
        }

        match self.mode {
            AllocatorMode::Finalizing => {
                self.leaked_bytes += size;
                warn!(
                    address = %address,
                    size,
                    leaked_bytes = self.leaked_bytes,
                    "Finalizing free away from tail, block leaked until next collect"
                );
                Ok(())
            }
            AllocatorMode::Normal => {
                let merged = self.free_list.insert_coalesced(FreeBlock::new(address, size));
                debug!(
                    address = %address,
                    size,
                    merged_address = %merged.address,
                    merged_size = merged.size,
                    free_ranges = self.free_list.len(),
                    "Freed block into free list"
                );
                if self.config.compaction == CompactionPolicy::OnFree {
                    self.compact()?;
                }
                Ok(())
            }
        }
    }

    /// Resolve the size to release for `address`
    ///
    /// `None` for a no-op: a zero size, or the null address of a heap that
    /// does not start at 0.
    pub(super) fn validate_free(&self, address: Address, size: Size) -> HeapResult<Option<Size>> {
        if size == 0 || (address.is_null() && address < self.heap_start) {
            return Ok(None);
        }
        let requested = self.round(size)?;
        let entry = self.registry.get(address).ok_or_else(|| not_allocated(address))?;

        if requested > entry.size {
            return Err(HeapError::invalid_argument(format!(
                "{} bytes exceed the {}-byte block at {}",
                requested, entry.size, address
            )));
        }
        Ok(Some(entry.size))
    }

    /// Move the bump pointer down if `[address, address + size)` ends at it,
    /// folding in any free range exposed underneath
    pub(super) fn shrink_tail(&mut self, address: Address, size: Size) -> bool {
        if address.get() + size != self.next_free.get() {
            return false;
        }
        self.next_free = address;
        while let Some(exposed) = self.free_list.take_ending_at(self.next_free) {
            self.next_free = exposed.address;
        }
        true
    }

    /// Undo an allocation whose contents never became valid
    fn discard_block(&mut self, address: Address, size: Size) {
        self.registry.unregister(address);
        if !self.shrink_tail(address, size) {
            self.free_list.insert_coalesced(FreeBlock::new(address, size));
        }
    }

    fn bump(&mut self, size: Size) -> HeapResult<Address> {
        if size > self.tail_bytes() {
            let err = self.out_of_memory(size);
            error!(
                requested = size,
                tail_available = self.tail_bytes(),
                free_bytes = self.free_bytes(),
                capacity = self.capacity(),
                "OOM: no free range or tail space fits the request"
            );
            return Err(err);
        }
        let address = self.next_free;
        self.next_free = Address::new(address.get() + size);
        Ok(address)
    }

    fn round(&self, size: Size) -> HeapResult<Size> {
        round_up(size, self.config.unit).ok_or_else(|| self.out_of_memory(size))
    }

    fn out_of_memory(&self, requested: Size) -> HeapError {
        HeapError::OutOfMemory {
            requested,
            tail_available: self.tail_bytes(),
            free_bytes: self.free_bytes(),
            capacity: self.capacity(),
        }
    }

    fn log_allocation(&self, address: Address, size: Size) {
        let level = self.memory_pressure();
        if level >= MemoryPressure::Medium {
            warn!(
                pressure = %level,
                address = %address,
                size,
                used = self.used_bytes(),
                capacity = self.capacity(),
                "Memory pressure {}: allocated {} bytes at {}",
                level,
                size,
                address
            );
        } else {
            debug!(address = %address, size, "Allocated block");
        }
    }
}
