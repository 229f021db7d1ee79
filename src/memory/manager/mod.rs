/*!
 * Remote Heap Management
 *
 * General-purpose allocator over a remote byte-addressable device.
 *
 * ## Allocation
 *
 * - **First-fit free list**: freed ranges below the bump pointer are reused in
 *   list order, splitting over-sized matches
 * - **Bump allocation**: when no free range fits, space is carved from the
 *   untouched tail
 * - **Tail shrinking**: freeing the block that ends at the bump pointer moves
 *   the pointer down instead of creating a free range
 * - **Coalescing**: adjacent free ranges are merged on every free
 *
 * ## Compaction
 *
 * Live blocks are slid down to the heap start in address order, copied
 * through a bounded staging buffer. Every registered owner is told its new
 * address. A transport failure mid-copy leaves the heap inconsistent; there is
 * no rollback.
 *
 * ## Bookkeeping
 *
 * No in-band headers: the free list and the owner registry live in local RAM,
 * so remote memory holds nothing but application bytes.
 */

mod allocator;
mod compactor;
mod finalizing;
mod free_list;
mod registry;
mod stats;

pub use finalizing::Finalizer;
pub use registry::TrackedAddress;

use super::config::HeapConfig;
use super::traits::{Compactor, HeapAllocator, HeapInfo, Owner};
use super::types::{AllocatorMode, HeapError, HeapResult, HeapState, HeapStats};
use crate::core::types::{Address, Size};
use crate::device::RemoteMemory;
use free_list::FreeList;
use registry::OwnerRegistry;
use std::rc::Rc;
use tracing::info;

/// Heap over a remote memory device
///
/// Owns the device and all bookkeeping. Every mutating call takes `&mut self`,
/// so one logical owner drives the heap and re-entrant calls cannot compile.
pub struct Heap<D: RemoteMemory> {
    pub(super) device: D,
    pub(super) config: HeapConfig,
    pub(super) heap_start: Address,
    pub(super) heap_end: Address,
    // Boundary between touched blocks and the untouched tail
    pub(super) next_free: Address,
    pub(super) free_list: FreeList,
    pub(super) registry: OwnerRegistry,
    pub(super) state: HeapState,
    pub(super) mode: AllocatorMode,
    // Bytes abandoned by finalizing frees, reclaimed on the next compaction
    pub(super) leaked_bytes: Size,
}

impl<D: RemoteMemory> Heap<D> {
    /// Create an uninitialized heap; call [`Heap::init`] before use
    pub fn new(device: D, config: HeapConfig) -> HeapResult<Self> {
        config.validate()?;
        let heap_start = config.heap_start;
        let heap_end = config
            .heap_end()
            .ok_or_else(|| HeapError::invalid_argument("heap region overflows the address space"))?;

        if heap_end.get() > device.capacity() {
            return Err(HeapError::invalid_argument(format!(
                "heap end {} exceeds device capacity of {} bytes",
                heap_end,
                device.capacity()
            )));
        }

        Ok(Self {
            device,
            config,
            heap_start,
            heap_end,
            next_free: heap_start,
            free_list: FreeList::new(),
            registry: OwnerRegistry::new(),
            state: HeapState::Uninitialized,
            mode: AllocatorMode::Normal,
            leaked_bytes: 0,
        })
    }

    /// Reset to an empty heap
    ///
    /// Idempotent. Live blocks are forgotten without notifying their owners.
    pub fn init(&mut self) -> HeapResult<()> {
        if self.state == HeapState::Deinitialized {
            return Err(HeapError::InvalidState(self.state));
        }

        self.next_free = self.heap_start;
        self.free_list.clear();
        self.registry.clear();
        self.mode = AllocatorMode::Normal;
        self.leaked_bytes = 0;
        self.state = HeapState::Ready;

        info!(
            heap_start = %self.heap_start,
            capacity = self.config.heap_size,
            unit = self.config.unit,
            compaction = ?self.config.compaction,
            "Remote heap initialized"
        );
        Ok(())
    }

    /// Release the transport; every later call fails with InvalidState
    ///
    /// Only a Ready heap can be deinitialized.
    pub fn deinit(&mut self) -> HeapResult<()> {
        self.ensure_ready()?;

        self.device.release();
        self.free_list.clear();
        self.registry.clear();
        self.state = HeapState::Deinitialized;

        info!("Remote heap deinitialized, transport released");
        Ok(())
    }

    /// Attach `owner` to the live block at `address`, replacing any previous one
    ///
    /// The owner is immediately told the block's current address.
    pub fn register(&mut self, address: Address, owner: Rc<dyn Owner>) -> HeapResult<()> {
        self.ensure_ready()?;
        let entry = self
            .registry
            .get_mut(address)
            .ok_or_else(|| not_allocated(address))?;

        owner.relocate(address);
        entry.owner = Some(owner);
        Ok(())
    }

    /// Detach and return the owner of the live block at `address`
    pub fn unregister_owner(&mut self, address: Address) -> HeapResult<Option<Rc<dyn Owner>>> {
        self.ensure_ready()?;
        let entry = self
            .registry
            .get_mut(address)
            .ok_or_else(|| not_allocated(address))?;
        Ok(entry.owner.take())
    }

    /// Write into a live block
    ///
    /// `[address, address + data.len())` must lie inside a single block.
    pub fn write(&mut self, address: Address, data: &[u8]) -> HeapResult<()> {
        self.ensure_ready()?;
        self.check_live_range(address, data.len())?;
        self.device.write_bytes(address, data)?;
        Ok(())
    }

    /// Read `len` bytes from a live block
    pub fn read(&mut self, address: Address, len: Size) -> HeapResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(address, &mut buf)?;
        Ok(buf)
    }

    /// Fill `buf` from a live block
    pub fn read_into(&mut self, address: Address, buf: &mut [u8]) -> HeapResult<()> {
        self.ensure_ready()?;
        self.check_live_range(address, buf.len())?;
        self.device.read_bytes(address, buf)?;
        Ok(())
    }

    pub fn state(&self) -> HeapState {
        self.state
    }

    pub fn mode(&self) -> AllocatorMode {
        self.mode
    }

    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    pub fn heap_start(&self) -> Address {
        self.heap_start
    }

    /// Current bump pointer
    pub fn next_free_address(&self) -> Address {
        self.next_free
    }

    /// Raw device access, bypassing block checks
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub(super) fn ensure_ready(&self) -> HeapResult<()> {
        match self.state {
            HeapState::Ready => Ok(()),
            other => Err(HeapError::InvalidState(other)),
        }
    }

    fn check_live_range(&self, address: Address, len: Size) -> HeapResult<()> {
        match self.registry.containing(address, len) {
            Some(_) => Ok(()),
            None => Err(HeapError::invalid_argument(format!(
                "{} bytes at {} are not inside an allocated block",
                len, address
            ))),
        }
    }
}

pub(super) fn not_allocated(address: Address) -> HeapError {
    HeapError::invalid_argument(format!("{} is not an allocated block", address))
}

// Implement trait interfaces
impl<D: RemoteMemory> HeapAllocator for Heap<D> {
    fn allocate(&mut self, size: Size) -> HeapResult<Address> {
        Heap::allocate(self, size)
    }

    fn allocate_owned(&mut self, size: Size, owner: Rc<dyn Owner>) -> HeapResult<Address> {
        Heap::allocate_owned(self, size, owner)
    }

    fn free(&mut self, address: Address, size: Size) -> HeapResult<()> {
        Heap::free(self, address, size)
    }

    fn realloc(&mut self, address: Address, old_size: Size, new_size: Size) -> HeapResult<Address> {
        Heap::realloc(self, address, old_size, new_size)
    }

    fn is_allocated(&self, address: Address) -> bool {
        Heap::is_allocated(self, address)
    }

    fn block_size(&self, address: Address) -> Option<Size> {
        Heap::block_size(self, address)
    }
}

impl<D: RemoteMemory> HeapInfo for Heap<D> {
    fn stats(&self) -> HeapStats {
        Heap::stats(self)
    }

    fn capacity(&self) -> Size {
        Heap::capacity(self)
    }

    fn free_bytes(&self) -> Size {
        Heap::free_bytes(self)
    }

    fn pressure(&self) -> super::types::MemoryPressure {
        Heap::memory_pressure(self)
    }
}

impl<D: RemoteMemory> Compactor for Heap<D> {
    fn collect(&mut self) -> HeapResult<Size> {
        Heap::collect(self)
    }

    fn should_collect(&self) -> bool {
        Heap::should_collect(self)
    }
}
