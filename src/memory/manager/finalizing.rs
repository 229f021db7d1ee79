/*!
 * Finalizing Mode
 *
 * Narrowed heap view for owner teardown paths that must not grow bookkeeping
 */

use super::Heap;
use crate::core::types::{Address, Size};
use crate::device::RemoteMemory;
use crate::memory::types::{AllocatorMode, HeapResult};
use tracing::{debug, warn};

/// Heap in Finalizing mode
///
/// Holds the heap's only mutable borrow, so nothing but teardown-safe frees
/// can run until it is dropped. Each free either shrinks the tail or leaks the
/// block until the next `collect()`; it never creates a free-list entry and
/// never compacts.
///
/// # Example
///
/// ```ignore
/// {
///     let mut fin = heap.finalizing()?;
///     for (address, size) in dying_objects {
///         fin.free(address, size)?;
///     }
/// } // back to Normal mode
/// heap.collect()?;
/// ```
pub struct Finalizer<'h, D: RemoteMemory> {
    heap: &'h mut Heap<D>,
    leaked_at_entry: Size,
}

impl<D: RemoteMemory> Heap<D> {
    /// Enter Finalizing mode until the returned guard is dropped
    pub fn finalizing(&mut self) -> HeapResult<Finalizer<'_, D>> {
        self.ensure_ready()?;
        self.mode = AllocatorMode::Finalizing;
        debug!("Entered finalizing mode");

        let leaked_at_entry = self.leaked_bytes;
        Ok(Finalizer {
            heap: self,
            leaked_at_entry,
        })
    }

    /// Bytes abandoned by finalizing frees since the last compaction
    pub fn leaked_bytes(&self) -> Size {
        self.leaked_bytes
    }
}

impl<D: RemoteMemory> Finalizer<'_, D> {
    /// Release a block without growing bookkeeping
    pub fn free(&mut self, address: Address, size: Size) -> HeapResult<()> {
        match self.heap.validate_free(address, size)? {
            Some(recorded) => self.heap.release_block(address, recorded),
            None => Ok(()),
        }
    }

    pub fn mode(&self) -> AllocatorMode {
        self.heap.mode
    }

    pub fn is_allocated(&self, address: Address) -> bool {
        self.heap.is_allocated(address)
    }

    pub fn leaked_bytes(&self) -> Size {
        self.heap.leaked_bytes
    }

    pub fn free_bytes(&self) -> Size {
        self.heap.free_bytes()
    }
}

impl<D: RemoteMemory> Drop for Finalizer<'_, D> {
    fn drop(&mut self) {
        self.heap.mode = AllocatorMode::Normal;

        let leaked = self.heap.leaked_bytes - self.leaked_at_entry;
        if leaked > 0 {
            warn!(
                leaked,
                total_leaked = self.heap.leaked_bytes,
                "Finalization leaked bytes; call collect() to reclaim"
            );
        } else {
            debug!("Left finalizing mode");
        }
    }
}
