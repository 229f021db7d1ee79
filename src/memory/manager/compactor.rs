/*!
 * Heap Compaction
 * Slides live blocks to the heap start and notifies their owners
 */

use super::Heap;
use crate::core::types::{Address, Size};
use crate::device::RemoteMemory;
use crate::memory::types::HeapResult;
use crate::monitoring::HeapSpan;
use tracing::{debug, info};

impl<D: RemoteMemory> Heap<D> {
    /// Compact the heap; returns the summed distance moved by relocated blocks
    ///
    /// Blocks are visited in ascending address order, so each destination
    /// lies at or below its source and a low-to-high copy never clobbers
    /// unread bytes. Afterwards all free space is the single tail region.
    ///
    /// Not atomic: a transport failure mid-copy returns the error with the
    /// heap partially compacted and its block table no longer trustworthy.
    pub fn collect(&mut self) -> HeapResult<Size> {
        self.compact()
    }

    /// Check if a collect would reclaim anything
    pub fn should_collect(&self) -> bool {
        !self.free_list.is_empty() || self.leaked_bytes > 0
    }

    pub(super) fn compact(&mut self) -> HeapResult<Size> {
        self.ensure_ready()?;
        let span = HeapSpan::new("compact", self.registry.len(), self.free_list.len());
        let _entered = span.enter();

        let result = self.slide_blocks();
        span.record_result(result.is_ok());
        result
    }

    fn slide_blocks(&mut self) -> HeapResult<Size> {
        self.registry.sort_by_address();

        let mut staging = vec![0u8; self.config.staging_chunk];
        let mut target = self.heap_start;
        let mut reclaimed: Size = 0;
        let mut moved = 0usize;

        for idx in 0..self.registry.len() {
            let (address, size) = {
                let entry = &self.registry.entries()[idx];
                (entry.address, entry.size)
            };
            debug_assert!(target <= address, "compaction target overtook a live block");

            if address != target {
                self.copy_range(address, target, size, &mut staging)?;
                self.registry.relocate(idx, target);
                reclaimed += address.distance_from(target).unwrap_or(0);
                moved += 1;
                debug!(from = %address, to = %target, size, "Relocated block");
            }
            target = Address::new(target.get() + size);
        }

        let dropped_ranges = self.free_list.len();
        self.next_free = target;
        self.free_list.clear();
        self.leaked_bytes = 0;

        info!(
            moved_blocks = moved,
            live_blocks = self.registry.len(),
            dropped_free_ranges = dropped_ranges,
            reclaimed,
            next_free = %self.next_free,
            "Compaction complete"
        );
        Ok(reclaimed)
    }

    /// Copy `len` bytes from `src` to `dst` low-to-high through `staging`
    ///
    /// Safe for overlapping ranges only when `dst <= src`.
    pub(super) fn copy_range(
        &mut self,
        src: Address,
        dst: Address,
        len: Size,
        staging: &mut [u8],
    ) -> HeapResult<()> {
        debug_assert!(!staging.is_empty(), "staging buffer must be non-empty");
        let chunk = staging.len();
        let mut done = 0;

        while done < len {
            let n = chunk.min(len - done);
            let buf = &mut staging[..n];
            self.device.read_bytes(Address::new(src.get() + done), buf)?;
            self.device.write_bytes(Address::new(dst.get() + done), buf)?;
            done += n;
        }
        Ok(())
    }
}
