/*!
 * Remote Heap Demo - Main Entry Point
 *
 * Drives a fragmenting workload against an in-memory device:
 * - Allocates a mix of owned blocks
 * - Frees every other block to splinter the heap
 * - Compacts and verifies every owner still sees its data
 */

use remote_heap::{
    init_tracing, CompactionPolicy, Heap, HeapConfig, InMemoryDevice, Owner, TrackedAddress,
};
use std::error::Error;
use std::rc::Rc;
use tracing::{info, warn};

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    info!("Remote heap demo starting...");

    let config = HeapConfig::from_env()?.with_compaction(CompactionPolicy::Explicit);
    let device_size = config
        .heap_end()
        .ok_or("heap region overflows the address space")?
        .get();
    info!(
        heap_start = %config.heap_start,
        heap_size = config.heap_size,
        "Creating in-memory device of {} bytes",
        device_size
    );

    let mut heap = Heap::new(InMemoryDevice::new(device_size), config)?;
    heap.init()?;

    // Allocate owned blocks, each stamped with its index
    let mut handles: Vec<(Rc<TrackedAddress>, usize)> = Vec::new();
    for i in 0..64usize {
        let size = 32 + (i % 7) * 48;
        let handle = Rc::new(TrackedAddress::default());
        let owner: Rc<dyn Owner> = handle.clone();
        match heap.allocate_owned(size, owner) {
            Ok(address) => {
                heap.write(address, &vec![i as u8; size])?;
                handles.push((handle, size));
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "Heap full, stopping allocation phase");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    // Free every other block to fragment the heap
    let mut survivors = Vec::new();
    for (i, (handle, size)) in handles.into_iter().enumerate() {
        if i % 2 == 0 {
            heap.free(handle.get(), size)?;
        } else {
            survivors.push((i, handle, size));
        }
    }

    let before = heap.stats();
    let before_json = serde_json::to_string(&before)?;
    info!(stats = %before_json, "Heap before compaction");

    let reclaimed = heap.collect()?;
    heap.verify()?;

    // Every survivor must still see its own stamp at its new address
    for (i, handle, size) in &survivors {
        let bytes = heap.read(handle.get(), *size)?;
        if bytes.iter().any(|b| *b != *i as u8) {
            return Err(format!("block {} corrupted after compaction", i).into());
        }
    }

    let after = heap.stats();
    let after_json = serde_json::to_string(&after)?;
    info!(
        reclaimed,
        fragmentation_before = before.fragmentation(),
        fragmentation_after = after.fragmentation(),
        stats = %after_json,
        "Heap after compaction"
    );
    info!(transfers = ?heap.device().stats(), "Device transfer counters");

    heap.deinit()?;
    info!("Remote heap demo complete");
    Ok(())
}
