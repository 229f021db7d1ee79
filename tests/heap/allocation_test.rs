/*!
 * Allocation Tests
 * First-fit reuse, bump allocation, rounding, and OOM handling
 */

use crate::common::{addr, explicit_heap, pattern};
use pretty_assertions::assert_eq;
use remote_heap::{Address, Heap, HeapConfig, HeapError, InMemoryDevice, RemoteMemory};

#[test]
fn test_bump_allocation_is_contiguous() {
    let mut heap = explicit_heap(1024);

    let a = heap.allocate(100).unwrap();
    let b = heap.allocate(200).unwrap();
    let c = heap.allocate(1).unwrap();

    assert_eq!(a, addr(0));
    assert_eq!(b, addr(100));
    assert_eq!(c, addr(300));
    assert_eq!(heap.next_free_address(), addr(301));
    assert_eq!(heap.block_count(), 3);
    assert_eq!(heap.used_bytes(), 301);
}

#[test]
fn test_sizes_round_up_to_transport_unit() {
    let config = HeapConfig::new(Address::new(0), 1024).with_unit(4);
    let mut heap = Heap::new(InMemoryDevice::new(1024), config).unwrap();
    heap.init().unwrap();

    let a = heap.allocate(50).unwrap();
    let b = heap.allocate(1).unwrap();

    assert_eq!(heap.block_size(a), Some(52));
    assert_eq!(b, addr(52));
    assert_eq!(heap.block_size(b), Some(4));
    assert_eq!(heap.next_free_address(), addr(56));
}

#[test]
fn test_first_fit_reuses_freed_range() {
    let mut heap = explicit_heap(1024);

    let a = heap.allocate(100).unwrap();
    let _b = heap.allocate(200).unwrap();
    heap.free(a, 100).unwrap();

    let c = heap.allocate(50).unwrap();
    assert_eq!(c, addr(0));
    // The 50-byte remainder stays on the free list
    assert_eq!(heap.free_block_count(), 1);
    assert_eq!(heap.free_bytes(), 1024 - 300 + 50);

    // Too large for the hole, so it comes from the tail
    let d = heap.allocate(60).unwrap();
    assert_eq!(d, addr(300));
    assert_eq!(heap.free_block_count(), 1);
}

#[test]
fn test_exact_fit_consumes_free_range() {
    let mut heap = explicit_heap(1024);

    let a = heap.allocate(64).unwrap();
    let _b = heap.allocate(64).unwrap();
    heap.free(a, 64).unwrap();
    assert_eq!(heap.free_block_count(), 1);

    assert_eq!(heap.allocate(64).unwrap(), a);
    assert_eq!(heap.free_block_count(), 0);
}

#[test]
fn test_zero_size_allocation_rejected() {
    let mut heap = explicit_heap(1024);

    let result = heap.allocate(0);
    assert!(matches!(result, Err(HeapError::InvalidArgument(_))));
    assert_eq!(heap.block_count(), 0);
}

#[test]
fn test_out_of_memory() {
    let mut heap = explicit_heap(256);
    heap.allocate(200).unwrap();

    match heap.allocate(100) {
        Err(err @ HeapError::OutOfMemory { .. }) => {
            assert!(err.is_recoverable());
            assert_eq!(
                err,
                HeapError::OutOfMemory {
                    requested: 100,
                    tail_available: 56,
                    free_bytes: 56,
                    capacity: 256,
                }
            );
        }
        other => panic!("Expected OutOfMemory error, got {:?}", other),
    }

    // Nothing changed
    assert_eq!(heap.block_count(), 1);
    assert_eq!(heap.next_free_address(), addr(200));
}

#[test]
fn test_oom_recovers_after_free() {
    let mut heap = explicit_heap(256);
    let a = heap.allocate(200).unwrap();
    assert!(heap.allocate(100).is_err());

    heap.free(a, 200).unwrap();
    assert_eq!(heap.allocate(100).unwrap(), addr(0));
}

#[test]
fn test_round_trip_through_device() {
    let mut heap = explicit_heap(1024);
    let data = pattern(7, 300);

    let a = heap.allocate(data.len()).unwrap();
    heap.device_mut().write_bytes(a, &data).unwrap();

    assert_eq!(heap.device_mut().read_vec(a, data.len()).unwrap(), data);
}

#[test]
fn test_round_trip_full_capacity() {
    let mut heap = explicit_heap(512);
    let data = pattern(3, 512);

    let a = heap.allocate(512).unwrap();
    heap.write(a, &data).unwrap();

    assert_eq!(heap.read(a, 512).unwrap(), data);
    assert_eq!(heap.free_bytes(), 0);
}

#[test]
fn test_checked_access_stays_inside_block() {
    let mut heap = explicit_heap(1024);
    let a = heap.allocate(16).unwrap();
    let b = heap.allocate(16).unwrap();

    // Interior access is fine
    heap.write(addr(4), b"abcd").unwrap();
    assert_eq!(heap.read(addr(4), 4).unwrap(), b"abcd");

    // Straddling two blocks is not
    let straddle = heap.write(addr(12), &[0u8; 8]);
    assert!(matches!(straddle, Err(HeapError::InvalidArgument(_))));

    heap.free(b, 16).unwrap();
    assert!(heap.read(b, 1).is_err());
    assert!(heap.is_allocated(a));
}

#[test]
fn test_memory_pressure_follows_usage() {
    use remote_heap::MemoryPressure;

    let mut heap = explicit_heap(100);
    assert_eq!(heap.memory_pressure(), MemoryPressure::Low);

    heap.allocate(60).unwrap();
    assert_eq!(heap.memory_pressure(), MemoryPressure::Medium);

    heap.allocate(20).unwrap();
    assert_eq!(heap.memory_pressure(), MemoryPressure::High);

    heap.allocate(15).unwrap();
    assert_eq!(heap.memory_pressure(), MemoryPressure::Critical);
    assert_eq!(heap.stats().memory_pressure(), MemoryPressure::Critical);
}
