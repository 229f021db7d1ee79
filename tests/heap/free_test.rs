/*!
 * Free Tests
 * Tail shrinking, coalescing, and validation of frees
 */

use crate::common::{addr, explicit_heap, heap_with, pattern};
use pretty_assertions::assert_eq;
use remote_heap::{
    Address, CompactionPolicy, Heap, HeapConfig, HeapError, InMemoryDevice, Owner, TrackedAddress,
};
use std::rc::Rc;

#[test]
fn test_lifo_free_never_touches_free_list() {
    let mut heap = explicit_heap(1024);
    let blocks: Vec<_> = [100, 40, 7, 300]
        .iter()
        .map(|&size| (heap.allocate(size).unwrap(), size))
        .collect();

    for &(address, size) in blocks.iter().rev() {
        heap.free(address, size).unwrap();
        assert_eq!(heap.free_block_count(), 0);
        assert_eq!(heap.next_free_address(), address);
    }

    assert_eq!(heap.free_bytes(), heap.capacity());
    assert_eq!(heap.block_count(), 0);
}

#[test]
fn test_general_free_coalesces_neighbours() {
    let mut heap = explicit_heap(1024);
    let a = heap.allocate(100).unwrap();
    let b = heap.allocate(100).unwrap();
    let c = heap.allocate(100).unwrap();
    let _d = heap.allocate(100).unwrap();

    heap.free(a, 100).unwrap();
    heap.free(c, 100).unwrap();
    assert_eq!(heap.free_block_count(), 2);

    // Freeing the middle block merges all three ranges
    heap.free(b, 100).unwrap();
    assert_eq!(heap.free_block_count(), 1);
    assert_eq!(heap.free_bytes(), 1024 - 400 + 300);
    heap.verify().unwrap();

    let free: Vec<_> = heap.blocks().into_iter().filter(|b| !b.is_allocated()).collect();
    assert_eq!(free.len(), 1);
    assert_eq!(free[0].address, addr(0));
    assert_eq!(free[0].size, 300);
}

#[test]
fn test_tail_free_folds_exposed_range() {
    let mut heap = explicit_heap(1024);
    let _a = heap.allocate(100).unwrap();
    let b = heap.allocate(100).unwrap();
    let c = heap.allocate(100).unwrap();

    heap.free(b, 100).unwrap();
    assert_eq!(heap.free_block_count(), 1);

    // Shrinking the tail past c exposes b's range, which folds in too
    heap.free(c, 100).unwrap();
    assert_eq!(heap.free_block_count(), 0);
    assert_eq!(heap.next_free_address(), addr(100));
    heap.verify().unwrap();
}

#[test]
fn test_tail_free_folds_merged_prefix() {
    let mut heap = explicit_heap(1024);
    let a = heap.allocate(100).unwrap();
    let b = heap.allocate(100).unwrap();
    let c = heap.allocate(100).unwrap();

    heap.free(a, 100).unwrap();
    heap.free(b, 100).unwrap();
    assert_eq!(heap.free_block_count(), 1);

    heap.free(c, 100).unwrap();
    assert_eq!(heap.free_block_count(), 0);
    assert_eq!(heap.next_free_address(), addr(0));
}

#[test]
fn test_free_compacts_under_on_free_policy() {
    let mut heap = heap_with(1024, CompactionPolicy::OnFree);
    let data = pattern(9, 200);

    let a = heap.allocate(100).unwrap();
    let handle = Rc::new(TrackedAddress::default());
    let owner: Rc<dyn Owner> = handle.clone();
    let b = heap.allocate_owned(200, owner).unwrap();
    assert_eq!(handle.get(), b);
    heap.write(b, &data).unwrap();

    heap.free(a, 100).unwrap();

    assert_eq!(handle.get(), addr(0));
    assert_eq!(heap.free_block_count(), 0);
    assert_eq!(heap.next_free_address(), addr(200));
    assert_eq!(heap.read(handle.get(), 200).unwrap(), data);
}

#[test]
fn test_zero_length_free_is_noop() {
    let mut heap = explicit_heap(1024);
    let a = heap.allocate(10).unwrap();

    heap.free(a, 0).unwrap();
    assert!(heap.is_allocated(a));

    // Even for addresses that were never allocated
    heap.free(addr(512), 0).unwrap();
}

#[test]
fn test_invalid_free() {
    let mut heap = explicit_heap(1024);
    let a = heap.allocate(10).unwrap();

    let not_live = heap.free(addr(5), 10);
    assert!(matches!(not_live, Err(HeapError::InvalidArgument(_))));

    let too_big = heap.free(a, 11);
    assert!(matches!(too_big, Err(HeapError::InvalidArgument(_))));
    assert!(heap.is_allocated(a));

    heap.free(a, 10).unwrap();
    let double_free = heap.free(a, 10);
    assert!(matches!(double_free, Err(HeapError::InvalidArgument(_))));
}

#[test]
fn test_conservation_across_frees() {
    let mut heap = explicit_heap(2048);
    let mut live = Vec::new();
    for size in [13, 200, 64, 7, 512, 90] {
        live.push((heap.allocate(size).unwrap(), size));
        assert_eq!(heap.used_bytes() + heap.free_bytes(), heap.capacity());
    }

    for idx in [1, 4, 0, 5, 2, 3] {
        let (address, size) = live[idx];
        heap.free(address, size).unwrap();
        assert_eq!(heap.used_bytes() + heap.free_bytes(), heap.capacity());
        heap.verify().unwrap();
    }
    assert_eq!(heap.used_bytes(), 0);
}

#[test]
fn test_null_free_is_noop_when_heap_starts_above_zero() {
    let config = HeapConfig::new(Address::new(0x1000), 512).with_unit(1);
    let mut heap = Heap::new(InMemoryDevice::new(0x1000 + 512), config).unwrap();
    heap.init().unwrap();
    let a = heap.allocate(10).unwrap();

    heap.free(Address::NULL, 10).unwrap();

    assert!(heap.is_allocated(a));
    assert_eq!(heap.block_count(), 1);
    assert_eq!(heap.next_free_address(), addr(0x100a));
    assert!(matches!(heap.realloc(Address::NULL, 10, 20), Err(HeapError::InvalidArgument(_))));
}

#[test]
fn test_address_zero_is_a_real_block_when_heap_starts_at_zero() {
    let mut heap = explicit_heap(1024);

    assert!(matches!(heap.free(Address::NULL, 10), Err(HeapError::InvalidArgument(_))));

    let a = heap.allocate(10).unwrap();
    assert_eq!(a, Address::NULL);
    heap.free(Address::NULL, 10).unwrap();
    assert!(!heap.is_allocated(a));
}
