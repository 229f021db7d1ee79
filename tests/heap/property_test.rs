/*!
 * Property Tests
 * Random allocate/free/realloc/collect sequences against the heap invariants
 */

use crate::common::pattern;
use proptest::prelude::*;
use proptest::sample::Index;
use remote_heap::{
    Address, CompactionPolicy, Heap, HeapConfig, InMemoryDevice, Owner, TrackedAddress,
};
use std::rc::Rc;

const HEAP_SIZE: usize = 4096;

#[derive(Debug, Clone)]
enum Op {
    Alloc(usize),
    Free(Index),
    Realloc(Index, usize),
    Collect,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (1usize..=256).prop_map(Op::Alloc),
        3 => any::<Index>().prop_map(Op::Free),
        2 => (any::<Index>(), 1usize..=384).prop_map(|(i, s)| Op::Realloc(i, s)),
        1 => Just(Op::Collect),
    ]
}

fn policy_strategy() -> impl Strategy<Value = CompactionPolicy> {
    prop_oneof![Just(CompactionPolicy::OnFree), Just(CompactionPolicy::Explicit)]
}

struct Live {
    handle: Rc<TrackedAddress>,
    size: usize,
    seed: u8,
}

fn new_heap(policy: CompactionPolicy) -> Heap<InMemoryDevice> {
    let config = HeapConfig::new(Address::new(0), HEAP_SIZE)
        .with_unit(4)
        .with_staging_chunk(64)
        .with_compaction(policy);
    let mut heap = Heap::new(InMemoryDevice::new(HEAP_SIZE), config).unwrap();
    heap.init().unwrap();
    heap
}

fn check_heap(heap: &mut Heap<InMemoryDevice>, live: &[Live]) -> Result<(), TestCaseError> {
    prop_assert!(heap.verify().is_ok(), "verify failed: {:?}", heap.verify());
    prop_assert_eq!(heap.used_bytes() + heap.free_bytes(), heap.capacity());
    prop_assert_eq!(heap.block_count(), live.len());

    for block in live {
        let address = block.handle.get();
        prop_assert!(heap.is_allocated(address));
        let bytes = heap.read(address, block.size).unwrap();
        prop_assert_eq!(bytes, pattern(block.seed, block.size));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_random_operations_preserve_invariants(
        policy in policy_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..64),
    ) {
        let mut heap = new_heap(policy);
        let mut live: Vec<Live> = Vec::new();
        let mut next_seed: u8 = 0;

        for op in ops {
            match op {
                Op::Alloc(size) => {
                    let handle = Rc::new(TrackedAddress::default());
                    let owner: Rc<dyn Owner> = handle.clone();
                    match heap.allocate_owned(size, owner) {
                        Ok(address) => {
                            prop_assert_eq!(handle.get(), address);
                            next_seed = next_seed.wrapping_add(1);
                            heap.write(address, &pattern(next_seed, size)).unwrap();
                            live.push(Live { handle, size, seed: next_seed });
                        }
                        Err(e) => prop_assert!(e.is_recoverable()),
                    }
                }
                Op::Free(index) => {
                    if live.is_empty() {
                        continue;
                    }
                    let block = live.swap_remove(index.index(live.len()));
                    heap.free(block.handle.get(), block.size).unwrap();
                }
                Op::Realloc(index, new_size) => {
                    if live.is_empty() {
                        continue;
                    }
                    let i = index.index(live.len());
                    let old_address = live[i].handle.get();
                    match heap.realloc(old_address, live[i].size, new_size) {
                        Ok(address) => {
                            prop_assert_eq!(live[i].handle.get(), address);
                            let kept = live[i].size.min(new_size);
                            let prefix = heap.read(address, kept).unwrap();
                            prop_assert_eq!(prefix, pattern(live[i].seed, kept));

                            next_seed = next_seed.wrapping_add(1);
                            heap.write(address, &pattern(next_seed, new_size)).unwrap();
                            live[i].size = new_size;
                            live[i].seed = next_seed;
                        }
                        Err(e) => {
                            prop_assert!(e.is_recoverable());
                            prop_assert_eq!(live[i].handle.get(), old_address);
                        }
                    }
                }
                Op::Collect => {
                    heap.collect().unwrap();
                    prop_assert_eq!(heap.free_block_count(), 0);
                    prop_assert!(!heap.should_collect());
                }
            }
            check_heap(&mut heap, &live)?;
        }
    }

    #[test]
    fn prop_compaction_keeps_address_order(
        sizes in prop::collection::vec(1usize..=128, 2..24),
        freed in prop::collection::vec(any::<bool>(), 24),
    ) {
        let mut heap = new_heap(CompactionPolicy::Explicit);
        let mut live = Vec::new();

        for (i, &size) in sizes.iter().enumerate() {
            let handle = Rc::new(TrackedAddress::default());
            let owner: Rc<dyn Owner> = handle.clone();
            let address = heap.allocate_owned(size, owner).unwrap();
            heap.write(address, &pattern(i as u8, size)).unwrap();
            if freed[i] {
                heap.free(address, size).unwrap();
            } else {
                live.push(Live { handle, size, seed: i as u8 });
            }
        }

        let before: Vec<Address> = live.iter().map(|b| b.handle.get()).collect();
        heap.collect().unwrap();
        let after: Vec<Address> = live.iter().map(|b| b.handle.get()).collect();

        // Relative order survives and nothing moves up
        prop_assert!(after.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(before.iter().zip(after.iter()).all(|(b, a)| a <= b));

        // Live blocks are packed from the heap start with no gaps
        let blocks = heap.blocks();
        let mut expected = heap.heap_start();
        for block in &blocks {
            prop_assert!(block.is_allocated());
            prop_assert_eq!(block.address, expected);
            expected = block.end();
        }
        prop_assert_eq!(heap.next_free_address(), expected);

        check_heap(&mut heap, &live)?;
    }
}
