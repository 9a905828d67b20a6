/*!
 * Flat Allocator Tests
 * Block layout after allocation, release, and eviction sequences
 */

use os_emulator::{Allocator, FlatAllocator, MemoryBlock, PidSet, ProcessDescriptor};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn request(pid: u32, size: usize) -> ProcessDescriptor {
    ProcessDescriptor {
        pid,
        name: format!("p{}", pid),
        total_instructions: 10,
        memory_size: size,
        page_size: 1,
    }
}

fn assert_partition(blocks: &[MemoryBlock], total: usize) {
    let mut cursor = 0;
    for block in blocks {
        assert_eq!(block.start, cursor, "blocks must be contiguous and sorted");
        assert!(block.size > 0);
        cursor = block.end();
    }
    assert_eq!(cursor, total);
}

fn has_adjacent_free(blocks: &[MemoryBlock]) -> bool {
    blocks.windows(2).any(|pair| pair[0].free && pair[1].free)
}

#[test]
fn test_allocate_then_release_restores_single_block() {
    let mut flat = FlatAllocator::with_seed(1000, 1);
    assert!(flat.allocate(&request(1, 100), &PidSet::new()).admitted);
    assert_eq!(
        flat.blocks(),
        &[MemoryBlock::allocated(0, 100, 1), MemoryBlock::free(100, 900)]
    );

    flat.deallocate(1);
    assert_eq!(flat.blocks(), &[MemoryBlock::free(0, 1000)]);
}

#[test]
fn test_fragmentation_blocks_large_request() {
    let mut flat = FlatAllocator::with_seed(400, 1);
    let none = PidSet::new();
    for pid in 1..=4 {
        assert!(flat.allocate(&request(pid, 100), &none).admitted);
    }
    flat.deallocate(1);
    flat.deallocate(3);

    // 200 bytes are free but split in two holes
    assert_eq!(flat.total_bytes() - flat.used_bytes(), 200);
    assert_eq!(flat.largest_free_block(), 100);
    assert!(!flat.allocate(&request(5, 200), &none).admitted);
}

#[test]
fn test_eviction_merges_released_block() {
    let mut flat = FlatAllocator::with_seed(300, 3);
    let none = PidSet::new();
    for pid in 1..=3 {
        assert!(flat.allocate(&request(pid, 100), &none).admitted);
    }
    flat.deallocate(1);

    let running: PidSet = [3].into_iter().collect();
    let victim = flat.evict_victim(&running).unwrap();
    assert_eq!(victim.pid, 2);
    assert_eq!(
        flat.blocks(),
        &[MemoryBlock::free(0, 200), MemoryBlock::allocated(200, 100, 3)]
    );
}

#[derive(Debug, Clone)]
enum Op {
    Allocate(u32, usize),
    Deallocate(u32),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u32..12, 1usize..300).prop_map(|(pid, size)| Op::Allocate(pid, size)),
        (1u32..12).prop_map(Op::Deallocate),
    ]
}

proptest! {
    #[test]
    fn prop_no_adjacent_free_blocks_after_deallocate(ops in prop::collection::vec(op(), 1..60)) {
        let total = 1024;
        let mut flat = FlatAllocator::with_seed(total, 0);
        let none = PidSet::new();

        for op in ops {
            match op {
                Op::Allocate(pid, size) => {
                    let _ = flat.allocate(&request(pid, size), &none);
                }
                Op::Deallocate(pid) => {
                    flat.deallocate(pid);
                    prop_assert!(!has_adjacent_free(flat.blocks()));
                }
            }
            assert_partition(flat.blocks(), total);
        }
    }
}
