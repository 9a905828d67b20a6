/*!
 * Paging Allocator Tests
 * Frame table and page table consistency under allocation and eviction
 */

use os_emulator::{Allocator, PagingAllocator, PidSet, ProcessDescriptor};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const FRAME: usize = 16;

fn request(pid: u32, size: usize) -> ProcessDescriptor {
    ProcessDescriptor {
        pid,
        name: format!("p{}", pid),
        total_instructions: 10,
        memory_size: size,
        page_size: FRAME,
    }
}

/// Frame owners agree with the page table, and no page-table entry is empty
fn check_ownership(paging: &PagingAllocator) -> Result<(), String> {
    for (frame, owner) in paging.frame_table().iter().enumerate() {
        if let Some(pid) = owner {
            let listed = paging
                .frames_of(*pid)
                .map(|frames| frames.contains(&frame))
                .unwrap_or(false);
            if !listed {
                return Err(format!("frame {} owned by {} but not listed", frame, pid));
            }
        }
    }
    for (pid, frames) in paging.page_table() {
        if frames.is_empty() {
            return Err(format!("pid {} has an empty frame list", pid));
        }
        for &frame in frames {
            if paging.frame_table()[frame] != Some(*pid) {
                return Err(format!("pid {} lists frame {} it does not own", pid, frame));
            }
        }
    }
    Ok(())
}

#[test]
fn test_partial_residency_after_single_frame_eviction() {
    let mut paging = PagingAllocator::with_seed(64, FRAME, 1);
    let none = PidSet::new();
    assert!(paging.allocate(&request(1, 32), &none).admitted);
    assert!(paging.allocate(&request(2, 32), &none).admitted);

    let outcome = paging.allocate(&request(3, 16), &none);
    assert!(outcome.admitted);
    assert_eq!(outcome.evicted.len(), 1);

    let victim = &outcome.evicted[0];
    assert_eq!(victim.memory_size, 32);
    assert_eq!(paging.frames_of(victim.pid).map(<[usize]>::len), Some(1));
    assert_eq!(paging.paging_counters().pages_paged_out, 1);
    assert_eq!(paging.paging_counters().pages_paged_in, 5);
    check_ownership(&paging).unwrap();
}

#[test]
fn test_failed_attempt_keeps_completed_evictions() {
    let mut paging = PagingAllocator::with_seed(64, FRAME, 1);
    assert!(paging.allocate(&request(1, 16), &PidSet::new()).admitted);
    assert!(paging.allocate(&request(2, 48), &PidSet::new()).admitted);

    // Only pid 1's frame may go; pid 3 needs two frames
    let running: PidSet = [2].into_iter().collect();
    let outcome = paging.allocate(&request(3, 32), &running);
    assert!(!outcome.admitted);
    assert_eq!(outcome.evicted.len(), 1);
    assert_eq!(outcome.evicted[0].pid, 1);
    assert!(!paging.is_resident(1));
    assert!(!paging.is_resident(3));
    assert_eq!(paging.free_frames(), 1);
    check_ownership(&paging).unwrap();
}

#[test]
fn test_used_bytes_count_whole_frames() {
    let mut paging = PagingAllocator::with_seed(256, FRAME, 1);
    assert!(paging.allocate(&request(1, 1), &PidSet::new()).admitted);
    assert!(paging.allocate(&request(2, 17), &PidSet::new()).admitted);
    assert_eq!(paging.used_bytes(), 48);
}

#[derive(Debug, Clone)]
enum Op {
    Allocate(u32, usize),
    Deallocate(u32),
    Evict,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1u32..10, 1usize..80).prop_map(|(pid, size)| Op::Allocate(pid, size)),
        1 => (1u32..10).prop_map(Op::Deallocate),
        1 => Just(Op::Evict),
    ]
}

proptest! {
    #[test]
    fn prop_frame_ownership_is_consistent(
        seed in any::<u64>(),
        running in prop::collection::hash_set(1u32..10, 0..3),
        ops in prop::collection::vec(op(), 1..60),
    ) {
        let mut paging = PagingAllocator::with_seed(128, FRAME, seed);
        for op in ops {
            match op {
                Op::Allocate(pid, size) => {
                    let outcome = paging.allocate(&request(pid, size), &running);
                    for victim in &outcome.evicted {
                        prop_assert!(!running.contains(&victim.pid));
                    }
                }
                Op::Deallocate(pid) => {
                    paging.deallocate(pid);
                }
                Op::Evict => {
                    if let Some(victim) = paging.evict_victim(&running) {
                        prop_assert!(!running.contains(&victim.pid));
                    }
                }
            }
            if let Err(message) = check_ownership(&paging) {
                return Err(TestCaseError::fail(message));
            }
        }
    }
}
