/*!
 * Flat Memory Allocator
 *
 * First-fit allocator over a single contiguous address range.
 *
 * ## Layout invariants
 * - Blocks are sorted by start, non-overlapping, and partition `[0, total)`
 * - After every deallocation no two adjacent blocks are both free
 *
 * Allocation splits the first fitting free block; the remainder becomes a new
 * free block right after it. Merging happens only on deallocation.
 */

use super::traits::Allocator;
use super::types::{Allocation, MemoryBlock, PidSet};
use crate::core::config::MemoryMode;
use crate::core::types::{Pid, Size};
use crate::process::ProcessDescriptor;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Contiguous first-fit allocator
#[derive(Debug)]
pub struct FlatAllocator {
    total: Size,
    blocks: Vec<MemoryBlock>,
    residents: HashMap<Pid, ProcessDescriptor>,
    rng: StdRng,
}

impl FlatAllocator {
    pub fn new(total: Size) -> Self {
        Self::with_rng(total, StdRng::from_entropy())
    }

    /// Deterministic victim selection for tests
    pub fn with_seed(total: Size, seed: u64) -> Self {
        Self::with_rng(total, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(total: Size, rng: StdRng) -> Self {
        info!("Flat allocator initialized with {} bytes", total);
        let blocks = if total > 0 {
            vec![MemoryBlock::free(0, total)]
        } else {
            Vec::new()
        };
        Self {
            total,
            blocks,
            residents: HashMap::new(),
            rng,
        }
    }

    /// Current block list in start order
    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    /// Size of the largest free block
    pub fn largest_free_block(&self) -> Size {
        self.blocks
            .iter()
            .filter(|b| b.free)
            .map(|b| b.size)
            .max()
            .unwrap_or(0)
    }

    /// Merge every pair of adjacent, contiguous free blocks
    fn merge_free_blocks(&mut self) {
        self.blocks.sort_by_key(|b| b.start);

        let before = self.blocks.len();
        let mut i = 0;
        while i + 1 < self.blocks.len() {
            let (current, next) = (&self.blocks[i], &self.blocks[i + 1]);
            if current.free && next.free && current.end() == next.start {
                let next_size = next.size;
                self.blocks[i].size += next_size;
                self.blocks.remove(i + 1);
            } else {
                i += 1;
            }
        }

        let merged = before - self.blocks.len();
        if merged > 0 {
            debug!(
                "Coalesced {} adjacent free blocks, {} blocks remain",
                merged,
                self.blocks.len()
            );
        }
    }
}

impl Allocator for FlatAllocator {
    fn mode(&self) -> MemoryMode {
        MemoryMode::Flat
    }

    fn total_bytes(&self) -> Size {
        self.total
    }

    fn allocate(&mut self, process: &ProcessDescriptor, _running: &PidSet) -> Allocation {
        let pid = process.pid;
        if self.residents.contains_key(&pid) {
            debug!("PID {} is already resident", pid);
            return Allocation::admitted();
        }

        let needed = process.memory_size;
        if needed == 0 {
            warn!("PID {} requested an empty allocation", pid);
            return Allocation::rejected();
        }

        let Some(index) = self
            .blocks
            .iter()
            .position(|b| b.free && b.size >= needed)
        else {
            debug!(
                "No free block fits {} bytes for PID {} (largest free: {})",
                needed,
                pid,
                self.largest_free_block()
            );
            return Allocation::rejected();
        };

        let block = &mut self.blocks[index];
        let remainder = block.size - needed;
        let start = block.start;
        *block = MemoryBlock::allocated(start, needed, pid);

        if remainder > 0 {
            self.blocks
                .insert(index + 1, MemoryBlock::free(start + needed, remainder));
        }

        self.residents.insert(pid, process.clone());
        debug!(
            "Allocated [{}, {}) for PID {} ({} bytes left in split block)",
            start,
            start + needed,
            pid,
            remainder
        );
        Allocation::admitted()
    }

    fn deallocate(&mut self, pid: Pid) -> bool {
        let Some(block) = self
            .blocks
            .iter_mut()
            .find(|b| !b.free && b.owner_pid == Some(pid))
        else {
            return false;
        };

        block.release();
        self.residents.remove(&pid);
        self.merge_free_blocks();
        debug!("Released memory of PID {}", pid);
        true
    }

    fn evict_victim(&mut self, running: &PidSet) -> Option<ProcessDescriptor> {
        let candidates: Vec<Pid> = self
            .blocks
            .iter()
            .filter_map(|b| b.owner_pid)
            .filter(|pid| !running.contains(pid))
            .collect();

        if candidates.is_empty() {
            return None;
        }

        let victim = candidates[self.rng.gen_range(0..candidates.len())];
        let descriptor = self.residents.get(&victim).cloned()?;
        self.deallocate(victim);
        info!(
            "Evicted PID {} ({} bytes) from flat memory",
            victim, descriptor.memory_size
        );
        Some(descriptor)
    }

    fn is_resident(&self, pid: Pid) -> bool {
        self.residents.contains_key(&pid)
    }

    fn resident_pids(&self) -> Vec<Pid> {
        let mut pids: Vec<Pid> = self.residents.keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    fn used_bytes(&self) -> Size {
        self.blocks.iter().filter(|b| !b.free).map(|b| b.size).sum()
    }

    fn inactive_bytes(&self, running: &PidSet) -> Size {
        self.blocks
            .iter()
            .filter(|b| matches!(b.owner_pid, Some(pid) if !running.contains(&pid)))
            .map(|b| b.size)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(pid: Pid, size: Size) -> ProcessDescriptor {
        ProcessDescriptor {
            pid,
            name: format!("p{}", pid),
            total_instructions: 10,
            memory_size: size,
            page_size: 16,
        }
    }

    #[test]
    fn test_split_and_coalesce_scenario() {
        let mut flat = FlatAllocator::with_seed(1000, 7);
        assert!(flat.allocate(&request(1, 100), &PidSet::new()).admitted);
        assert_eq!(
            flat.blocks(),
            &[MemoryBlock::allocated(0, 100, 1), MemoryBlock::free(100, 900)]
        );

        assert!(flat.deallocate(1));
        assert_eq!(flat.blocks(), &[MemoryBlock::free(0, 1000)]);
    }

    #[test]
    fn test_exact_fit_does_not_split() {
        let mut flat = FlatAllocator::with_seed(256, 7);
        assert!(flat.allocate(&request(1, 256), &PidSet::new()).admitted);
        assert_eq!(flat.blocks(), &[MemoryBlock::allocated(0, 256, 1)]);
        assert!(!flat.allocate(&request(2, 1), &PidSet::new()).admitted);
    }

    #[test]
    fn test_first_fit_reuses_hole() {
        let mut flat = FlatAllocator::with_seed(300, 7);
        let none = PidSet::new();
        assert!(flat.allocate(&request(1, 100), &none).admitted);
        assert!(flat.allocate(&request(2, 100), &none).admitted);
        assert!(flat.allocate(&request(3, 100), &none).admitted);
        assert!(flat.deallocate(2));

        assert!(flat.allocate(&request(4, 50), &none).admitted);
        assert_eq!(flat.blocks()[1], MemoryBlock::allocated(100, 50, 4));
        assert_eq!(flat.blocks()[2], MemoryBlock::free(150, 50));
    }

    #[test]
    fn test_middle_release_merges_both_neighbours() {
        let mut flat = FlatAllocator::with_seed(300, 7);
        let none = PidSet::new();
        for pid in 1..=3 {
            assert!(flat.allocate(&request(pid, 100), &none).admitted);
        }
        flat.deallocate(1);
        flat.deallocate(3);
        assert_eq!(flat.blocks().len(), 3);

        flat.deallocate(2);
        assert_eq!(flat.blocks(), &[MemoryBlock::free(0, 300)]);
    }

    #[test]
    fn test_unknown_pid_deallocation_is_noop() {
        let mut flat = FlatAllocator::with_seed(100, 7);
        assert!(flat.allocate(&request(1, 40), &PidSet::new()).admitted);
        let before = flat.blocks().to_vec();
        assert!(!flat.deallocate(99));
        assert_eq!(flat.blocks(), before.as_slice());
    }

    #[test]
    fn test_victim_is_never_running() {
        let mut flat = FlatAllocator::with_seed(300, 42);
        let none = PidSet::new();
        for pid in 1..=3 {
            assert!(flat.allocate(&request(pid, 100), &none).admitted);
        }
        let running: PidSet = [1, 3].into_iter().collect();
        let victim = flat.evict_victim(&running).unwrap();
        assert_eq!(victim.pid, 2);
        assert!(!flat.is_resident(2));

        let everyone: PidSet = [1, 3].into_iter().collect();
        assert!(flat.evict_victim(&everyone).is_none());
    }

    #[test]
    fn test_used_and_inactive_bytes() {
        let mut flat = FlatAllocator::with_seed(1000, 7);
        let none = PidSet::new();
        assert!(flat.allocate(&request(1, 100), &none).admitted);
        assert!(flat.allocate(&request(2, 300), &none).admitted);

        let running: PidSet = [2].into_iter().collect();
        assert_eq!(flat.used_bytes(), 400);
        assert_eq!(flat.inactive_bytes(&running), 100);
        assert_eq!(flat.resident_pids(), vec![1, 2]);
    }
}
