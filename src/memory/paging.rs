/*!
 * Paging Allocator
 *
 * Fixed-size frame table with a reverse page table.
 *
 * ## Ownership invariants
 * - `frames[f] == Some(pid)` exactly when `f` appears in `page_table[pid]`
 * - A pid present in the page table owns at least one frame
 *
 * When no frame is free a single frame of a non-running process is evicted.
 * The owner may stay partially resident; allocating it again pages in only
 * the frames it lost, never at the expense of its own remaining frames.
 */

use super::traits::Allocator;
use super::types::{Allocation, PagingCounters, PidSet};
use crate::core::config::MemoryMode;
use crate::core::types::{Pid, Size};
use crate::process::ProcessDescriptor;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Frame-based allocator
#[derive(Debug)]
pub struct PagingAllocator {
    frame_size: Size,
    frames: Vec<Option<Pid>>,
    page_table: HashMap<Pid, Vec<usize>>,
    residents: HashMap<Pid, ProcessDescriptor>,
    counters: PagingCounters,
    rng: StdRng,
}

impl PagingAllocator {
    pub fn new(total: Size, frame_size: Size) -> Self {
        Self::with_rng(total, frame_size, StdRng::from_entropy())
    }

    /// Deterministic victim selection for tests
    pub fn with_seed(total: Size, frame_size: Size, seed: u64) -> Self {
        Self::with_rng(total, frame_size, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(total: Size, frame_size: Size, rng: StdRng) -> Self {
        let num_frames = if frame_size == 0 { 0 } else { total / frame_size };
        info!(
            "Paging allocator initialized with {} frames of {} bytes",
            num_frames, frame_size
        );
        Self {
            frame_size,
            frames: vec![None; num_frames],
            page_table: HashMap::new(),
            residents: HashMap::new(),
            counters: PagingCounters::default(),
            rng,
        }
    }

    pub fn frame_size(&self) -> Size {
        self.frame_size
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn free_frames(&self) -> usize {
        self.frames.iter().filter(|f| f.is_none()).count()
    }

    /// Frame table: owner of each frame
    pub fn frame_table(&self) -> &[Option<Pid>] {
        &self.frames
    }

    /// Frames held by a process
    pub fn frames_of(&self, pid: Pid) -> Option<&[usize]> {
        self.page_table.get(&pid).map(Vec::as_slice)
    }

    /// Reverse page table
    pub fn page_table(&self) -> &HashMap<Pid, Vec<usize>> {
        &self.page_table
    }

    /// Pages needed to hold `size` bytes
    pub fn pages_for(&self, size: Size) -> usize {
        if self.frame_size == 0 {
            return 0;
        }
        size.div_ceil(self.frame_size)
    }

    fn find_free_frame(&self) -> Option<usize> {
        self.frames.iter().position(Option::is_none)
    }

    /// Evict one frame whose owner is resident, not running, and not `requester`
    fn evict_frame(
        &mut self,
        running: &PidSet,
        requester: Option<Pid>,
    ) -> Option<ProcessDescriptor> {
        let candidates: Vec<usize> = self
            .frames
            .iter()
            .enumerate()
            .filter_map(|(frame, owner)| match owner {
                Some(pid)
                    if Some(*pid) != requester
                        && !running.contains(pid)
                        && self.page_table.contains_key(pid) =>
                {
                    Some(frame)
                }
                _ => None,
            })
            .collect();

        if candidates.is_empty() {
            return None;
        }

        let frame = candidates[self.rng.gen_range(0..candidates.len())];
        let pid = self.frames[frame].take()?;
        self.counters.pages_paged_out += 1;

        let owned = self.page_table.get_mut(&pid)?;
        let mut descriptor = self.residents.get(&pid).cloned()?;
        descriptor.memory_size = owned.len() * self.frame_size;
        descriptor.page_size = self.frame_size;

        owned.retain(|&f| f != frame);
        if owned.is_empty() {
            self.page_table.remove(&pid);
            self.residents.remove(&pid);
        }

        debug!("Paged out frame {} of PID {}", frame, pid);
        Some(descriptor)
    }
}

impl Allocator for PagingAllocator {
    fn mode(&self) -> MemoryMode {
        MemoryMode::Paging
    }

    fn total_bytes(&self) -> Size {
        self.frames.len() * self.frame_size
    }

    fn allocate(&mut self, process: &ProcessDescriptor, running: &PidSet) -> Allocation {
        let pid = process.pid;
        let pages_total = self.pages_for(process.memory_size);
        let resident = self.page_table.get(&pid).map_or(0, Vec::len);
        if resident > 0 && resident >= pages_total {
            debug!("PID {} is already resident", pid);
            return Allocation::admitted();
        }

        // A partially resident process only pages in what it lost
        let pages_needed = pages_total - resident;
        if pages_needed == 0 {
            warn!("PID {} requested an empty allocation", pid);
            return Allocation::rejected();
        }
        if pages_total > self.frames.len() {
            warn!(
                "PID {} needs {} pages but only {} frames exist",
                pid,
                pages_total,
                self.frames.len()
            );
            return Allocation::rejected();
        }

        let mut taken = Vec::with_capacity(pages_needed);
        let mut evicted = Vec::new();

        while taken.len() < pages_needed {
            if let Some(frame) = self.find_free_frame() {
                self.frames[frame] = Some(pid);
                taken.push(frame);
                continue;
            }

            match self.evict_frame(running, Some(pid)) {
                Some(descriptor) => evicted.push(descriptor),
                None => {
                    for &frame in &taken {
                        self.frames[frame] = None;
                    }
                    debug!(
                        "Rolled back {} frames for PID {}: no evictable frame left",
                        taken.len(),
                        pid
                    );
                    return Allocation {
                        admitted: false,
                        evicted,
                    };
                }
            }
        }

        self.counters.pages_paged_in += taken.len() as u64;
        debug!("Mapped {} pages for PID {}", taken.len(), pid);
        self.page_table.entry(pid).or_default().extend(taken);
        self.residents.insert(pid, process.clone());

        Allocation {
            admitted: true,
            evicted,
        }
    }

    fn deallocate(&mut self, pid: Pid) -> bool {
        let Some(owned) = self.page_table.remove(&pid) else {
            return false;
        };
        for frame in owned {
            self.frames[frame] = None;
        }
        self.residents.remove(&pid);
        debug!("Released all frames of PID {}", pid);
        true
    }

    fn evict_victim(&mut self, running: &PidSet) -> Option<ProcessDescriptor> {
        self.evict_frame(running, None)
    }

    fn is_resident(&self, pid: Pid) -> bool {
        self.page_table.contains_key(&pid)
    }

    fn resident_pids(&self) -> Vec<Pid> {
        let mut pids: Vec<Pid> = self.page_table.keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    fn used_bytes(&self) -> Size {
        self.page_table
            .values()
            .map(|frames| frames.len() * self.frame_size)
            .sum()
    }

    fn inactive_bytes(&self, running: &PidSet) -> Size {
        self.page_table
            .iter()
            .filter(|(pid, _)| !running.contains(pid))
            .map(|(_, frames)| frames.len() * self.frame_size)
            .sum()
    }

    fn paging_counters(&self) -> PagingCounters {
        self.counters
    }
}
