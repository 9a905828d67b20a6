/*!
 * Memory Traits
 * Abstractions for the memory allocators and the residency probe
 */

use super::types::{Allocation, PagingCounters, PidSet};
use crate::core::config::MemoryMode;
use crate::core::types::{Pid, Size};
use crate::process::ProcessDescriptor;

/// Memory allocator interface
///
/// Implementations are plain single-owner state machines; the memory manager
/// serializes access and performs all cross-component work.
pub trait Allocator: Send {
    /// Allocation strategy implemented by this allocator
    fn mode(&self) -> MemoryMode;

    /// Capacity in bytes
    fn total_bytes(&self) -> Size;

    /// Try to make the process resident.
    /// `running` lists processes that must never be chosen as victims.
    fn allocate(&mut self, process: &ProcessDescriptor, running: &PidSet) -> Allocation;

    /// Release everything owned by `pid`. Returns false for unknown pids.
    fn deallocate(&mut self, pid: Pid) -> bool;

    /// Evict one resident, non-running victim and describe what was evicted
    fn evict_victim(&mut self, running: &PidSet) -> Option<ProcessDescriptor>;

    /// Check whether the process currently holds memory
    fn is_resident(&self, pid: Pid) -> bool;

    /// Pids currently holding memory, in ascending order
    fn resident_pids(&self) -> Vec<Pid>;

    /// Bytes held by all resident processes
    fn used_bytes(&self) -> Size;

    /// Bytes held by resident processes that are not running
    fn inactive_bytes(&self, running: &PidSet) -> Size;

    /// Paging activity (zero for allocators that do not page)
    fn paging_counters(&self) -> PagingCounters {
        PagingCounters::default()
    }
}

/// Source of the set of processes currently owned by a core
pub trait RunningProcesses: Send + Sync {
    fn running_pids(&self) -> PidSet;
}

/// Probe for contexts without cores, where nothing is ever running
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRunningProcesses;

impl RunningProcesses for NoRunningProcesses {
    fn running_pids(&self) -> PidSet {
        PidSet::new()
    }
}

impl RunningProcesses for parking_lot::RwLock<PidSet> {
    fn running_pids(&self) -> PidSet {
        self.read().clone()
    }
}
