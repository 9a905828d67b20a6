/*!
 * Memory Types
 * Common types for memory management
 */

use crate::core::config::MemoryMode;
use crate::core::types::{Pid, Size};
use crate::process::ProcessDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Set of process ids, typically the processes currently owned by a core
pub type PidSet = HashSet<Pid>;

/// Contiguous block in the flat allocator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBlock {
    pub start: Size,
    pub size: Size,
    pub free: bool,
    pub owner_pid: Option<Pid>,
}

impl MemoryBlock {
    pub fn free(start: Size, size: Size) -> Self {
        Self {
            start,
            size,
            free: true,
            owner_pid: None,
        }
    }

    pub fn allocated(start: Size, size: Size, owner_pid: Pid) -> Self {
        Self {
            start,
            size,
            free: false,
            owner_pid: Some(owner_pid),
        }
    }

    /// One past the last address of the block
    #[inline]
    pub fn end(&self) -> Size {
        self.start + self.size
    }

    pub fn release(&mut self) {
        self.free = true;
        self.owner_pid = None;
    }
}

/// Result of one allocation attempt
///
/// Allocators never talk to the backing store themselves; every descriptor
/// they evicted while trying is handed back so the caller can persist it
/// outside the allocator lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct Allocation {
    pub admitted: bool,
    pub evicted: Vec<ProcessDescriptor>,
}

impl Allocation {
    pub fn admitted() -> Self {
        Self {
            admitted: true,
            evicted: Vec::new(),
        }
    }

    pub fn rejected() -> Self {
        Self::default()
    }
}

/// Paging activity counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingCounters {
    pub pages_paged_in: u64,
    pub pages_paged_out: u64,
}

/// Memory statistics for the reporting layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub mode: MemoryMode,
    pub total_bytes: Size,
    pub used_bytes: Size,
    pub free_bytes: Size,
    pub inactive_bytes: Size,
    pub pages_paged_in: u64,
    pub pages_paged_out: u64,
    pub usage_percentage: f64,
    pub evictions: u64,
    pub failed_allocations: u64,
}
