/*!
 * Process Types
 *
 * A process is shared between the pipeline, the ready queue, one core, and the
 * reporting layer. Its identity is immutable; execution state lives in atomics
 * that only the owning core writes.
 */

use crate::core::limits::RESUMED_INSTRUCTION_MARKER;
use crate::core::types::{CoreId, Pid, Size};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use time::macros::format_description;
use time::OffsetDateTime;

/// Shared handle to a process
pub type ProcessRef = Arc<Process>;

/// Sentinel stored in `assigned_core` while no core has ever owned the process
const UNASSIGNED: u32 = 0;

/// Process state
#[derive(Debug)]
pub struct Process {
    id: Pid,
    name: String,
    total_instructions: u64,
    memory_size: Size,
    page_size: Size,
    created_at: OffsetDateTime,
    current_instruction: AtomicU64,
    assigned_core: AtomicU32,
    finished: AtomicBool,
    cycles_in_core: AtomicU32,
}

impl Process {
    pub fn new(
        id: Pid,
        name: impl Into<String>,
        total_instructions: u64,
        memory_size: Size,
        page_size: Size,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            total_instructions,
            memory_size,
            page_size,
            created_at: OffsetDateTime::now_utc(),
            current_instruction: AtomicU64::new(0),
            assigned_core: AtomicU32::new(UNASSIGNED),
            finished: AtomicBool::new(false),
            cycles_in_core: AtomicU32::new(0),
        }
    }

    /// Rebuild a process from a persisted descriptor.
    /// Execution restarts at the resumed marker.
    pub fn from_descriptor(descriptor: &ProcessDescriptor) -> Self {
        let process = Self::new(
            descriptor.pid,
            descriptor.name.clone(),
            descriptor.total_instructions,
            descriptor.memory_size,
            descriptor.page_size,
        );
        process
            .current_instruction
            .store(RESUMED_INSTRUCTION_MARKER, Ordering::Relaxed);
        process
    }

    #[inline]
    pub fn id(&self) -> Pid {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn total_instructions(&self) -> u64 {
        self.total_instructions
    }

    #[inline]
    pub fn memory_size(&self) -> Size {
        self.memory_size
    }

    #[inline]
    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    #[inline]
    pub fn current_instruction(&self) -> u64 {
        self.current_instruction.load(Ordering::Acquire)
    }

    pub fn remaining_instructions(&self) -> u64 {
        self.total_instructions
            .saturating_sub(self.current_instruction())
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Last core that owned this process, if any
    pub fn assigned_core(&self) -> Option<CoreId> {
        match self.assigned_core.load(Ordering::Acquire) {
            UNASSIGNED => None,
            core => Some(core),
        }
    }

    pub(crate) fn set_core(&self, core: CoreId) {
        self.assigned_core.store(core, Ordering::Release);
    }

    /// Execute one instruction. Returns true once the process has finished.
    ///
    /// Only the core that currently owns the process may call this.
    pub fn execute(&self) -> bool {
        if self.is_finished() {
            return true;
        }
        let current = self.current_instruction.load(Ordering::Acquire);
        if current < self.total_instructions {
            self.current_instruction
                .store(current + 1, Ordering::Release);
        }
        if current + 1 >= self.total_instructions {
            self.finished.store(true, Ordering::Release);
        }
        self.is_finished()
    }

    #[inline]
    pub fn cycles_in_core(&self) -> u32 {
        self.cycles_in_core.load(Ordering::Acquire)
    }

    pub(crate) fn tick_cycle(&self) -> u32 {
        self.cycles_in_core.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn reset_cycles(&self) {
        self.cycles_in_core.store(0, Ordering::Release);
    }

    pub fn descriptor(&self) -> ProcessDescriptor {
        ProcessDescriptor {
            pid: self.id,
            name: self.name.clone(),
            total_instructions: self.total_instructions,
            memory_size: self.memory_size,
            page_size: self.page_size,
        }
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        let format = format_description!(
            "[month]/[day]/[year] [hour repr:12]:[minute]:[second][period]"
        );
        ProcessSnapshot {
            pid: self.id,
            name: self.name.clone(),
            created_at: self
                .created_at
                .format(format)
                .unwrap_or_else(|_| self.created_at.to_string()),
            assigned_core: self.assigned_core(),
            current_instruction: self.current_instruction(),
            total_instructions: self.total_instructions,
            memory_size: self.memory_size,
            finished: self.is_finished(),
        }
    }
}

/// Immutable identity of a process, as persisted to the backing store
/// and carried by the allocators for eviction reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDescriptor {
    pub pid: Pid,
    pub name: String,
    pub total_instructions: u64,
    pub memory_size: Size,
    pub page_size: Size,
}

/// Point-in-time view of a process for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub pid: Pid,
    pub name: String,
    pub created_at: String,
    pub assigned_core: Option<CoreId>,
    pub current_instruction: u64,
    pub total_instructions: u64,
    pub memory_size: Size,
    pub finished: bool,
}
