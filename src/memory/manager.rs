/*!
 * Memory Manager
 *
 * Facade over the configured allocator that runs the evict-then-retry
 * protocol against the backing store.
 *
 * ## Locking
 * - `serial` orders whole allocate/deallocate calls
 * - `allocator` guards the allocator tables and is never held across
 *   backing-store I/O or the running-set probe
 */

use super::backing_store::BackingStore;
use super::flat::FlatAllocator;
use super::paging::PagingAllocator;
use super::traits::{Allocator, RunningProcesses};
use super::types::{MemorySnapshot, PagingCounters, PidSet};
use crate::core::config::{EmulatorConfig, MemoryMode};
use crate::core::types::{Pid, Size};
use crate::process::{Process, ProcessDescriptor};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Memory manager
pub struct MemoryManager {
    serial: Mutex<()>,
    allocator: Mutex<Box<dyn Allocator>>,
    backing_store: Arc<BackingStore>,
    running: Arc<dyn RunningProcesses>,
    mode: MemoryMode,
    total_bytes: Size,
    evictions: AtomicU64,
    failed_allocations: AtomicU64,
}

impl MemoryManager {
    pub fn new(
        allocator: Box<dyn Allocator>,
        backing_store: Arc<BackingStore>,
        running: Arc<dyn RunningProcesses>,
    ) -> Self {
        let mode = allocator.mode();
        let total_bytes = allocator.total_bytes();
        info!(
            "Memory manager initialized: {} mode, {} bytes",
            mode, total_bytes
        );
        Self {
            serial: Mutex::new(()),
            allocator: Mutex::new(allocator),
            backing_store,
            running,
            mode,
            total_bytes,
            evictions: AtomicU64::new(0),
            failed_allocations: AtomicU64::new(0),
        }
    }

    /// Build the allocator the configuration asks for.
    /// `seed` makes victim selection deterministic.
    pub fn from_config(
        config: &EmulatorConfig,
        backing_store: Arc<BackingStore>,
        running: Arc<dyn RunningProcesses>,
        seed: Option<u64>,
    ) -> Self {
        let total = config.max_overall_mem;
        let frame = config.mem_per_frame;
        let allocator: Box<dyn Allocator> = match (config.memory_mode(), seed) {
            (MemoryMode::Flat, Some(seed)) => Box::new(FlatAllocator::with_seed(total, seed)),
            (MemoryMode::Flat, None) => Box::new(FlatAllocator::new(total)),
            (MemoryMode::Paging, Some(seed)) => {
                Box::new(PagingAllocator::with_seed(total, frame, seed))
            }
            (MemoryMode::Paging, None) => Box::new(PagingAllocator::new(total, frame)),
        };
        Self::new(allocator, backing_store, running)
    }

    /// Make the process resident, evicting at most one extra victim.
    ///
    /// Returns false when memory could not be found; the caller decides what
    /// happens to the process.
    pub fn allocate(&self, process: &Process) -> bool {
        let _serial = self.serial.lock();
        let request = process.descriptor();

        let running = self.running.running_pids();
        let first = self.allocator.lock().allocate(&request, &running);
        self.persist_evicted(&first.evicted);
        if first.admitted {
            debug!("Allocated {} bytes for PID {}", request.memory_size, request.pid);
            return true;
        }

        // One eviction, one retry
        let running = self.running.running_pids();
        let victim = self.allocator.lock().evict_victim(&running);
        let Some(victim) = victim else {
            return self.fail(&request, "no evictable victim");
        };
        self.persist_evicted(std::slice::from_ref(&victim));

        let running = self.running.running_pids();
        let retry = self.allocator.lock().allocate(&request, &running);
        self.persist_evicted(&retry.evicted);
        if retry.admitted {
            info!(
                "Allocated {} bytes for PID {} after evicting PID {}",
                request.memory_size, request.pid, victim.pid
            );
            return true;
        }
        self.fail(&request, "retry after eviction failed")
    }

    /// Release a process's memory. Unknown pids are ignored.
    pub fn deallocate(&self, pid: Pid) -> bool {
        let _serial = self.serial.lock();
        let released = self.allocator.lock().deallocate(pid);
        if released {
            debug!("Deallocated memory of PID {}", pid);
        }
        released
    }

    pub fn mode(&self) -> MemoryMode {
        self.mode
    }

    pub fn total_bytes(&self) -> Size {
        self.total_bytes
    }

    pub fn used_bytes(&self) -> Size {
        self.allocator.lock().used_bytes()
    }

    pub fn inactive_bytes(&self) -> Size {
        let running = self.running.running_pids();
        self.allocator.lock().inactive_bytes(&running)
    }

    pub fn paging_counters(&self) -> PagingCounters {
        self.allocator.lock().paging_counters()
    }

    pub fn is_resident(&self, pid: Pid) -> bool {
        self.allocator.lock().is_resident(pid)
    }

    pub fn resident_pids(&self) -> Vec<Pid> {
        self.allocator.lock().resident_pids()
    }

    pub fn backing_store(&self) -> &Arc<BackingStore> {
        &self.backing_store
    }

    /// Total descriptors written to the backing store by evictions
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn failed_allocations(&self) -> u64 {
        self.failed_allocations.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        let running: PidSet = self.running.running_pids();
        let (used, inactive, counters) = {
            let allocator = self.allocator.lock();
            (
                allocator.used_bytes(),
                allocator.inactive_bytes(&running),
                allocator.paging_counters(),
            )
        };
        let usage_percentage = if self.total_bytes == 0 {
            0.0
        } else {
            (used as f64 / self.total_bytes as f64) * 100.0
        };

        MemorySnapshot {
            mode: self.mode,
            total_bytes: self.total_bytes,
            used_bytes: used,
            free_bytes: self.total_bytes.saturating_sub(used),
            inactive_bytes: inactive,
            pages_paged_in: counters.pages_paged_in,
            pages_paged_out: counters.pages_paged_out,
            usage_percentage,
            evictions: self.evictions(),
            failed_allocations: self.failed_allocations(),
        }
    }

    fn persist_evicted(&self, evicted: &[ProcessDescriptor]) {
        for descriptor in evicted {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = self.backing_store.store(descriptor) {
                error!(
                    "Failed to persist evicted PID {} to backing store: {}",
                    descriptor.pid, e
                );
            }
        }
    }

    fn fail(&self, request: &ProcessDescriptor, reason: &str) -> bool {
        self.failed_allocations.fetch_add(1, Ordering::Relaxed);
        warn!(
            "Allocation of {} bytes for PID {} failed: {}",
            request.memory_size, request.pid, reason
        );
        false
    }
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("mode", &self.mode)
            .field("total_bytes", &self.total_bytes)
            .field("evictions", &self.evictions())
            .field("failed_allocations", &self.failed_allocations())
            .finish()
    }
}
