/*!
 * Lock-Free Scheduler Statistics
 * Atomic counters updated from the dispatch path without taking the queue lock
 */

use super::types::SchedulerStats;
use crate::core::config::SchedulerAlgorithm;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic scheduler statistics
///
/// Counter values may be momentarily inconsistent with each other; each one is
/// exact on its own.
#[repr(C, align(64))]
pub struct AtomicSchedulerStats {
    dispatched: AtomicU64,
    preemptions: AtomicU64,
    completions: AtomicU64,
    algorithm: SchedulerAlgorithm,
    quantum_cycles: u32,
}

impl AtomicSchedulerStats {
    pub fn new(algorithm: SchedulerAlgorithm, quantum_cycles: u32) -> Self {
        Self {
            dispatched: AtomicU64::new(0),
            preemptions: AtomicU64::new(0),
            completions: AtomicU64::new(0),
            algorithm,
            quantum_cycles,
        }
    }

    #[inline(always)]
    pub fn inc_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_preemptions(&self) {
        self.preemptions.fetch_add(1, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn inc_completions(&self) {
        self.completions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completions(&self) -> u64 {
        self.completions.load(Ordering::Relaxed)
    }

    /// Snapshot with the queue figures supplied by the caller
    pub fn snapshot(&self, ready_queue_len: usize, total_processes: usize) -> SchedulerStats {
        SchedulerStats {
            algorithm: self.algorithm,
            quantum_cycles: self.quantum_cycles,
            total_dispatched: self.dispatched.load(Ordering::Relaxed),
            preemptions: self.preemptions.load(Ordering::Relaxed),
            completions: self.completions.load(Ordering::Relaxed),
            ready_queue_len,
            total_processes,
        }
    }
}
