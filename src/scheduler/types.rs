/*!
 * Scheduler Types
 * Core events, statistics, and reporting snapshots
 */

use crate::core::config::SchedulerAlgorithm;
use crate::core::types::{CoreId, Pid, Tick};
use crate::process::ProcessRef;
use serde::{Deserialize, Serialize};

/// Message sent from a core to the dispatcher when it gives up a process
#[derive(Debug, Clone)]
pub enum CoreEvent {
    /// The process executed its last instruction
    Finished { core: CoreId, process: ProcessRef },
    /// The process exhausted its quantum and must be requeued
    Preempted { core: CoreId, process: ProcessRef },
}

impl CoreEvent {
    pub fn core(&self) -> CoreId {
        match self {
            CoreEvent::Finished { core, .. } | CoreEvent::Preempted { core, .. } => *core,
        }
    }

    pub fn process(&self) -> &ProcessRef {
        match self {
            CoreEvent::Finished { process, .. } | CoreEvent::Preempted { process, .. } => process,
        }
    }
}

/// Cumulative tick counters of one core (monotonic)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreStats {
    pub total_ticks: Tick,
    pub active_ticks: Tick,
    pub idle_ticks: Tick,
}

impl std::ops::Add for CoreStats {
    type Output = CoreStats;

    fn add(self, other: CoreStats) -> CoreStats {
        CoreStats {
            total_ticks: self.total_ticks + other.total_ticks,
            active_ticks: self.active_ticks + other.active_ticks,
            idle_ticks: self.idle_ticks + other.idle_ticks,
        }
    }
}

/// Per-core reporting view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreSnapshot {
    pub id: CoreId,
    pub busy: bool,
    pub pid: Option<Pid>,
    pub process_name: Option<String>,
    pub stats: CoreStats,
}

/// Aggregate CPU utilization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuUtilization {
    pub percent: f64,
    pub cores_used: usize,
    pub cores_available: usize,
}

/// Scheduler statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub algorithm: SchedulerAlgorithm,
    pub quantum_cycles: u32,
    pub total_dispatched: u64,
    pub preemptions: u64,
    pub completions: u64,
    pub ready_queue_len: usize,
    pub total_processes: usize,
}
