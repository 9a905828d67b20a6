/*!
 * System Report
 * Point-in-time view of cores, memory, and processes for the reporting layer
 */

use crate::core::types::Pid;
use crate::memory::MemorySnapshot;
use crate::process::ProcessSnapshot;
use crate::scheduler::{CoreSnapshot, CoreStats, CpuUtilization, SchedulerStats};
use serde::{Deserialize, Serialize};

/// Full emulator snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemReport {
    pub cpu: CpuUtilization,
    pub cores: Vec<CoreSnapshot>,
    /// Tick counters summed over every core
    pub ticks: CoreStats,
    pub memory: MemorySnapshot,
    pub scheduler: SchedulerStats,
    pub processes: Vec<ProcessSnapshot>,
    /// Processes whose allocation failed and that were never scheduled
    pub unscheduled: Vec<Pid>,
}

impl SystemReport {
    pub fn running(&self) -> impl Iterator<Item = &ProcessSnapshot> {
        self.processes.iter().filter(|p| !p.finished)
    }

    pub fn finished(&self) -> impl Iterator<Item = &ProcessSnapshot> {
        self.processes.iter().filter(|p| p.finished)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
