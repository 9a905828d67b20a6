/*!
 * Core Workers
 *
 * One worker per emulated CPU core. A worker owns at most one process at a
 * time and advances it one instruction per tick. It hands the process back to
 * the dispatcher with a [`CoreEvent`] when the process finishes or its quantum
 * runs out.
 *
 * Quantum accounting lives here, not in the dispatcher: each executed tick
 * bumps both the worker's quantum counter and the process cycle counter.
 */

use super::types::{CoreEvent, CoreSnapshot, CoreStats, CpuUtilization};
use crate::core::errors::{EmulatorError, EmulatorResult};
use crate::core::limits::IDLE_POLL_INTERVAL;
use crate::core::types::{CoreId, Pid};
use crate::memory::{PidSet, RunningProcesses};
use crate::process::ProcessRef;
use flume::Sender;
use log::{debug, error, info, trace};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Default)]
struct Assignment {
    process: Option<ProcessRef>,
    quantum_tick: u32,
}

/// Single emulated CPU core
pub struct CoreWorker {
    id: CoreId,
    quantum_slice: u32,
    delay: Duration,
    assignment: Mutex<Assignment>,
    wakeup: Condvar,
    running: AtomicBool,
    total_ticks: AtomicU64,
    active_ticks: AtomicU64,
    idle_ticks: AtomicU64,
    events: Sender<CoreEvent>,
}

impl CoreWorker {
    /// `quantum_slice == 0` makes a run-to-completion core
    pub fn new(id: CoreId, quantum_slice: u32, delay: Duration, events: Sender<CoreEvent>) -> Self {
        Self {
            id,
            quantum_slice,
            delay,
            assignment: Mutex::new(Assignment::default()),
            wakeup: Condvar::new(),
            running: AtomicBool::new(true),
            total_ticks: AtomicU64::new(0),
            active_ticks: AtomicU64::new(0),
            idle_ticks: AtomicU64::new(0),
            events,
        }
    }

    #[inline]
    pub fn id(&self) -> CoreId {
        self.id
    }

    pub fn quantum_slice(&self) -> u32 {
        self.quantum_slice
    }

    pub fn is_idle(&self) -> bool {
        self.assignment.lock().process.is_none()
    }

    pub fn current_process(&self) -> Option<ProcessRef> {
        self.assignment.lock().process.clone()
    }

    pub fn current_pid(&self) -> Option<Pid> {
        self.assignment.lock().process.as_ref().map(|p| p.id())
    }

    /// Hand a process to this core. Gives it back if the core is busy.
    pub fn assign(&self, process: ProcessRef) -> Result<(), ProcessRef> {
        let mut slot = self.assignment.lock();
        if slot.process.is_some() {
            return Err(process);
        }
        process.set_core(self.id);
        debug!("Core {} assigned PID {}", self.id, process.id());
        slot.process = Some(process);
        slot.quantum_tick = 0;
        drop(slot);
        self.wakeup.notify_one();
        Ok(())
    }

    /// Run one tick. Returns false when the core was idle.
    pub fn step(&self) -> bool {
        self.total_ticks.fetch_add(1, Ordering::Relaxed);

        let event = {
            let mut slot = self.assignment.lock();
            let Some(process) = slot.process.clone() else {
                self.idle_ticks.fetch_add(1, Ordering::Relaxed);
                return false;
            };
            self.active_ticks.fetch_add(1, Ordering::Relaxed);

            let finished = process.execute();
            if self.quantum_slice > 0 {
                slot.quantum_tick += 1;
                process.tick_cycle();
            }
            trace!(
                "Core {} executed PID {} ({}/{})",
                self.id,
                process.id(),
                process.current_instruction(),
                process.total_instructions()
            );

            if finished {
                *slot = Assignment::default();
                Some(CoreEvent::Finished {
                    core: self.id,
                    process,
                })
            } else if self.quantum_slice > 0 && slot.quantum_tick >= self.quantum_slice {
                *slot = Assignment::default();
                Some(CoreEvent::Preempted {
                    core: self.id,
                    process,
                })
            } else {
                None
            }
        };

        if let Some(event) = event {
            if self.events.send(event).is_err() {
                debug!("Core {} has no dispatcher to report to", self.id);
            }
        }
        true
    }

    /// Worker loop; returns once `stop` is observed at the top of a tick
    pub fn run(&self) {
        info!("Core {} started", self.id);
        while self.running.load(Ordering::Acquire) {
            if self.step() {
                if self.delay.is_zero() {
                    thread::yield_now();
                } else {
                    thread::sleep(self.delay);
                }
                continue;
            }

            let mut slot = self.assignment.lock();
            if slot.process.is_none() && self.running.load(Ordering::Acquire) {
                self.wakeup.wait_for(&mut slot, IDLE_POLL_INTERVAL);
            }
        }
        info!("Core {} stopped", self.id);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        let _slot = self.assignment.lock();
        self.wakeup.notify_all();
    }

    pub fn stats(&self) -> CoreStats {
        CoreStats {
            total_ticks: self.total_ticks.load(Ordering::Relaxed),
            active_ticks: self.active_ticks.load(Ordering::Relaxed),
            idle_ticks: self.idle_ticks.load(Ordering::Relaxed),
        }
    }

    pub fn snapshot(&self) -> CoreSnapshot {
        let process = self.current_process();
        CoreSnapshot {
            id: self.id,
            busy: process.is_some(),
            pid: process.as_ref().map(|p| p.id()),
            process_name: process.as_ref().map(|p| p.name().to_string()),
            stats: self.stats(),
        }
    }
}

impl std::fmt::Debug for CoreWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreWorker")
            .field("id", &self.id)
            .field("quantum_slice", &self.quantum_slice)
            .field("pid", &self.current_pid())
            .finish()
    }
}

/// Fixed set of cores, numbered from 1
pub struct CorePool {
    cores: Vec<Arc<CoreWorker>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl CorePool {
    pub fn new(
        num_cores: u32,
        quantum_slice: u32,
        delay: Duration,
        events: Sender<CoreEvent>,
    ) -> Self {
        let cores = (1..=num_cores)
            .map(|id| Arc::new(CoreWorker::new(id, quantum_slice, delay, events.clone())))
            .collect();
        Self {
            cores,
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    pub fn cores(&self) -> &[Arc<CoreWorker>] {
        &self.cores
    }

    pub fn core(&self, id: CoreId) -> Option<&Arc<CoreWorker>> {
        self.cores.iter().find(|c| c.id() == id)
    }

    pub fn first_idle(&self) -> Option<&Arc<CoreWorker>> {
        self.cores.iter().find(|c| c.is_idle())
    }

    /// Assign to the lowest-numbered idle core
    pub fn assign_to_idle(&self, process: ProcessRef) -> Result<CoreId, ProcessRef> {
        let mut process = process;
        for core in &self.cores {
            match core.assign(process) {
                Ok(()) => return Ok(core.id()),
                Err(returned) => process = returned,
            }
        }
        Err(process)
    }

    pub fn snapshots(&self) -> Vec<CoreSnapshot> {
        self.cores.iter().map(|c| c.snapshot()).collect()
    }

    pub fn utilization(&self) -> CpuUtilization {
        let total = self.cores.len();
        let cores_used = self.cores.iter().filter(|c| !c.is_idle()).count();
        let percent = if total == 0 {
            0.0
        } else {
            cores_used as f64 / total as f64 * 100.0
        };
        CpuUtilization {
            percent,
            cores_used,
            cores_available: total - cores_used,
        }
    }

    /// Tick counters summed over all cores
    pub fn total_stats(&self) -> CoreStats {
        self.cores
            .iter()
            .map(|c| c.stats())
            .fold(CoreStats::default(), |acc, s| acc + s)
    }

    /// Start one named thread per core
    pub fn spawn(&self) -> EmulatorResult<()> {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            return Ok(());
        }
        for core in &self.cores {
            let name = format!("core-{}", core.id());
            let worker = Arc::clone(core);
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker.run())
                .map_err(|e| EmulatorError::spawn_failed(&name, e))?;
            handles.push(handle);
        }
        info!("Started {} core workers", self.cores.len());
        Ok(())
    }

    /// Stop every core and join its thread
    pub fn stop_all(&self) {
        for core in &self.cores {
            core.stop();
        }
        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        for handle in handles {
            let name = handle.thread().name().unwrap_or("core").to_string();
            if handle.join().is_err() {
                error!("Thread {} panicked", name);
            }
        }
    }
}

impl RunningProcesses for CorePool {
    fn running_pids(&self) -> PidSet {
        self.cores.iter().filter_map(|c| c.current_pid()).collect()
    }
}
