/*!
 * Scheduler Module
 *
 * Ready queue, core pool, and the dispatcher thread.
 *
 * Processes move Ready → Running → {Ready (RR preemption) | Finished}.
 * The ready queue is strict FIFO; preempted processes re-enter at the back.
 * Cores report back over a channel and the dispatcher is the only consumer.
 */

pub mod atomic_stats;
pub mod core_worker;
mod dispatch;
pub mod types;

pub use atomic_stats::AtomicSchedulerStats;
pub use core_worker::{CorePool, CoreWorker};
pub use types::{CoreEvent, CoreSnapshot, CoreStats, CpuUtilization, SchedulerStats};

use crate::core::config::{EmulatorConfig, SchedulerAlgorithm};
use crate::core::errors::{EmulatorError, EmulatorResult};
use crate::core::types::Pid;
use crate::memory::{MemoryManager, PidSet, RunningProcesses};
use crate::process::ProcessRef;
use ahash::RandomState;
use flume::Receiver;
use log::{debug, error, info};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Every process ever added: submission order plus a pid index
#[derive(Default)]
struct Registry {
    order: Vec<ProcessRef>,
    by_pid: HashMap<Pid, ProcessRef, RandomState>,
}

/// Process scheduler
pub struct Scheduler {
    algorithm: SchedulerAlgorithm,
    quantum_cycles: u32,
    pool: Arc<CorePool>,
    ready: Mutex<VecDeque<ProcessRef>>,
    processes: RwLock<Registry>,
    events: Receiver<CoreEvent>,
    running: AtomicBool,
    stopped: AtomicBool,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    stats: AtomicSchedulerStats,
    memory: Option<Arc<MemoryManager>>,
    reclaim_finished: bool,
}

impl Scheduler {
    /// Build the scheduler and its core pool. No thread is started.
    pub fn new(config: &EmulatorConfig) -> Self {
        let (sender, events) = flume::unbounded();
        let quantum_slice = config.quantum_slice();
        let pool = Arc::new(CorePool::new(
            config.num_cpu,
            quantum_slice,
            config.delay_per_exec(),
            sender,
        ));

        info!(
            "Scheduler initialized: algorithm={}, quantum={}, cores={}",
            config.scheduler, quantum_slice, config.num_cpu
        );

        Self {
            algorithm: config.scheduler,
            quantum_cycles: quantum_slice,
            pool,
            ready: Mutex::new(VecDeque::new()),
            processes: RwLock::new(Registry::default()),
            events,
            running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            dispatcher: Mutex::new(None),
            stats: AtomicSchedulerStats::new(config.scheduler, quantum_slice),
            memory: None,
            reclaim_finished: config.reclaim_finished,
        }
    }

    /// Memory manager used to release finished processes when
    /// `reclaim-finished` is set
    pub fn with_memory_manager(mut self, memory: Arc<MemoryManager>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn algorithm(&self) -> SchedulerAlgorithm {
        self.algorithm
    }

    pub fn pool(&self) -> &Arc<CorePool> {
        &self.pool
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start core threads and the dispatcher thread
    pub fn start(self: &Arc<Self>) -> EmulatorResult<()> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(EmulatorError::ShutDown);
        }
        if self.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.pool.spawn()?;

        let scheduler = Arc::clone(self);
        let handle = thread::Builder::new()
            .name("dispatcher".into())
            .spawn(move || scheduler.run_dispatcher())
            .map_err(|e| EmulatorError::spawn_failed("dispatcher", e))?;
        *self.dispatcher.lock() = Some(handle);

        info!("Scheduler started");
        Ok(())
    }

    /// Stop the dispatcher, then stop and join every core. Idempotent.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.running.store(false, Ordering::Release);

        if let Some(handle) = self.dispatcher.lock().take() {
            if handle.join().is_err() {
                error!("Dispatcher thread panicked");
            }
        }
        self.pool.stop_all();

        // Bookkeeping for events sent after the dispatcher's last pass
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }
        info!("Scheduler stopped");
    }

    /// Register a process and queue it for dispatch.
    ///
    /// A pid is admitted once. Adding it again is ignored whether it is
    /// queued, on a core, or finished; only preemption requeues a process.
    pub fn add_process(&self, process: ProcessRef) {
        let pid = process.id();
        {
            let mut registry = self.processes.write();
            if registry.by_pid.contains_key(&pid) {
                debug!("PID {} was already added, ignoring", pid);
                return;
            }
            registry.by_pid.insert(pid, Arc::clone(&process));
            registry.order.push(Arc::clone(&process));
        }

        if process.is_finished() {
            debug!("PID {} is already finished, not queued", pid);
            return;
        }
        self.enqueue(process);
    }

    pub fn process_by_id(&self, pid: Pid) -> Option<ProcessRef> {
        self.processes.read().by_pid.get(&pid).cloned()
    }

    pub fn process_by_name(&self, name: &str) -> Option<ProcessRef> {
        self.processes
            .read()
            .order
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }

    /// Every process ever added, in submission order
    pub fn processes(&self) -> Vec<ProcessRef> {
        self.processes.read().order.clone()
    }

    /// Ready queue contents, front first
    pub fn ready_pids(&self) -> Vec<Pid> {
        self.ready.lock().iter().map(|p| p.id()).collect()
    }

    pub fn ready_len(&self) -> usize {
        self.ready.lock().len()
    }

    pub fn stats(&self) -> SchedulerStats {
        let ready = self.ready_len();
        let total = self.processes.read().order.len();
        self.stats.snapshot(ready, total)
    }

    /// Push to the back unless the process is already queued
    fn enqueue(&self, process: ProcessRef) {
        let pid = process.id();
        let mut ready = self.ready.lock();
        if ready.iter().any(|p| p.id() == pid) {
            debug!("PID {} is already in the ready queue", pid);
            return;
        }
        ready.push_back(process);
    }
}

impl RunningProcesses for Scheduler {
    fn running_pids(&self) -> PidSet {
        self.pool.running_pids()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("algorithm", &self.algorithm)
            .field("quantum_cycles", &self.quantum_cycles)
            .field("cores", &self.pool.len())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.pool.stop_all();
    }
}
