/*!
 * Allocation Pipeline
 *
 * Producer/consumer hand-off between process creation and the scheduler.
 * Pending processes are taken newest first; only the ready queue has to be
 * FIFO. A process whose allocation fails is recorded as unscheduled and not
 * retried.
 */

use crate::core::limits::CONSUMER_WAIT_TIMEOUT;
use crate::core::types::Pid;
use crate::memory::MemoryManager;
use crate::process::ProcessRef;
use crate::scheduler::Scheduler;
use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub(super) struct Pipeline {
    pending: Mutex<Vec<ProcessRef>>,
    wakeup: Condvar,
    running: AtomicBool,
    memory: Arc<MemoryManager>,
    scheduler: Arc<Scheduler>,
    unscheduled: Mutex<Vec<Pid>>,
}

impl Pipeline {
    pub(super) fn new(memory: Arc<MemoryManager>, scheduler: Arc<Scheduler>) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            wakeup: Condvar::new(),
            running: AtomicBool::new(true),
            memory,
            scheduler,
            unscheduled: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn submit(&self, process: ProcessRef) {
        self.pending.lock().push(process);
        self.wakeup.notify_all();
    }

    pub(super) fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    pub(super) fn unscheduled(&self) -> Vec<Pid> {
        self.unscheduled.lock().clone()
    }

    /// Allocate memory and hand the process to the scheduler
    pub(super) fn admit(&self, process: ProcessRef) -> bool {
        if self.memory.allocate(&process) {
            debug!("PID {} admitted to the ready queue", process.id());
            self.scheduler.add_process(process);
            true
        } else {
            warn!(
                "PID {} ({}) left unscheduled: no memory",
                process.id(),
                process.name()
            );
            self.unscheduled.lock().push(process.id());
            false
        }
    }

    /// Admit everything pending on the calling thread. Returns admitted count.
    pub(super) fn drain(&self) -> usize {
        let mut admitted = 0;
        loop {
            let Some(process) = self.pending.lock().pop() else {
                return admitted;
            };
            if self.admit(process) {
                admitted += 1;
            }
        }
    }

    /// Block until a pending process exists or the pipeline stops
    fn next(&self) -> Option<ProcessRef> {
        let mut pending = self.pending.lock();
        loop {
            if !self.running.load(Ordering::Acquire) {
                return None;
            }
            if let Some(process) = pending.pop() {
                return Some(process);
            }
            self.wakeup.wait_for(&mut pending, CONSUMER_WAIT_TIMEOUT);
        }
    }

    /// Consumer loop body of the `allocator` thread
    pub(super) fn run(&self) {
        info!("Allocation consumer started");
        while let Some(process) = self.next() {
            self.admit(process);
        }
        info!("Allocation consumer stopped");
    }

    pub(super) fn stop(&self) {
        self.running.store(false, Ordering::Release);
        let _pending = self.pending.lock();
        self.wakeup.notify_all();
    }
}
