/*!
 * Dispatch
 * Event handling and dispatch passes for FCFS and RR
 */

use super::types::CoreEvent;
use super::Scheduler;
use crate::core::config::SchedulerAlgorithm;
use crate::core::limits::DISPATCH_INTERVAL;
use flume::RecvTimeoutError;
use log::{debug, info};
use std::sync::atomic::Ordering;

impl Scheduler {
    /// One dispatcher pass: apply pending core events, then fill idle cores
    /// from the front of the ready queue. Returns how many processes were
    /// dispatched.
    ///
    /// The queue lock and a core lock are never held together: the process
    /// is popped first, then offered to the pool, and pushed back to the
    /// front if every core is busy.
    pub fn dispatch_once(&self) -> usize {
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }

        let mut dispatched = 0;
        loop {
            let Some(process) = self.ready.lock().pop_front() else {
                break;
            };

            if self.algorithm == SchedulerAlgorithm::Rr {
                process.reset_cycles();
            }

            match self.pool.assign_to_idle(process) {
                Ok(core) => {
                    self.stats.inc_dispatched();
                    dispatched += 1;
                    debug!("Dispatched to core {}", core);
                }
                Err(process) => {
                    self.ready.lock().push_front(process);
                    break;
                }
            }
        }
        dispatched
    }

    pub(super) fn handle_event(&self, event: CoreEvent) {
        match event {
            CoreEvent::Finished { core, process } => {
                self.stats.inc_completions();
                info!(
                    "Process {} (PID {}) finished on core {}",
                    process.name(),
                    process.id(),
                    core
                );
                if self.reclaim_finished {
                    if let Some(memory) = &self.memory {
                        memory.deallocate(process.id());
                    }
                }
            }
            CoreEvent::Preempted { core, process } => {
                self.stats.inc_preemptions();
                debug!(
                    "PID {} preempted on core {} at {}/{}",
                    process.id(),
                    core,
                    process.current_instruction(),
                    process.total_instructions()
                );
                process.reset_cycles();
                self.enqueue(process);
            }
        }
    }

    pub(super) fn run_dispatcher(&self) {
        info!("Dispatcher started ({})", self.algorithm);
        while self.running.load(Ordering::Acquire) {
            match self.events.recv_timeout(DISPATCH_INTERVAL) {
                Ok(event) => self.handle_event(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.dispatch_once();
        }
        info!("Dispatcher stopped");
    }
}
