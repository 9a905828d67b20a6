/*!
 * Batch Generator
 *
 * Background load driver that creates `process_test<N>` processes at the
 * configured frequency. It can be started and stopped repeatedly; numbering
 * continues across restarts.
 */

use super::ResourceManager;
use crate::core::errors::{EmulatorError, EmulatorResult};
use crate::core::limits::BATCH_PROCESS_PREFIX;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Synthetic process generator
#[derive(Debug, Default)]
pub struct BatchGenerator {
    active: Arc<AtomicBool>,
    counter: Arc<AtomicU64>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BatchGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Processes generated so far
    pub fn generated(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    /// Returns false if the generator was already running
    pub(super) fn start(
        &self,
        manager: Weak<ResourceManager>,
        interval: Duration,
    ) -> EmulatorResult<bool> {
        let mut handle = self.handle.lock();
        if self.active.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }

        let active = Arc::clone(&self.active);
        let counter = Arc::clone(&self.counter);
        let spawned = thread::Builder::new()
            .name("batch-generator".into())
            .spawn(move || generate(manager, active, counter, interval));

        match spawned {
            Ok(join) => {
                *handle = Some(join);
                info!("Batch generator started, one process every {:?}", interval);
                Ok(true)
            }
            Err(e) => {
                self.active.store(false, Ordering::Release);
                Err(EmulatorError::spawn_failed("batch-generator", e))
            }
        }
    }

    /// Returns false if the generator was not running
    pub(super) fn stop(&self) -> bool {
        let was_active = self.active.swap(false, Ordering::AcqRel);
        let Some(join) = self.handle.lock().take() else {
            return was_active;
        };

        join.thread().unpark();
        if join.thread().id() == thread::current().id() {
            // Last manager handle dropped on the generator thread itself
            return was_active;
        }
        if join.join().is_err() {
            error!("Batch generator thread panicked");
        }
        info!("Batch generator stopped after {} processes", self.generated());
        was_active
    }
}

fn generate(
    manager: Weak<ResourceManager>,
    active: Arc<AtomicBool>,
    counter: Arc<AtomicU64>,
    interval: Duration,
) {
    while active.load(Ordering::Acquire) {
        let Some(resources) = manager.upgrade() else {
            break;
        };
        let n = counter.fetch_add(1, Ordering::Relaxed) + 1;
        let name = format!("{}{}", BATCH_PROCESS_PREFIX, n);
        match resources.create_process(&name) {
            Ok(process) => debug!("Generated {} (PID {})", name, process.id()),
            Err(e) => {
                warn!("Batch generator stopping: {}", e);
                active.store(false, Ordering::Release);
                break;
            }
        }
        drop(resources);

        let deadline = Instant::now() + interval;
        while active.load(Ordering::Acquire) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::park_timeout(deadline - now);
        }
    }
}
