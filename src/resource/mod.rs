/*!
 * Resource Manager
 *
 * Entry point of the emulator. Owns the scheduler, the memory manager, and
 * the allocation pipeline that connects process creation to both.
 *
 * Shutdown order: batch generator, then the scheduler (dispatcher and every
 * core joined), then the allocation consumer.
 */

mod generator;
mod pipeline;
pub mod random;

pub use generator::BatchGenerator;
pub use random::{ProcessSampler, ProcessShape};

use crate::core::config::EmulatorConfig;
use crate::core::errors::{EmulatorError, EmulatorResult};
use crate::core::limits::DEFAULT_BACKING_STORE_PATH;
use crate::core::types::Pid;
use crate::memory::{BackingStore, MemoryManager, RunningProcesses};
use crate::monitoring::{span_operation, SystemReport};
use crate::process::{Process, ProcessRef};
use crate::scheduler::Scheduler;
use log::{error, info};
use parking_lot::{Mutex, RwLock};
use pipeline::Pipeline;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Builder for ResourceManager
pub struct ResourceManagerBuilder {
    config: EmulatorConfig,
    backing_store: Option<Arc<BackingStore>>,
    seed: Option<u64>,
    start_threads: bool,
}

impl ResourceManagerBuilder {
    pub fn new(config: EmulatorConfig) -> Self {
        Self {
            config,
            backing_store: None,
            seed: None,
            start_threads: true,
        }
    }

    /// Use this store instead of opening the default log file
    pub fn with_backing_store(mut self, store: Arc<BackingStore>) -> Self {
        self.backing_store = Some(store);
        self
    }

    /// Seed process sampling and victim selection
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build without starting any thread; call `start` later, or drive the
    /// pipeline by hand with `admit_pending` and `Scheduler::dispatch_once`.
    pub fn paused(mut self) -> Self {
        self.start_threads = false;
        self
    }

    /// Validate the configuration and wire every component.
    /// Configuration errors abort here and nothing is started.
    pub fn build(self) -> EmulatorResult<Arc<ResourceManager>> {
        let span = span_operation("initialize");
        let _entered = span.enter();

        self.config.validate()?;
        let sampler = ProcessSampler::new(&self.config, self.seed)?;

        let backing_store = match self.backing_store {
            Some(store) => store,
            None => Arc::new(BackingStore::open(DEFAULT_BACKING_STORE_PATH)?),
        };

        let scheduler = Scheduler::new(&self.config);
        let running: Arc<dyn RunningProcesses> = Arc::clone(scheduler.pool()) as _;
        let memory = Arc::new(MemoryManager::from_config(
            &self.config,
            Arc::clone(&backing_store),
            running,
            self.seed,
        ));
        let scheduler = Arc::new(scheduler.with_memory_manager(Arc::clone(&memory)));
        let pipeline = Arc::new(Pipeline::new(Arc::clone(&memory), Arc::clone(&scheduler)));

        let manager = Arc::new(ResourceManager {
            config: self.config,
            scheduler,
            memory,
            backing_store,
            pipeline,
            master: RwLock::new(Vec::new()),
            next_pid: AtomicU32::new(0),
            sampler: Mutex::new(sampler),
            generator: BatchGenerator::new(),
            consumer: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        });

        if self.start_threads {
            if let Err(e) = manager.start() {
                span.record_error(&e.to_string());
                manager.shutdown();
                return Err(e);
            }
        }

        span.record_result(true);
        info!(
            "Resource manager initialized: {} cores, {} scheduler, {} memory",
            manager.config.num_cpu,
            manager.config.scheduler,
            manager.memory.mode()
        );
        Ok(manager)
    }
}

/// Process creation, allocation, and scheduling pipeline
pub struct ResourceManager {
    config: EmulatorConfig,
    scheduler: Arc<Scheduler>,
    memory: Arc<MemoryManager>,
    backing_store: Arc<BackingStore>,
    pipeline: Arc<Pipeline>,
    master: RwLock<Vec<ProcessRef>>,
    next_pid: AtomicU32,
    sampler: Mutex<ProcessSampler>,
    generator: BatchGenerator,
    consumer: Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

impl ResourceManager {
    pub fn builder(config: EmulatorConfig) -> ResourceManagerBuilder {
        ResourceManagerBuilder::new(config)
    }

    /// Build and start with the default backing-store file
    pub fn initialize(config: EmulatorConfig) -> EmulatorResult<Arc<Self>> {
        Self::builder(config).build()
    }

    /// Start the scheduler threads and the allocation consumer
    pub fn start(&self) -> EmulatorResult<()> {
        if self.is_shut_down() {
            return Err(EmulatorError::ShutDown);
        }
        self.scheduler.start()?;

        let mut consumer = self.consumer.lock();
        if consumer.is_none() {
            let pipeline = Arc::clone(&self.pipeline);
            let handle = thread::Builder::new()
                .name("allocator".into())
                .spawn(move || pipeline.run())
                .map_err(|e| EmulatorError::spawn_failed("allocator", e))?;
            *consumer = Some(handle);
        }
        Ok(())
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn memory(&self) -> &Arc<MemoryManager> {
        &self.memory
    }

    pub fn backing_store(&self) -> &Arc<BackingStore> {
        &self.backing_store
    }

    pub fn generator(&self) -> &BatchGenerator {
        &self.generator
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Create a process with a sampled shape and queue it for allocation
    pub fn create_process(&self, name: &str) -> EmulatorResult<ProcessRef> {
        if self.is_shut_down() {
            return Err(EmulatorError::ShutDown);
        }

        let pid = self.next_pid.fetch_add(1, Ordering::AcqRel) + 1;
        let shape = self.sampler.lock().sample();
        let process = Arc::new(Process::new(
            pid,
            name,
            shape.total_instructions,
            shape.memory_size,
            shape.page_size,
        ));

        self.master.write().push(Arc::clone(&process));
        self.pipeline.submit(Arc::clone(&process));
        info!(
            "Created process {} (PID {}): {} instructions, {} bytes",
            name, pid, shape.total_instructions, shape.memory_size
        );
        Ok(process)
    }

    /// Admit every pending process on the calling thread
    pub fn admit_pending(&self) -> usize {
        self.pipeline.drain()
    }

    pub fn pending_len(&self) -> usize {
        self.pipeline.pending_len()
    }

    /// Pids whose allocation failed; they are never retried
    pub fn unscheduled(&self) -> Vec<Pid> {
        self.pipeline.unscheduled()
    }

    /// Start periodic `process_test<N>` creation. Returns false if already running.
    pub fn start_batch_generator(self: &Arc<Self>) -> EmulatorResult<bool> {
        if self.is_shut_down() {
            return Err(EmulatorError::ShutDown);
        }
        self.generator
            .start(Arc::downgrade(self), self.config.batch_interval())
    }

    /// Returns false if the generator was not running
    pub fn stop_batch_generator(&self) -> bool {
        self.generator.stop()
    }

    /// First process created with this name
    pub fn find_process(&self, name: &str) -> Option<ProcessRef> {
        self.master.read().iter().find(|p| p.name() == name).cloned()
    }

    pub fn process_exists(&self, name: &str) -> bool {
        self.master.read().iter().any(|p| p.name() == name)
    }

    /// Every process ever created, in creation order
    pub fn processes(&self) -> Vec<ProcessRef> {
        self.master.read().clone()
    }

    pub fn report(&self) -> SystemReport {
        let pool = self.scheduler.pool();
        SystemReport {
            cpu: pool.utilization(),
            cores: pool.snapshots(),
            ticks: pool.total_stats(),
            memory: self.memory.snapshot(),
            scheduler: self.scheduler.stats(),
            processes: self.master.read().iter().map(|p| p.snapshot()).collect(),
            unscheduled: self.pipeline.unscheduled(),
        }
    }

    /// Stop everything in order and join every thread. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let span = span_operation("shutdown");
        let _entered = span.enter();

        self.generator.stop();
        self.scheduler.stop();
        self.pipeline.stop();

        if let Some(handle) = self.consumer.lock().take() {
            if handle.join().is_err() {
                error!("Allocation consumer thread panicked");
            }
        }
        span.record_result(true);
        info!("Resource manager shut down");
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("scheduler", &self.scheduler)
            .field("memory", &self.memory)
            .field("processes", &self.master.read().len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
