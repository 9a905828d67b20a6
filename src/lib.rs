/*!
 * OS Emulator Library
 * Process scheduler and memory manager emulation exposed as a library
 */

pub mod core;
pub mod memory;
pub mod monitoring;
pub mod process;
pub mod resource;
pub mod scheduler;

// Re-exports
pub use crate::core::{
    BackingStoreError, ConfigError, ConfigResult, EmulatorConfig, EmulatorError, EmulatorResult,
    MemoryMode, SchedulerAlgorithm, StoreResult,
};
pub use crate::core::types::{CoreId, Pid, Size, Tick};
pub use memory::{
    Allocation, Allocator, BackingStore, FlatAllocator, MemoryBlock, MemoryManager,
    MemorySnapshot, PagingAllocator, PidSet, RunningProcesses,
};
pub use monitoring::{init_tracing, span_operation, SystemReport};
pub use process::{Process, ProcessDescriptor, ProcessRef, ProcessSnapshot};
pub use resource::{ResourceManager, ResourceManagerBuilder};
pub use scheduler::{
    CoreEvent, CorePool, CoreSnapshot, CoreStats, CoreWorker, CpuUtilization, Scheduler,
    SchedulerStats,
};
