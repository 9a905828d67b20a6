/*!
 * Core Module
 * Fundamental emulator types, configuration, and error handling
 */

pub mod config;
pub mod errors;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use config::{EmulatorConfig, MemoryMode, SchedulerAlgorithm};
pub use errors::*;
pub use types::*;
