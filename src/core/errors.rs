/*!
 * Error Types
 * Centralized error handling with thiserror, miette, and serde support
 */

use crate::core::types::{Pid, Size};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration result
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Backing store result
pub type StoreResult<T> = Result<T, BackingStoreError>;

/// Emulator result
pub type EmulatorResult<T> = Result<T, EmulatorError>;

/// Configuration errors - fatal to initialization
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ConfigError {
    #[error("Missing configuration key: {0}")]
    #[diagnostic(
        code(config::missing_key),
        help("Every key of the emulator configuration must be present.")
    )]
    MissingKey(String),

    #[error("Invalid value for {key}: {value}")]
    #[diagnostic(
        code(config::invalid_value),
        help("Check the value type and range for this key.")
    )]
    InvalidValue { key: String, value: String },

    #[error("Unknown scheduler algorithm: {0}")]
    #[diagnostic(
        code(config::unknown_scheduler),
        help("Use \"fcfs\" or \"rr\".")
    )]
    UnknownScheduler(String),

    #[error("Invalid bounds for {key}: min {min} > max {max}")]
    #[diagnostic(
        code(config::invalid_bounds),
        help("The lower bound must not exceed the upper bound.")
    )]
    InvalidBounds { key: String, min: u64, max: u64 },

    #[error("No power of two lies within [{min}, {max}]")]
    #[diagnostic(
        code(config::no_power_of_two),
        help("Memory sizes are drawn as powers of two. Widen the range.")
    )]
    NoPowerOfTwo { min: Size, max: Size },

    #[error("Memory layout rejected: {0}")]
    #[diagnostic(
        code(config::memory_layout),
        help("Total memory must be a non-zero multiple of the frame size.")
    )]
    MemoryLayout(String),

    #[error("Failed to read configuration from {path}: {message}")]
    #[diagnostic(code(config::io))]
    Io { path: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    #[diagnostic(
        code(config::parse),
        help("JSON files must hold an object with the kebab-case configuration keys.")
    )]
    Parse(String),
}

/// Backing store errors
#[derive(Error, Debug, Diagnostic)]
pub enum BackingStoreError {
    #[error("Process {0} not found in backing store")]
    #[diagnostic(
        code(backing_store::not_found),
        help("The process was never evicted, or was removed and the log holds no record.")
    )]
    NotFound(Pid),

    #[error("Backing store I/O failed: {0}")]
    #[diagnostic(code(backing_store::io))]
    Io(#[from] std::io::Error),
}

/// Top-level emulator errors
#[derive(Error, Debug, Diagnostic)]
pub enum EmulatorError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    BackingStore(#[from] BackingStoreError),

    #[error("Failed to spawn {thread} thread: {message}")]
    #[diagnostic(code(emulator::spawn_failed))]
    SpawnFailed { thread: String, message: String },

    #[error("Emulator has already been shut down")]
    #[diagnostic(
        code(emulator::shut_down),
        help("Create a new resource manager to run another session.")
    )]
    ShutDown,
}

impl EmulatorError {
    pub(crate) fn spawn_failed(thread: &str, err: std::io::Error) -> Self {
        EmulatorError::SpawnFailed {
            thread: thread.to_string(),
            message: err.to_string(),
        }
    }
}
