/*!
 * Core Types
 * Common types used across the emulator
 */

/// Process ID type
pub type Pid = u32;

/// CPU core identifier (1-based, matching the reporting layer)
pub type CoreId = u32;

/// Size type for memory operations
pub type Size = usize;

/// Monotonic tick counter
pub type Tick = u64;
