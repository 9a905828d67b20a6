/*!
 * Process Module
 * Schedulable units of work and their descriptors
 */

pub mod types;

// Re-export for convenience
pub use types::{Process, ProcessDescriptor, ProcessRef, ProcessSnapshot};
