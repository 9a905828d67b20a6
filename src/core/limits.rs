/*!
 * System Limits and Constants
 *
 * Centralized location for the cadences and defaults used by the background loops.
 */

use std::time::Duration;

// =============================================================================
// SCHEDULING CADENCE
// =============================================================================

/// Pause between two dispatch passes of the scheduler thread
pub const DISPATCH_INTERVAL: Duration = Duration::from_millis(1);

/// How long an idle core waits for an assignment before counting an idle tick
pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Upper bound on a single wait of the allocation consumer.
/// The consumer is woken by a condition signal; this only bounds a missed wakeup.
pub const CONSUMER_WAIT_TIMEOUT: Duration = Duration::from_millis(50);

// =============================================================================
// PROCESS GENERATION
// =============================================================================

/// Name prefix used by the batch generator ("scheduler test" mode)
pub const BATCH_PROCESS_PREFIX: &str = "process_test";

/// Current-instruction value given to a process reconstructed from the backing store
pub const RESUMED_INSTRUCTION_MARKER: u64 = 0;

// =============================================================================
// BACKING STORE
// =============================================================================

/// Default backing-store log file, relative to the working directory
pub const DEFAULT_BACKING_STORE_PATH: &str = "backing_store.txt";
