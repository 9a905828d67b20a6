/*!
 * Eviction Tests
 * Evict-then-retry through the memory manager and the backing store
 */

use os_emulator::{
    BackingStore, EmulatorConfig, FlatAllocator, MemoryManager, MemoryMode, PagingAllocator,
    PidSet, Process,
};
use parking_lot::RwLock;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn flat_manager(total: usize, running: Arc<RwLock<PidSet>>) -> MemoryManager {
    MemoryManager::new(
        Box::new(FlatAllocator::with_seed(total, 21)),
        Arc::new(BackingStore::in_memory()),
        running,
    )
}

#[test]
fn test_single_eviction_admits_new_process() {
    let running = Arc::new(RwLock::new(PidSet::new()));
    let manager = flat_manager(512, Arc::clone(&running));

    assert!(manager.allocate(&Process::new(1, "p1", 50, 256, 1)));
    assert!(manager.allocate(&Process::new(2, "p2", 50, 256, 1)));
    running.write().insert(1);

    assert!(manager.allocate(&Process::new(3, "p3", 50, 256, 1)));

    assert_eq!(manager.evictions(), 1);
    let stored = manager.backing_store().contents();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].pid, 2);
    assert_eq!(stored[0].memory_size, 256);
    assert_eq!(manager.resident_pids(), vec![1, 3]);
}

#[test]
fn test_no_victim_means_failure() {
    let running = Arc::new(RwLock::new(PidSet::from([1, 2])));
    let manager = flat_manager(512, running);

    assert!(manager.allocate(&Process::new(1, "p1", 50, 256, 1)));
    assert!(manager.allocate(&Process::new(2, "p2", 50, 256, 1)));
    assert!(!manager.allocate(&Process::new(3, "p3", 50, 256, 1)));

    assert_eq!(manager.evictions(), 0);
    assert_eq!(manager.failed_allocations(), 1);
    assert!(manager.backing_store().is_empty());
}

#[test]
fn test_retry_is_bounded_to_one_eviction() {
    let running = Arc::new(RwLock::new(PidSet::new()));
    let manager = flat_manager(300, running);
    for pid in 1..=3 {
        assert!(manager.allocate(&Process::new(pid, format!("p{}", pid), 5, 100, 1)));
    }

    // Needs 300 contiguous bytes; one eviction frees only 100
    assert!(!manager.allocate(&Process::new(4, "big", 5, 300, 1)));
    assert_eq!(manager.evictions(), 1);
    assert_eq!(manager.resident_pids().len(), 2);
}

#[test]
fn test_paging_evictions_are_persisted() {
    let running = Arc::new(RwLock::new(PidSet::new()));
    let manager = MemoryManager::new(
        Box::new(PagingAllocator::with_seed(64, 16, 4)),
        Arc::new(BackingStore::in_memory()),
        running,
    );
    assert!(manager.allocate(&Process::new(1, "p1", 5, 64, 16)));
    assert!(manager.allocate(&Process::new(2, "p2", 5, 32, 16)));

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.pages_paged_out, 2);
    assert_eq!(snapshot.evictions, 2);
    assert!(manager.backing_store().contains(1));
    assert_eq!(snapshot.used_bytes, 64);
}

#[test]
fn test_manager_follows_configured_mode() {
    let store = Arc::new(BackingStore::in_memory());
    let running = Arc::new(RwLock::new(PidSet::new()));

    let flat = MemoryManager::from_config(
        &EmulatorConfig::default().with_memory(4096, 4096),
        Arc::clone(&store),
        running.clone(),
        Some(1),
    );
    assert_eq!(flat.mode(), MemoryMode::Flat);

    let paging = MemoryManager::from_config(
        &EmulatorConfig::default().with_memory(4096, 256),
        store,
        running,
        Some(1),
    );
    assert_eq!(paging.mode(), MemoryMode::Paging);
    assert_eq!(paging.total_bytes(), 4096);
}
