/*!
 * Backing Store Tests
 * Log persistence, fallback loading, and not-found handling
 */

use os_emulator::{BackingStore, BackingStoreError, ProcessDescriptor};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

fn descriptor(pid: u32, name: &str, memory_size: usize) -> ProcessDescriptor {
    ProcessDescriptor {
        pid,
        name: name.to_string(),
        total_instructions: 120,
        memory_size,
        page_size: 32,
    }
}

#[test]
fn test_store_appends_one_line_per_record() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("backing_store.txt");
    let store = BackingStore::open(&path).unwrap();

    store.store(&descriptor(1, "p1", 256)).unwrap();
    store.store(&descriptor(2, "p2", 512)).unwrap();
    store.store(&descriptor(1, "p1", 128)).unwrap();

    let log = fs::read_to_string(&path).unwrap();
    assert_eq!(log, "1 p1 120 256\n2 p2 120 512\n1 p1 120 128\n");
    assert_eq!(store.len(), 2);
}

#[test]
fn test_load_prefers_in_memory_entry() {
    let dir = TempDir::new().unwrap();
    let store = BackingStore::open(dir.path().join("store.txt")).unwrap();
    store.store(&descriptor(1, "p1", 256)).unwrap();
    store.store(&descriptor(1, "p1", 128)).unwrap();

    let process = store.load(1).unwrap();
    assert_eq!(process.memory_size(), 128);
}

#[test]
fn test_removed_entry_falls_back_to_first_log_record() {
    let dir = TempDir::new().unwrap();
    let store = BackingStore::open(dir.path().join("store.txt")).unwrap();
    store.store(&descriptor(1, "p1", 256)).unwrap();
    store.store(&descriptor(1, "p1", 128)).unwrap();

    assert!(store.remove(1).is_some());
    assert!(!store.contains(1));

    let process = store.load(1).unwrap();
    assert_eq!(process.memory_size(), 256);
    assert_eq!(process.name(), "p1");
    assert_eq!(process.current_instruction(), 0);
    assert!(store.contains(1));
}

#[test]
fn test_reopened_store_reads_previous_log() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.txt");
    {
        let store = BackingStore::open(&path).unwrap();
        store.store(&descriptor(7, "worker", 64)).unwrap();
    }

    let store = BackingStore::open(&path).unwrap();
    assert!(store.is_empty());
    assert_eq!(store.load(7).unwrap().total_instructions(), 120);
}

#[test]
fn test_malformed_lines_are_skipped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store.txt");
    fs::write(&path, "garbage\n\n3 p3 10\n4 p4 10 64\n").unwrap();

    let store = BackingStore::open(&path).unwrap();
    assert!(matches!(store.load(3), Err(BackingStoreError::NotFound(3))));
    assert_eq!(store.load(4).unwrap().memory_size(), 64);
}

#[test]
fn test_unknown_pid_is_not_found() {
    let store = BackingStore::in_memory();
    let err = store.load(99).unwrap_err();
    assert!(matches!(err, BackingStoreError::NotFound(99)));
}
