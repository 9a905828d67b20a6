/*!
 * Pipeline Tests
 * Process creation through memory admission to completion on the cores
 */

use os_emulator::{
    BackingStore, EmulatorConfig, EmulatorError, ResourceManager, SchedulerAlgorithm,
    SystemReport,
};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn config(algorithm: SchedulerAlgorithm, quantum: u32) -> EmulatorConfig {
    EmulatorConfig::default()
        .with_num_cpu(2)
        .with_scheduler(algorithm, quantum)
        .with_instructions(5, 20)
        .with_delay_per_exec(0.0)
        .with_batch_process_freq(0.01)
        .with_memory(1024, 1024)
        .with_process_memory(256, 256)
}

fn manager(config: EmulatorConfig, store: Arc<BackingStore>, paused: bool) -> Arc<ResourceManager> {
    let builder = ResourceManager::builder(config)
        .with_backing_store(store)
        .with_seed(11);
    let builder = if paused { builder.paused() } else { builder };
    builder.build().unwrap()
}

fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
#[serial]
fn test_created_processes_run_to_completion() {
    let manager = manager(
        config(SchedulerAlgorithm::Rr, 2),
        Arc::new(BackingStore::in_memory()),
        false,
    );
    for name in ["alpha", "beta", "gamma"] {
        manager.create_process(name).unwrap();
    }

    let done = wait_until(Duration::from_secs(10), || {
        manager.processes().iter().all(|p| p.is_finished())
    });
    manager.shutdown();
    assert!(done, "processes did not finish in time");

    let report = manager.report();
    assert_eq!(report.finished().count(), 3);
    assert_eq!(report.running().count(), 0);
    assert_eq!(report.scheduler.completions, 3);
    assert!(report.unscheduled.is_empty());
    assert_eq!(report.memory.used_bytes, 768);
}

#[test]
#[serial]
fn test_eviction_writes_victim_to_store_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("backing_store.txt");
    let store = Arc::new(BackingStore::open(&path).unwrap());
    let config = config(SchedulerAlgorithm::Fcfs, 0).with_memory(512, 512);
    let manager = manager(config, Arc::clone(&store), true);

    manager.create_process("p1").unwrap();
    manager.create_process("p2").unwrap();
    assert_eq!(manager.admit_pending(), 2);

    manager.create_process("p3").unwrap();
    assert_eq!(manager.admit_pending(), 1);

    assert_eq!(manager.memory().evictions(), 1);
    assert!(manager.memory().is_resident(3));

    let log = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 1);
    let victim = store.contents()[0].pid;
    assert!(victim == 1 || victim == 2);
    assert!(lines[0].starts_with(&format!("{} p{} ", victim, victim)));
    assert!(lines[0].ends_with(" 256"));
}

#[test]
#[serial]
fn test_no_victim_leaves_process_unscheduled() {
    let config = config(SchedulerAlgorithm::Fcfs, 0).with_memory(512, 512);
    let manager = manager(config, Arc::new(BackingStore::in_memory()), true);

    manager.create_process("p1").unwrap();
    manager.create_process("p2").unwrap();
    manager.admit_pending();

    // Both residents now hold a core, so neither can be evicted
    assert_eq!(manager.scheduler().dispatch_once(), 2);

    manager.create_process("p3").unwrap();
    assert_eq!(manager.admit_pending(), 0);
    assert_eq!(manager.unscheduled(), vec![3]);
    assert_eq!(manager.memory().failed_allocations(), 1);
    assert!(!manager.scheduler().ready_pids().contains(&3));
    assert_eq!(manager.report().unscheduled, vec![3]);
}

#[test]
#[serial]
fn test_batch_generator_names_and_restarts() {
    let manager = manager(
        config(SchedulerAlgorithm::Rr, 4).with_memory(1 << 20, 1 << 20),
        Arc::new(BackingStore::in_memory()),
        false,
    );

    assert!(manager.start_batch_generator().unwrap());
    assert!(!manager.start_batch_generator().unwrap());
    assert!(wait_until(Duration::from_secs(10), || {
        manager.process_exists("process_test3")
    }));
    assert!(manager.stop_batch_generator());
    assert!(!manager.stop_batch_generator());

    let generated = manager.generator().generated();
    assert!(manager.process_exists("process_test1"));
    assert_eq!(manager.find_process("process_test1").map(|p| p.id()), Some(1));

    // Numbering continues after a restart
    assert!(manager.start_batch_generator().unwrap());
    let next = format!("process_test{}", generated + 1);
    assert!(wait_until(Duration::from_secs(10), || manager.process_exists(&next)));
    manager.shutdown();
    assert!(!manager.generator().is_active());
}

#[test]
#[serial]
fn test_reclaim_finished_frees_memory() {
    let config = config(SchedulerAlgorithm::Fcfs, 0).with_reclaim_finished(true);
    let manager = manager(config, Arc::new(BackingStore::in_memory()), false);

    for n in 1..=4 {
        manager.create_process(&format!("job{}", n)).unwrap();
    }
    let reclaimed = wait_until(Duration::from_secs(10), || {
        manager.processes().iter().all(|p| p.is_finished())
            && manager.memory().used_bytes() == 0
    });
    assert!(reclaimed, "finished processes kept their memory");

    // Freed memory admits a second wave without evictions
    for n in 5..=8 {
        manager.create_process(&format!("job{}", n)).unwrap();
    }
    assert!(wait_until(Duration::from_secs(10), || {
        manager.scheduler().stats().completions == 8
    }));
    manager.shutdown();
    assert_eq!(manager.memory().evictions(), 0);
}

#[test]
#[serial]
fn test_shutdown_is_idempotent_and_report_serializes() {
    let manager = manager(
        config(SchedulerAlgorithm::Rr, 2),
        Arc::new(BackingStore::in_memory()),
        false,
    );
    manager.create_process("solo").unwrap();
    manager.start_batch_generator().unwrap();

    manager.shutdown();
    manager.shutdown();
    assert!(manager.is_shut_down());
    assert!(!manager.scheduler().is_running());
    assert!(matches!(
        manager.create_process("late"),
        Err(EmulatorError::ShutDown)
    ));
    assert!(matches!(
        manager.start_batch_generator(),
        Err(EmulatorError::ShutDown)
    ));

    let report = manager.report();
    let json = report.to_json_pretty().unwrap();
    let parsed: SystemReport = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.processes.len(), report.processes.len());
    assert_eq!(parsed.cores.len(), 2);
    assert_eq!(parsed.cpu.cores_available + parsed.cpu.cores_used, 2);
}
